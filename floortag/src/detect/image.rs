/// 8-bit grayscale frame with row-major pixel data.
///
/// `stride` may exceed `width` when the buffer comes from a camera or
/// decoder that pads rows.
#[derive(Debug, Clone)]
pub struct GrayImage {
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub buf: Vec<u8>,
}

impl GrayImage {
    /// Zero-filled image with a tight stride.
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, 0)
    }

    /// Image with every pixel set to `val`.
    pub fn filled(width: u32, height: u32, val: u8) -> Self {
        Self {
            width,
            height,
            stride: width,
            buf: vec![val; width as usize * height as usize],
        }
    }

    /// Wrap existing pixel data.
    ///
    /// `buf` must hold at least `stride * height` bytes and `stride` must
    /// cover `width`.
    pub fn from_buf(width: u32, height: u32, stride: u32, buf: Vec<u8>) -> Self {
        assert!(stride >= width, "stride {stride} narrower than width {width}");
        assert!(
            buf.len() >= stride as usize * height as usize,
            "buffer holds {} bytes, {} rows of stride {} need {}",
            buf.len(),
            height,
            stride,
            stride as usize * height as usize
        );
        Self { width, height, stride, buf }
    }

    #[inline]
    fn idx(&self, x: u32, y: u32) -> usize {
        y as usize * self.stride as usize + x as usize
    }

    /// Pixel value at (x, y).
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.buf[self.idx(x, y)]
    }

    /// Store `val` at (x, y).
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, val: u8) {
        let i = self.idx(x, y);
        self.buf[i] = val;
    }

    /// Bilinear sample at sub-pixel coordinates.
    ///
    /// Coordinates are pixel-center based: sampling at (x + 0.5, y + 0.5)
    /// returns pixel (x, y) exactly. Samples outside the frame clamp to the
    /// nearest edge pixel.
    pub fn interpolate(&self, px: f64, py: f64) -> f64 {
        let fx = px - 0.5;
        let fy = py - 0.5;
        let bx = fx.floor();
        let by = fy.floor();
        let tx = fx - bx;
        let ty = fy - by;

        let last_x = (self.width - 1) as i64;
        let last_y = (self.height - 1) as i64;
        let sample = |x: i64, y: i64| -> f64 {
            self.get(x.clamp(0, last_x) as u32, y.clamp(0, last_y) as u32) as f64
        };

        let x0 = bx as i64;
        let y0 = by as i64;
        let top = sample(x0, y0) * (1.0 - tx) + sample(x0 + 1, y0) * tx;
        let bottom = sample(x0, y0 + 1) * (1.0 - tx) + sample(x0 + 1, y0 + 1) * tx;
        top * (1.0 - ty) + bottom * ty
    }
}
