use super::image::GrayImage;

/// Shrink the frame by `factor`, averaging each factor x factor block.
///
/// Quad search runs on the decimated frame; decoding samples the full-size
/// one. Trailing rows and columns that do not fill a whole block are
/// dropped, and factors <= 1 return the input unchanged.
pub fn decimate(img: &GrayImage, factor: u32) -> GrayImage {
    if factor <= 1 {
        return img.clone();
    }

    let mut out = GrayImage::new(img.width / factor, img.height / factor);
    let area = factor * factor;

    for oy in 0..out.height {
        for ox in 0..out.width {
            let mut acc = 0u32;
            for dy in 0..factor {
                for dx in 0..factor {
                    acc += img.get(ox * factor + dx, oy * factor + dy) as u32;
                }
            }
            out.set(ox, oy, (acc / area) as u8);
        }
    }
    out
}

/// Normalized 1D Gaussian of odd length `size`.
fn gaussian_kernel(sigma: f32, size: usize) -> Vec<f32> {
    let mid = (size / 2) as i32;
    let mut weights: Vec<f32> = (0..size as i32)
        .map(|i| {
            let d = (i - mid) as f32;
            (-d * d / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let total: f32 = weights.iter().sum();
    for w in &mut weights {
        *w /= total;
    }
    weights
}

/// One separable convolution pass, clamping samples at the frame edge.
fn convolve(img: &GrayImage, kernel: &[f32], horizontal: bool) -> GrayImage {
    let mid = (kernel.len() / 2) as i64;
    let w = img.width as i64;
    let h = img.height as i64;

    let mut out = GrayImage::new(img.width, img.height);
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0f32;
            for (k, &weight) in kernel.iter().enumerate() {
                let off = k as i64 - mid;
                let (sx, sy) = if horizontal {
                    ((x + off).clamp(0, w - 1), y)
                } else {
                    (x, (y + off).clamp(0, h - 1))
                };
                acc += img.get(sx as u32, sy as u32) as f32 * weight;
            }
            out.set(x as u32, y as u32, acc.round() as u8);
        }
    }
    out
}

fn gaussian_blur(img: &GrayImage, sigma: f32, size: usize) -> GrayImage {
    let kernel = gaussian_kernel(sigma, size);
    let rows = convolve(img, &kernel, true);
    convolve(&rows, &kernel, false)
}

/// Blur or sharpen the frame according to `quad_sigma`.
///
/// Positive sigma blurs, negative runs an unsharp mask at |sigma|, zero
/// passes the frame through. The kernel spans 4 sigma, bumped to odd.
pub fn apply_sigma(img: &GrayImage, quad_sigma: f32) -> GrayImage {
    if quad_sigma == 0.0 {
        return img.clone();
    }

    let sigma = quad_sigma.abs();
    let size = match (4.0 * sigma) as usize {
        s if s % 2 == 0 => s + 1,
        s => s,
    };
    if size <= 1 {
        return img.clone();
    }

    let blurred = gaussian_blur(img, sigma, size);
    if quad_sigma > 0.0 {
        return blurred;
    }

    // Unsharp mask: keep the original plus the detail the blur removed
    let mut out = GrayImage::new(img.width, img.height);
    for y in 0..img.height {
        for x in 0..img.width {
            let sharp = 2 * img.get(x, y) as i32 - blurred.get(x, y) as i32;
            out.set(x, y, sharp.clamp(0, 255) as u8);
        }
    }
    out
}
