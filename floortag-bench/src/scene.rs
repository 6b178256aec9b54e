//! Scene composition: plant rendered markers into a frame with ground truth.

use floortag::detect::image::GrayImage;
use floortag::dict::Dictionary;
use floortag::render::{self, MarkerCells};

use crate::transform::Transform;

/// A marker placed in a scene with its ground-truth geometry.
#[derive(Debug, Clone)]
pub struct PlacedMarker {
    pub id: u32,
    /// Ground-truth corners of the bordered marker in image space, printed
    /// order: top-left, top-right, bottom-right, bottom-left.
    pub corners: [[f64; 2]; 4],
    /// Ground-truth center in image space.
    pub center: [f64; 2],
}

/// A complete scene: frame plus ground truth.
pub struct Scene {
    pub image: GrayImage,
    pub ground_truth: Vec<PlacedMarker>,
}

/// Floor texture behind the markers.
#[derive(Debug, Clone, Copy)]
pub enum Background {
    /// One flat gray level.
    Solid(u8),
    /// Shade ramp from the top row down to the bottom row.
    Gradient { top: u8, bottom: u8 },
    /// Alternating light and dark tiles.
    Checkerboard { cell_size: u32, light: u8, dark: u8 },
}

impl Background {
    fn paint(self, width: u32, height: u32) -> GrayImage {
        let mut img = GrayImage::new(width, height);
        for y in 0..height {
            for x in 0..width {
                img.set(x, y, self.shade(x, y, height));
            }
        }
        img
    }

    fn shade(self, x: u32, y: u32, height: u32) -> u8 {
        match self {
            Background::Solid(v) => v,
            Background::Gradient { top, bottom } => {
                let t = match height {
                    0 | 1 => 0.0,
                    h => y as f64 / (h - 1) as f64,
                };
                (top as f64 + (bottom as f64 - top as f64) * t).round() as u8
            }
            Background::Checkerboard { cell_size, light, dark } => {
                if (x / cell_size + y / cell_size) % 2 == 0 {
                    light
                } else {
                    dark
                }
            }
        }
    }
}

struct Placement {
    dict: Dictionary,
    id: u32,
    transform: Transform,
}

/// Builder for synthetic frames.
pub struct SceneBuilder {
    width: u32,
    height: u32,
    background: Background,
    markers: Vec<Placement>,
}

impl SceneBuilder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            background: Background::Solid(128),
            markers: Vec::new(),
        }
    }

    pub fn background(mut self, bg: Background) -> Self {
        self.background = bg;
        self
    }

    pub fn add_marker(mut self, dict: Dictionary, id: u32, transform: Transform) -> Self {
        self.markers.push(Placement { dict, id, transform });
        self
    }

    /// Render every placed marker onto the painted background and record
    /// where each one truly landed.
    pub fn build(self) -> Scene {
        let mut image = self.background.paint(self.width, self.height);

        let ground_truth = self
            .markers
            .iter()
            .map(|m| {
                let cells = render::marker_cells(m.dict, m.id).unwrap_or_else(|e| panic!("{e}"));
                stamp(&mut image, &cells, &m.transform);

                let (cx, cy) = m.transform.project(0.0, 0.0);
                PlacedMarker {
                    id: m.id,
                    corners: m.transform.ground_truth_corners(),
                    center: [cx, cy],
                }
            })
            .collect();

        Scene { image, ground_truth }
    }
}

/// Paint one marker into the frame by inverse mapping: every frame pixel
/// inside the marker's footprint is pulled back to tag space and sampled
/// from the cell grid.
fn stamp(img: &mut GrayImage, cells: &MarkerCells, transform: &Transform) {
    // One cell of white quiet zone beyond the bordered square
    let extent = 1.0 + 2.0 / cells.grid as f64;

    let Some(inv) = transform.homography().inverse() else {
        return;
    };

    let (xs, ys) = footprint(img, transform, extent);
    for iy in ys {
        for ix in xs.clone() {
            // Half-pixel centers, matching the detector's convention
            let Some([tx, ty]) = inv.apply(ix as f64 + 0.5, iy as f64 + 0.5) else {
                continue;
            };
            if let Some(v) = marker_shade(cells, extent, tx, ty) {
                img.set(ix, iy, v);
            }
        }
    }
}

/// Pixel ranges covered by the quiet-zone outline, clipped to the frame.
fn footprint(
    img: &GrayImage,
    transform: &Transform,
    extent: f64,
) -> (std::ops::Range<u32>, std::ops::Range<u32>) {
    let mut lo = [f64::INFINITY; 2];
    let mut hi = [f64::NEG_INFINITY; 2];
    for sx in [-extent, extent] {
        for sy in [-extent, extent] {
            let (ix, iy) = transform.project(sx, sy);
            lo[0] = lo[0].min(ix);
            lo[1] = lo[1].min(iy);
            hi[0] = hi[0].max(ix);
            hi[1] = hi[1].max(iy);
        }
    }

    let x0 = (lo[0] - 1.0).max(0.0) as u32;
    let x1 = ((hi[0] + 2.0).max(0.0) as u32).min(img.width);
    let y0 = (lo[1] - 1.0).max(0.0) as u32;
    let y1 = ((hi[1] + 2.0).max(0.0) as u32).min(img.height);
    (x0..x1, y0..y1)
}

/// Shade of the marker at a tag-space position. None outside the quiet
/// zone (keep the background), white in the quiet zone, cell shade inside
/// the bordered square. Tag space [-1, 1] spans border plus data grid.
fn marker_shade(cells: &MarkerCells, extent: f64, tx: f64, ty: f64) -> Option<u8> {
    if tx.abs() > extent || ty.abs() > extent {
        return None;
    }
    if tx.abs() > 1.0 || ty.abs() > 1.0 {
        return Some(255);
    }

    let grid = cells.grid as f64;
    let gx = (((tx + 1.0) * 0.5 * grid) as usize).min(cells.grid - 1);
    let gy = (((ty + 1.0) * 0.5 * grid) as usize).min(cells.grid - 1);
    Some(if cells.is_black(gx, gy) { 0 } else { 255 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use floortag::dict::DICT_4X4_50;

    fn centered(scale: f64) -> Transform {
        Transform::Similarity { cx: 100.0, cy: 100.0, scale, theta: 0.0 }
    }

    #[test]
    fn solid_shade_is_uniform() {
        let img = Background::Solid(77).paint(6, 4);
        assert!(img.buf.iter().all(|&v| v == 77));
    }

    #[test]
    fn gradient_shade_interpolates_rows() {
        let bg = Background::Gradient { top: 10, bottom: 90 };
        let img = bg.paint(3, 9);
        assert_eq!(img.get(1, 0), 10);
        assert_eq!(img.get(1, 8), 90);
        assert_eq!(img.get(1, 4), 50);
    }

    #[test]
    fn checkerboard_shade_alternates_cells() {
        let bg = Background::Checkerboard { cell_size: 4, light: 240, dark: 20 };
        let img = bg.paint(12, 12);
        assert_eq!(img.get(0, 0), 240);
        assert_eq!(img.get(4, 0), 20);
        assert_eq!(img.get(0, 4), 20);
        assert_eq!(img.get(7, 7), 240);
        assert_eq!(img.get(8, 8), 240);
    }

    #[test]
    fn ground_truth_tracks_the_transform() {
        let off_center = Transform::Similarity { cx: 110.0, cy: 90.0, scale: 50.0, theta: 0.0 };
        let scene = SceneBuilder::new(220, 220)
            .add_marker(DICT_4X4_50, 4, off_center)
            .build();

        assert_eq!((scene.image.width, scene.image.height), (220, 220));
        let [gt] = &scene.ground_truth[..] else {
            panic!("expected one marker, got {}", scene.ground_truth.len());
        };
        assert_eq!(gt.id, 4);
        assert!((gt.center[0] - 110.0).abs() < 1e-10);
        assert!((gt.center[1] - 90.0).abs() < 1e-10);
        // Corners at center +/- scale
        assert!((gt.corners[0][0] - 60.0).abs() < 1e-10);
        assert!((gt.corners[0][1] - 40.0).abs() < 1e-10);
        assert!((gt.corners[2][0] - 160.0).abs() < 1e-10);
        assert!((gt.corners[2][1] - 140.0).abs() < 1e-10);
    }

    #[test]
    fn stamp_paints_border_quiet_zone_and_background() {
        // Scale 48 makes each of the 6 cells 16 px wide
        let scene = SceneBuilder::new(200, 200)
            .background(Background::Solid(140))
            .add_marker(DICT_4X4_50, 0, centered(48.0))
            .build();

        // Data region pixels are pure black or white
        let mid = scene.image.get(100, 100);
        assert!(mid == 0 || mid == 255, "center pixel: {mid}");

        // Border cell center: tag -5/6, i.e. 100 - 48 * 5/6 = 60
        assert_eq!(scene.image.get(60, 100), 0);
        assert_eq!(scene.image.get(100, 60), 0);

        // Quiet zone: tag -7/6, i.e. 100 - 56 = 44
        assert_eq!(scene.image.get(44, 100), 255);

        // Beyond the quiet zone the background survives
        assert_eq!(scene.image.get(0, 0), 140);
        assert_eq!(scene.image.get(199, 100), 140);
    }

    #[test]
    fn two_markers_land_in_their_own_spots() {
        let scene = SceneBuilder::new(420, 200)
            .add_marker(
                DICT_4X4_50,
                2,
                Transform::Similarity { cx: 105.0, cy: 100.0, scale: 36.0, theta: 0.0 },
            )
            .add_marker(
                DICT_4X4_50,
                3,
                Transform::Similarity { cx: 315.0, cy: 100.0, scale: 36.0, theta: 0.0 },
            )
            .build();

        let ids: Vec<u32> = scene.ground_truth.iter().map(|g| g.id).collect();
        assert_eq!(ids, vec![2, 3]);

        for cx in [105, 315] {
            let v = scene.image.get(cx, 100);
            assert!(v == 0 || v == 255, "marker pixel at x={cx}: {v}");
        }
        // The gap between the two footprints keeps the background
        assert_eq!(scene.image.get(210, 100), 128);
    }
}
