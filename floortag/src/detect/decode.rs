use nalgebra::{Matrix3, Vector3};

use crate::dict::Matcher;
use crate::homography::Homography;

use super::image::GrayImage;

/// Result of decoding a marker from a quad.
#[derive(Debug, Clone)]
pub struct DecodeResult {
    pub id: u32,
    pub hamming: u8,
    pub decision_margin: f32,
    pub rotation: u8,
}

/// A plane fitted to intensity samples: value(x, y) = c[0]*x + c[1]*y + c[2].
#[derive(Debug, Clone, Default)]
struct GrayModel {
    a: Matrix3<f64>, // normal matrix J'J
    b: Vector3<f64>, // J' * gray
    c: Vector3<f64>, // plane coefficients
}

impl GrayModel {
    fn add(&mut self, x: f64, y: f64, gray: f64) {
        let row = Vector3::new(x, y, 1.0);
        self.a += row * row.transpose();
        self.b += row * gray;
    }

    fn solve(&mut self) {
        // A singular fit leaves the coefficients at zero
        if let Some(c) = self.a.lu().solve(&self.b) {
            self.c = c;
        }
    }

    fn interpolate(&self, x: f64, y: f64) -> f64 {
        self.c[0] * x + self.c[1] * y + self.c[2]
    }
}

/// Attempt to decode a marker from a quad against the matcher's dictionary.
///
/// `h` maps tag coordinates [-1,1]^2, spanning the bordered marker, to
/// image pixels. Samples a ring of expected-white cells half a cell
/// outside the border and a ring of expected-black cells on the border
/// itself, fits an intensity plane to each, then thresholds every data
/// cell against the local midpoint of the two planes.
pub fn decode_quad(
    img: &GrayImage,
    matcher: &Matcher,
    h: &Homography,
    decode_sharpening: f64,
) -> Option<DecodeResult> {
    let dict = matcher.dictionary();
    let dim = dict.dim;
    let grid = dim + 2; // data cells plus the border cell on each side
    let g = grid as f64;

    // Fit an intensity plane to a square ring of samples. Positions are in
    // bordered-cell units, (0,0) at the marker's top-left; `near` is the
    // distance of the ring from that edge, so -0.5 runs through the quiet
    // zone and 0.5 down the middle of the border cells.
    let ring_model = |near: f64| -> GrayModel {
        let far = g - near;
        let mut model = GrayModel::default();

        for step in 0..grid {
            let t = step as f64 + 0.5;
            for (cx, cy) in [(near, t), (far, t), (t, near), (t, far)] {
                let tagx = 2.0 * cx / g - 1.0;
                let tagy = 2.0 * cy / g - 1.0;

                let Some([px, py]) = h.apply(tagx, tagy) else {
                    continue;
                };
                let inside = px >= 0.0
                    && py >= 0.0
                    && px < img.width as f64 - 1.0
                    && py < img.height as f64 - 1.0;
                if inside {
                    model.add(tagx, tagy, img.interpolate(px, py));
                }
            }
        }

        model.solve();
        model
    };

    let white = ring_model(-0.5);
    let black = ring_model(0.5);

    // A marker border is darker than the paper around it; a quad traced
    // around a bright patch on a dark field samples the rings the other
    // way around and is not a marker.
    if white.interpolate(0.0, 0.0) <= black.interpolate(0.0, 0.0) {
        return None;
    }

    // Intensity relative to the local threshold, held on the full bordered
    // grid so sharpening can reach the neighbors of edge cells.
    let mut values = vec![vec![0.0f64; grid]; grid];
    for y in 0..dim {
        for x in 0..dim {
            let tagx = 2.0 * ((x + 1) as f64 + 0.5) / g - 1.0;
            let tagy = 2.0 * ((y + 1) as f64 + 0.5) / g - 1.0;

            let Some([px, py]) = h.apply(tagx, tagy) else {
                continue;
            };
            let mid = (black.interpolate(tagx, tagy) + white.interpolate(tagx, tagy)) / 2.0;
            values[y + 1][x + 1] = img.interpolate(px, py) - mid;
        }
    }

    if decode_sharpening > 0.0 {
        let raw = values.clone();
        for y in 1..=dim {
            for x in 1..=dim {
                let lap = 4.0 * raw[y][x]
                    - raw[y - 1][x]
                    - raw[y + 1][x]
                    - raw[y][x - 1]
                    - raw[y][x + 1];
                values[y][x] += decode_sharpening * lap;
            }
        }
    }

    // Codes store black cells as set bits: a cell darker than its local
    // threshold reads as 1. The decision margin is the smaller of the two
    // Laplace-smoothed average clearances.
    let mut code = 0u64;
    let (mut dark_sum, mut dark_n) = (0.0f64, 1.0f64);
    let (mut light_sum, mut light_n) = (0.0f64, 1.0f64);

    for bit in 0..dict.bit_count() {
        let v = values[bit / dim + 1][bit % dim + 1];
        if v < 0.0 {
            code |= 1 << bit;
            dark_sum -= v;
            dark_n += 1.0;
        } else {
            light_sum += v;
            light_n += 1.0;
        }
    }

    let decision_margin = (light_sum / light_n).min(dark_sum / dark_n) as f32;

    let m = matcher.match_code(code)?;

    Some(DecodeResult {
        id: m.id,
        hamming: m.hamming,
        decision_margin,
        rotation: m.rotation,
    })
}
