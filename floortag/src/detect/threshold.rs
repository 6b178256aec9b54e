use std::cmp;

use super::image::GrayImage;

/// Side length of the adaptive-threshold tiles.
const TILESZ: u32 = 4;

/// Ternary threshold: 0 (black), 255 (white), 127 (skip).
///
/// Contrast is judged per 4x4 tile against the extrema of the surrounding
/// 3x3 tile neighborhood, so the cutoff tracks uneven floor lighting. Tiles
/// whose neighborhood spans less than `min_white_black_diff` gray levels
/// carry no usable edge and mark their pixels skip.
pub fn threshold(img: &GrayImage, min_white_black_diff: i32, deglitch: bool) -> GrayImage {
    let tw = img.width / TILESZ;
    let th = img.height / TILESZ;

    if tw == 0 || th == 0 {
        // Too small to tile; mark everything skip
        return GrayImage::filled(img.width, img.height, 127);
    }

    // Extrema of every full tile, (min, max) pairs
    let mut tiles = vec![(255u8, 0u8); (tw * th) as usize];
    for ty in 0..th {
        for tx in 0..tw {
            let mut lo = 255u8;
            let mut hi = 0u8;
            for dy in 0..TILESZ {
                for dx in 0..TILESZ {
                    let v = img.get(tx * TILESZ + dx, ty * TILESZ + dy);
                    lo = cmp::min(lo, v);
                    hi = cmp::max(hi, v);
                }
            }
            tiles[(ty * tw + tx) as usize] = (lo, hi);
        }
    }

    // Spread each tile's extrema over its 3x3 neighborhood (erode the min,
    // dilate the max) so the cutoff survives a marker edge crossing a tile
    // boundary.
    let mut spread = vec![(255u8, 0u8); tiles.len()];
    for ty in 0..th {
        for tx in 0..tw {
            let mut lo = 255u8;
            let mut hi = 0u8;
            for ny in ty.saturating_sub(1)..cmp::min(ty + 2, th) {
                for nx in tx.saturating_sub(1)..cmp::min(tx + 2, tw) {
                    let (tlo, thi) = tiles[(ny * tw + nx) as usize];
                    lo = cmp::min(lo, tlo);
                    hi = cmp::max(hi, thi);
                }
            }
            spread[(ty * tw + tx) as usize] = (lo, hi);
        }
    }

    // Binarize; pixels past the last full tile reuse the nearest tile
    let mut out = GrayImage::new(img.width, img.height);
    for y in 0..img.height {
        let ty = cmp::min(y / TILESZ, th - 1);
        for x in 0..img.width {
            let tx = cmp::min(x / TILESZ, tw - 1);
            let (lo, hi) = spread[(ty * tw + tx) as usize];

            let contrast = hi as i32 - lo as i32;
            let val = if contrast < min_white_black_diff {
                127
            } else if img.get(x, y) as i32 > lo as i32 + contrast / 2 {
                255
            } else {
                0
            };
            out.set(x, y, val);
        }
    }

    if deglitch {
        out = close(&out);
    }
    out
}

/// Morphological close: fills single-pixel dark glitches in white regions.
fn close(img: &GrayImage) -> GrayImage {
    morph(&morph(img, cmp::max), cmp::min)
}

/// 3x3 morphology with the given reducer; the window clips at the frame
/// border.
fn morph(img: &GrayImage, pick: fn(u8, u8) -> u8) -> GrayImage {
    let w = img.width;
    let h = img.height;
    let mut out = GrayImage::new(w, h);

    for y in 0..h {
        for x in 0..w {
            let mut best = img.get(x, y);
            for ny in y.saturating_sub(1)..cmp::min(y + 2, h) {
                for nx in x.saturating_sub(1)..cmp::min(x + 2, w) {
                    best = pick(best, img.get(nx, ny));
                }
            }
            out.set(x, y, best);
        }
    }
    out
}
