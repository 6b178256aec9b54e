//! Marker rendering.
//!
//! Produces the printable cell pattern for a marker id: the data grid
//! wrapped in a one-cell black border, optionally rasterized with a white
//! quiet zone around it.

use thiserror::Error;

use crate::detect::image::GrayImage;
use crate::dict::Dictionary;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("id {id} out of range for dictionary {name} ({len} codes)")]
    IdOutOfRange {
        id: u32,
        name: &'static str,
        len: usize,
    },
}

/// A marker as a grid of cells, border included.
#[derive(Debug, Clone)]
pub struct MarkerCells {
    /// Side length in cells (dictionary dim + 2 border cells).
    pub grid: usize,
    cells: Vec<bool>, // true = black, row-major
}

impl MarkerCells {
    /// Whether cell (x, y) is black.
    pub fn is_black(&self, x: usize, y: usize) -> bool {
        self.cells[y * self.grid + x]
    }
}

/// Lay out the bordered cell pattern for a marker id.
pub fn marker_cells(dict: Dictionary, id: u32) -> Result<MarkerCells, RenderError> {
    let code = dict.code(id).ok_or(RenderError::IdOutOfRange {
        id,
        name: dict.name,
        len: dict.len(),
    })?;

    let grid = dict.dim + 2;
    let mut cells = vec![false; grid * grid];
    for y in 0..grid {
        for x in 0..grid {
            let border = x == 0 || y == 0 || x == grid - 1 || y == grid - 1;
            cells[y * grid + x] = border || dict.bit(code, x - 1, y - 1);
        }
    }

    Ok(MarkerCells { grid, cells })
}

/// Rasterize a marker id to a grayscale image.
///
/// `scale` is the cell size in pixels and `margin` the white quiet zone
/// around the border, in cells. A marker printed without a quiet zone is
/// not detectable, so callers that feed the result to the detector want
/// `margin >= 1`.
pub fn render_marker(
    dict: Dictionary,
    id: u32,
    scale: u32,
    margin: u32,
) -> Result<GrayImage, RenderError> {
    assert!(scale > 0, "scale must be positive");

    let cells = marker_cells(dict, id)?;
    let grid = cells.grid as u32;
    let size = (grid + 2 * margin) * scale;

    let mut img = GrayImage::filled(size, size, 255);
    for cy in 0..grid {
        for cx in 0..grid {
            if !cells.is_black(cx as usize, cy as usize) {
                continue;
            }
            let x0 = (margin + cx) * scale;
            let y0 = (margin + cy) * scale;
            for py in 0..scale {
                for px in 0..scale {
                    img.set(x0 + px, y0 + py, 0);
                }
            }
        }
    }

    Ok(img)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict::{DICT_4X4_50, DICT_4X4_50_CODES};

    #[test]
    fn border_ring_is_black() {
        let cells = marker_cells(DICT_4X4_50, 0).unwrap();
        assert_eq!(cells.grid, 6);
        for i in 0..6 {
            assert!(cells.is_black(i, 0), "top ({i}, 0)");
            assert!(cells.is_black(i, 5), "bottom ({i}, 5)");
            assert!(cells.is_black(0, i), "left (0, {i})");
            assert!(cells.is_black(5, i), "right (5, {i})");
        }
    }

    #[test]
    fn data_cells_follow_code_bits() {
        let code = DICT_4X4_50_CODES[3];
        let cells = marker_cells(DICT_4X4_50, 3).unwrap();
        for y in 0..4 {
            for x in 0..4 {
                let bit = (code >> (y * 4 + x)) & 1 == 1;
                assert_eq!(cells.is_black(x + 1, y + 1), bit, "cell ({x}, {y})");
            }
        }
    }

    #[test]
    fn id_out_of_range_errors() {
        assert!(marker_cells(DICT_4X4_50, 50).is_err());
        assert!(render_marker(DICT_4X4_50, 999, 4, 1).is_err());
    }

    #[test]
    fn raster_dimensions_and_quiet_zone() {
        let img = render_marker(DICT_4X4_50, 7, 8, 2).unwrap();
        let size = (6 + 4) * 8;
        assert_eq!(img.width, size);
        assert_eq!(img.height, size);

        // Quiet zone corners stay white, border cell pixels are black
        assert_eq!(img.get(0, 0), 255);
        assert_eq!(img.get(size - 1, size - 1), 255);
        assert_eq!(img.get(2 * 8, 2 * 8), 0);
        assert_eq!(img.get(size - 2 * 8 - 1, size - 2 * 8 - 1), 0);
    }
}
