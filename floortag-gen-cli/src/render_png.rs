//! PNG output for rendered markers and marker sheets.

use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use floortag::detect::image::GrayImage;
use floortag::dict::Dictionary;
use floortag::render;

/// Write a single rendered marker as a grayscale PNG.
pub fn write_marker_png(img: &GrayImage, path: &Path) -> Result<()> {
    write_grayscale_png(path, &img.buf, img.width, img.height)
}

/// Lay the given ids out in a grid and write the sheet as one PNG.
///
/// Every marker carries its own one-cell quiet zone; `spacing` adds white
/// cells between neighbors on top of that.
pub fn write_sheet_png(
    dict: Dictionary,
    ids: &[u32],
    scale: u32,
    spacing: u32,
    columns: u32,
    path: &Path,
) -> Result<()> {
    let cols = (columns as usize).clamp(1, ids.len().max(1));
    let rows = ids.len().div_ceil(cols);

    // One grid cell holds a bordered marker plus its quiet zone
    let cell = (dict.dim as u32 + 4) * scale;
    let gap = spacing * scale;
    let pitch = cell + gap;

    let width = (pitch * cols as u32).saturating_sub(gap);
    let height = (pitch * rows as u32).saturating_sub(gap);
    let mut sheet = GrayImage::filled(width, height, 255);

    for (idx, &id) in ids.iter().enumerate() {
        let x0 = (idx % cols) as u32 * pitch;
        let y0 = (idx / cols) as u32 * pitch;

        let tile = render::render_marker(dict, id, scale, 1)?;
        for y in 0..tile.height {
            for x in 0..tile.width {
                sheet.set(x0 + x, y0 + y, tile.get(x, y));
            }
        }
    }

    write_grayscale_png(path, &sheet.buf, sheet.width, sheet.height)
}

fn write_grayscale_png(path: &Path, pixels: &[u8], width: u32, height: u32) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("cannot create {}", path.display()))?;

    let mut encoder = png::Encoder::new(BufWriter::new(file), width, height);
    encoder.set_color(png::ColorType::Grayscale);
    encoder.set_depth(png::BitDepth::Eight);

    encoder
        .write_header()
        .and_then(|mut w| w.write_image_data(pixels))
        .with_context(|| format!("encoding {}", path.display()))
}
