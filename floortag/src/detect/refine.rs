use super::image::GrayImage;
use super::quad::Quad;

/// A refined edge line through `(px, py)` with unit normal `(nx, ny)`.
#[derive(Debug, Clone, Copy)]
struct EdgeLine {
    px: f64,
    py: f64,
    nx: f64,
    ny: f64,
}

/// Snap quad edges to the strongest gradients of the full-resolution frame.
///
/// Quad search may have run on a decimated frame, so each edge is walked in
/// the original image: sample stations along the edge search outward along
/// the normal for the gradient peak, the peaks get a fresh line fit, and
/// adjacent lines re-intersect into corners. The search range widens with
/// the decimation factor.
pub fn refine_edges(quad: &mut Quad, img: &GrayImage, quad_decimate: f32) {
    let range = quad_decimate as f64 + 1.0;

    let lines: [EdgeLine; 4] = std::array::from_fn(|e| {
        snap_edge(img, quad.corners[e], quad.corners[(e + 1) % 4], range)
    });

    for i in 0..4 {
        if let Some(c) = meet(lines[i], lines[(i + 1) % 4]) {
            quad.corners[i] = c;
        }
    }
}

/// Refit one edge from gradient peaks. Falls back to the original edge line
/// when too few stations see a usable gradient.
fn snap_edge(img: &GrayImage, a: [f64; 2], b: [f64; 2], range: f64) -> EdgeLine {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    let len = (dx * dx + dy * dy).sqrt();

    // Outward normal for counter-clockwise winding with a dark interior
    let nx = dy / len;
    let ny = -dx / len;

    let stations = 16.max((len / 8.0) as usize);

    let (mut sx, mut sy, mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0, 0.0, 0.0);
    let mut found = 0.0f64;

    for s in 0..stations {
        let t = (1.0 + s as f64) / (stations as f64 + 1.0);
        let Some((px, py)) = gradient_peak(img, a[0] + t * dx, a[1] + t * dy, nx, ny, range)
        else {
            continue;
        };

        sx += px;
        sy += py;
        sxx += px * px;
        sxy += px * py;
        syy += py * py;
        found += 1.0;
    }

    if found < 2.0 {
        return EdgeLine {
            px: (a[0] + b[0]) / 2.0,
            py: (a[1] + b[1]) / 2.0,
            nx,
            ny,
        };
    }

    let ex = sx / found;
    let ey = sy / found;
    let cxx = sxx / found - ex * ex;
    let cxy = sxy / found - ex * ey;
    let cyy = syy / found - ey * ey;

    // The covariance angle gives the refit normal directly
    let theta = 0.5 * (-2.0 * cxy).atan2(cyy - cxx);
    EdgeLine { px: ex, py: ey, nx: theta.cos(), ny: theta.sin() }
}

/// Weighted mean position of the dark-to-light transition along the normal
/// through `(x0, y0)`, probed in quarter-pixel steps over [-range, range].
fn gradient_peak(
    img: &GrayImage,
    x0: f64,
    y0: f64,
    nx: f64,
    ny: f64,
    range: f64,
) -> Option<(f64, f64)> {
    let mut num = 0.0f64;
    let mut mass = 0.0f64;

    for step in 0..=(8.0 * range) as i32 {
        let n = step as f64 * 0.25 - range;
        let cx = x0 + n * nx;
        let cy = y0 + n * ny;

        let outside = img.interpolate(cx + nx, cy + ny);
        let inside = img.interpolate(cx - nx, cy - ny);
        if outside < inside {
            // Wrong polarity, not our border
            continue;
        }

        let w = (outside - inside) * (outside - inside);
        num += w * n;
        mass += w;
    }

    if mass < 1e-10 {
        return None;
    }
    let n0 = num / mass;
    Some((x0 + n0 * nx, y0 + n0 * ny))
}

/// Intersect two edge lines; None when near-parallel.
fn meet(a: EdgeLine, b: EdgeLine) -> Option<[f64; 2]> {
    let det = a.nx * b.ny - a.ny * b.nx;
    if det.abs() < 0.001 {
        return None;
    }

    let ca = a.nx * a.px + a.ny * a.py;
    let cb = b.nx * b.px + b.ny * b.py;
    Some([(ca * b.ny - cb * a.ny) / det, (a.nx * cb - b.nx * ca) / det])
}
