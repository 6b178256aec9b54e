use std::ops::{Add, Sub};

use smallvec::SmallVec;

use super::cluster::{Cluster, Pt};

#[cfg(feature = "parallel")]
use rayon::iter::{IntoParallelRefMutIterator, ParallelIterator};

/// A candidate marker outline: four corners in pixel coordinates, wound
/// counter-clockwise.
#[derive(Debug, Clone)]
pub struct Quad {
    pub corners: [[f64; 2]; 4],
}

/// Tuning knobs for the threshold/segmentation/quad stages.
#[derive(Debug, Clone)]
pub struct QuadThreshParams {
    pub min_cluster_pixels: i32,
    pub max_nmaxima: i32,
    pub cos_critical_rad: f32,
    pub max_line_fit_mse: f32,
    pub min_white_black_diff: i32,
    pub deglitch: bool,
}

impl Default for QuadThreshParams {
    fn default() -> Self {
        Self {
            min_cluster_pixels: 5,
            max_nmaxima: 10,
            cos_critical_rad: (10.0f32.to_radians()).cos(),
            max_line_fit_mse: 10.0,
            min_white_black_diff: 5,
            deglitch: false,
        }
    }
}

/// Weighted point moments. Cumulative sums of these make the moments of any
/// ring range a constant-time difference.
#[derive(Debug, Clone, Copy, Default)]
struct Moments {
    mx: f64,
    my: f64,
    mxx: f64,
    mxy: f64,
    myy: f64,
    w: f64,
}

impl Moments {
    /// Moments of one boundary sample, weighted by gradient magnitude so
    /// crisp edges count more than soft ones.
    fn of(p: &Pt) -> Self {
        let (x, y) = (p.x as f64 / 2.0, p.y as f64 / 2.0);
        let w = (p.gx as f64).hypot(p.gy as f64) + 1.0;
        Moments {
            mx: w * x,
            my: w * y,
            mxx: w * x * x,
            mxy: w * x * y,
            myy: w * y * y,
            w,
        }
    }
}

impl Add for Moments {
    type Output = Moments;

    fn add(self, r: Moments) -> Moments {
        Moments {
            mx: self.mx + r.mx,
            my: self.my + r.my,
            mxx: self.mxx + r.mxx,
            mxy: self.mxy + r.mxy,
            myy: self.myy + r.myy,
            w: self.w + r.w,
        }
    }
}

impl Sub for Moments {
    type Output = Moments;

    fn sub(self, r: Moments) -> Moments {
        Moments {
            mx: self.mx - r.mx,
            my: self.my - r.my,
            mxx: self.mxx - r.mxx,
            mxy: self.mxy - r.mxy,
            myy: self.myy - r.myy,
            w: self.w - r.w,
        }
    }
}

/// A fitted edge line in point-normal form.
#[derive(Debug, Clone, Copy)]
struct Edge {
    px: f64,
    py: f64,
    nx: f64,
    ny: f64,
}

/// Fit marker outlines to the boundary clusters.
///
/// Markers are dark squares on a lighter floor, so clusters whose gradients
/// point the wrong way (light interior) never produce a quad.
pub fn fit_quads(
    clusters: &mut [Cluster],
    image_width: u32,
    image_height: u32,
    params: &QuadThreshParams,
) -> Vec<Quad> {
    let max_perimeter = 2 * (image_width as usize + image_height as usize);

    #[cfg(feature = "parallel")]
    {
        clusters
            .par_iter_mut()
            .filter_map(|c| fit_quad(c, params, max_perimeter))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        clusters
            .iter_mut()
            .filter_map(|c| fit_quad(c, params, max_perimeter))
            .collect()
    }
}

fn fit_quad(
    cluster: &mut Cluster,
    params: &QuadThreshParams,
    max_perimeter: usize,
) -> Option<Quad> {
    let n = cluster.points.len();

    // Fewer than 24 samples cannot outline a decodable marker; more than
    // the frame perimeter is noise
    if n < 24 || (n as i32) < params.min_cluster_pixels || n > max_perimeter {
        return None;
    }

    // Gradients must point away from the centroid: dark inside, light out
    if outline_polarity(&cluster.points) < f64::EPSILON {
        return None;
    }

    order_around_center(&mut cluster.points);
    let prefix = prefix_moments(&cluster.points);

    let picks = pick_corners(&cluster.points, &prefix, params)?;
    let corners = intersect_edges(&prefix, &picks)?;
    if !is_convex_ccw(&corners) {
        return None;
    }

    Some(Quad { corners })
}

/// Sum of (position - centroid) . gradient over the samples. Positive means
/// the dark side faces inward.
fn outline_polarity(points: &[Pt]) -> f64 {
    let count = points.len() as f64;
    let cx = points.iter().map(|p| p.x as f64).sum::<f64>() / count;
    let cy = points.iter().map(|p| p.y as f64).sum::<f64>() / count;

    points
        .iter()
        .map(|p| (p.x as f64 - cx) * p.gx as f64 + (p.y as f64 - cy) * p.gy as f64)
        .sum()
}

/// Sort the samples into a ring around the bounding-box center.
///
/// The center gets a small irrational nudge so no sample sits exactly on a
/// quadrant boundary of the slope proxy.
fn order_around_center(points: &mut [Pt]) {
    let mut lo = [f64::MAX; 2];
    let mut hi = [f64::MIN; 2];
    for p in points.iter() {
        lo[0] = lo[0].min(p.x as f64);
        lo[1] = lo[1].min(p.y as f64);
        hi[0] = hi[0].max(p.x as f64);
        hi[1] = hi[1].max(p.y as f64);
    }

    let cx = (lo[0] + hi[0]) / 2.0 + 0.05118;
    let cy = (lo[1] + hi[1]) / 2.0 - 0.028581;

    for p in &mut *points {
        p.slope = quadrant_slope(p.x as f64 - cx, p.y as f64 - cy);
    }
    points.sort_by(|a, b| a.slope.total_cmp(&b.slope));
}

/// Monotonic stand-in for atan2, mapping a direction to [0, 4).
fn quadrant_slope(dx: f64, dy: f64) -> f32 {
    let a = dx.abs();
    let b = dy.abs();

    let (quadrant, frac) = if dy > 0.0 {
        if dx > 0.0 {
            (0.0, b)
        } else {
            (1.0, a)
        }
    } else if dx < 0.0 {
        (2.0, b)
    } else {
        (3.0, a)
    };
    (quadrant + frac / (a + b)) as f32
}

/// Running moment sums over the sorted ring.
fn prefix_moments(points: &[Pt]) -> Vec<Moments> {
    let mut acc = Moments::default();
    points
        .iter()
        .map(|p| {
            acc = acc + Moments::of(p);
            acc
        })
        .collect()
}

/// Moments over the inclusive ring range [i0, i1], wrapping past the end.
fn ring_moments(prefix: &[Moments], i0: usize, i1: usize) -> Moments {
    let before = |i: usize| {
        if i == 0 {
            Moments::default()
        } else {
            prefix[i - 1]
        }
    };

    if i0 <= i1 {
        prefix[i1] - before(i0)
    } else {
        prefix[prefix.len() - 1] - before(i0) + prefix[i1]
    }
}

/// Fit a line to a moment range; returns the edge and the fit MSE.
///
/// The covariance eigendecomposition gives both at once: the minor
/// eigenvalue is the mean squared error and its eigenvector the normal.
fn fit_edge(m: Moments) -> Option<(Edge, f64)> {
    if m.w < 1e-10 {
        return None;
    }

    let ex = m.mx / m.w;
    let ey = m.my / m.w;
    let cxx = m.mxx / m.w - ex * ex;
    let cxy = m.mxy / m.w - ex * ey;
    let cyy = m.myy / m.w - ey * ey;

    let disc = (cxx - cyy).hypot(2.0 * cxy);
    let minor = 0.5 * (cxx + cyy - disc);
    if 0.5 * (cxx + cyy + disc) < 1e-10 {
        return None;
    }

    let (mut nx, mut ny) = (cxy, minor - cxx);
    let len = nx.hypot(ny);
    if len > 1e-10 {
        nx /= len;
        ny /= len;
    } else if cxx > cyy {
        // Covariance already axis-aligned
        (nx, ny) = (0.0, 1.0);
    } else {
        (nx, ny) = (1.0, 0.0);
    }

    Some((Edge { px: ex, py: ey, nx, ny }, minor.max(0.0)))
}

/// Choose four corner indices splitting the ring into four straight runs.
fn pick_corners(
    points: &[Pt],
    prefix: &[Moments],
    params: &QuadThreshParams,
) -> Option<[usize; 4]> {
    let n = points.len();
    let ksz = (n / 12).clamp(1, 20);

    // Fit error of a +/-ksz window at every sample; corners are where the
    // straight-line model breaks down
    let mut errs: Vec<f64> = (0..n)
        .map(|i| {
            let m = ring_moments(prefix, (i + n - ksz) % n, (i + ksz) % n);
            fit_edge(m).map_or(0.0, |(_, mse)| mse)
        })
        .collect();
    smooth_ring(&mut errs);

    // Plateau-tolerant local maxima: >= on the left, > on the right
    let mut maxima: SmallVec<[(usize, f64); 16]> = (0..n)
        .filter(|&i| errs[i] >= errs[(i + n - 1) % n] && errs[i] > errs[(i + 1) % n])
        .map(|i| (i, errs[i]))
        .collect();
    if maxima.len() < 4 {
        return None;
    }

    // Keep the strongest candidates, restored to ring order
    if maxima.len() > params.max_nmaxima as usize {
        maxima.sort_by(|a, b| b.1.total_cmp(&a.1));
        maxima.truncate(params.max_nmaxima as usize);
        maxima.sort_by_key(|&(i, _)| i);
    }

    // Exhaustive scan over 4-subsets for the lowest total fit error
    let nm = maxima.len();
    let mut best: Option<([usize; 4], f64)> = None;
    for a in 0..nm {
        for b in a + 1..nm {
            for c in b + 1..nm {
                for d in c + 1..nm {
                    let picks = [maxima[a].0, maxima[b].0, maxima[c].0, maxima[d].0];
                    let Some(err) = score_partition(prefix, &picks, params) else {
                        continue;
                    };
                    if best.map_or(true, |(_, e)| err < e) {
                        best = Some((picks, err));
                    }
                }
            }
        }
    }
    best.map(|(picks, _)| picks)
}

/// Total fit error over the four runs of one candidate partition, or None
/// when a run's error or the angle between adjacent runs disqualifies it.
fn score_partition(
    prefix: &[Moments],
    picks: &[usize; 4],
    params: &QuadThreshParams,
) -> Option<f64> {
    let max_mse = params.max_line_fit_mse as f64;

    let mut edges: SmallVec<[Edge; 4]> = SmallVec::new();
    let mut total = 0.0;
    for s in 0..4 {
        let m = ring_moments(prefix, picks[s], picks[(s + 1) % 4]);
        let (edge, mse) = fit_edge(m)?;
        if mse > max_mse {
            return None;
        }
        total += mse;
        edges.push(edge);
    }

    // Adjacent runs may not be near-parallel
    for s in 0..4 {
        let e0 = edges[s];
        let e1 = edges[(s + 1) % 4];
        if (e0.nx * e1.nx + e0.ny * e1.ny).abs() > params.cos_critical_rad as f64 {
            return None;
        }
    }
    Some(total)
}

/// Three-tap ring smoothing so single-sample noise does not spawn maxima.
fn smooth_ring(errs: &mut [f64]) {
    let sz = errs.len();
    if sz < 3 {
        return;
    }

    let src = errs.to_vec();
    for i in 0..sz {
        errs[i] =
            0.1665 * src[(i + sz - 1) % sz] + 0.6670 * src[i] + 0.1665 * src[(i + 1) % sz];
    }
}

/// Corner positions: each corner is the intersection of the two runs that
/// meet there.
fn intersect_edges(prefix: &[Moments], picks: &[usize; 4]) -> Option<[[f64; 2]; 4]> {
    let mut edges: SmallVec<[Edge; 4]> = SmallVec::new();
    for s in 0..4 {
        let m = ring_moments(prefix, picks[s], picks[(s + 1) % 4]);
        edges.push(fit_edge(m)?.0);
    }

    let mut corners = [[0.0f64; 2]; 4];
    for (i, c) in corners.iter_mut().enumerate() {
        *c = cross_point(edges[i], edges[(i + 1) % 4])?;
    }
    Some(corners)
}

/// Intersection of two edges in point-normal form; None when near-parallel.
fn cross_point(a: Edge, b: Edge) -> Option<[f64; 2]> {
    let det = a.nx * b.ny - a.ny * b.nx;
    if det.abs() < 0.001 {
        return None;
    }

    let ca = a.nx * a.px + a.ny * a.py;
    let cb = b.nx * b.px + b.ny * b.py;
    Some([(ca * b.ny - cb * a.ny) / det, (a.nx * cb - b.nx * ca) / det])
}

/// Accept only counter-clockwise convex quads.
fn is_convex_ccw(corners: &[[f64; 2]; 4]) -> bool {
    if signed_area(corners) < 0.0 {
        return false;
    }
    (0..4).all(|i| {
        let [x0, y0] = corners[i];
        let [x1, y1] = corners[(i + 1) % 4];
        let [x2, y2] = corners[(i + 2) % 4];
        (x1 - x0) * (y2 - y1) - (y1 - y0) * (x2 - x1) >= 0.0
    })
}

/// Shoelace area, positive for counter-clockwise winding.
fn signed_area(corners: &[[f64; 2]; 4]) -> f64 {
    (0..4)
        .map(|i| {
            let [x0, y0] = corners[i];
            let [x1, y1] = corners[(i + 1) % 4];
            x0 * y1 - x1 * y0
        })
        .sum::<f64>()
        / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(x: u16, y: u16, gx: i16, gy: i16) -> Pt {
        Pt { x, y, gx, gy, slope: 0.0 }
    }

    /// Samples tracing a rectangle in 2x coordinates, gradients pointing
    /// outward (dark interior).
    fn rect_ring(x0: u16, y0: u16, x1: u16, y1: u16) -> Vec<Pt> {
        let xs = (x0..x1).step_by(2);
        let ys = (y0..y1).step_by(2);
        let mut points: Vec<Pt> = xs.clone().map(|x| pt(x, y0, 0, -255)).collect();
        points.extend(ys.clone().map(|y| pt(x1, y, 255, 0)));
        points.extend(xs.map(|x| pt(x, y1, 0, 255)));
        points.extend(ys.map(|y| pt(x0, y, -255, 0)));
        points
    }

    #[test]
    fn quadrant_slope_increases_counterclockwise() {
        let n = 180;
        let mut prev = f32::MIN;
        for i in 0..n {
            let angle = 0.007 + 2.0 * std::f64::consts::PI * i as f64 / n as f64;
            let s = quadrant_slope(angle.cos(), angle.sin());
            assert!((0.0..4.0).contains(&s), "proxy out of range: {s}");
            assert!(s > prev, "not increasing at sample {i}: {prev} -> {s}");
            prev = s;
        }
    }

    #[test]
    fn polarity_flips_with_gradient_direction() {
        let outward = rect_ring(140, 140, 260, 260);
        assert!(outline_polarity(&outward) > 0.0);

        let inward: Vec<Pt> = outward
            .iter()
            .map(|p| pt(p.x, p.y, -p.gx, -p.gy))
            .collect();
        assert!(outline_polarity(&inward) < 0.0);
    }

    #[test]
    fn ring_moments_wrap_equals_sum_of_parts() {
        let points = [
            pt(10, 2, 100, 0),
            pt(14, 6, 0, 100),
            pt(12, 10, -100, 0),
            pt(8, 6, 0, -100),
        ];
        let prefix = prefix_moments(&points);

        // [3, 1] wraps: samples 3, 0 and 1
        let wrapped = ring_moments(&prefix, 3, 1);
        let by_hand = Moments::of(&points[3]) + Moments::of(&points[0]) + Moments::of(&points[1]);
        assert!((wrapped.w - by_hand.w).abs() < 1e-9);
        assert!((wrapped.mxy - by_hand.mxy).abs() < 1e-9);
    }

    #[test]
    fn fit_edge_recovers_a_sloped_line() {
        // Samples along y = 2x (in pixel units)
        let m = (0..12).fold(Moments::default(), |acc, i| {
            acc + Moments::of(&pt(2 * i as u16, 4 * i as u16, 0, 0))
        });
        let (edge, mse) = fit_edge(m).unwrap();
        assert!(mse < 1e-9, "straight samples should fit exactly: {mse}");
        let along = edge.nx * 1.0 + edge.ny * 2.0;
        assert!(along.abs() < 1e-9, "normal not perpendicular: {along}");
    }

    #[test]
    fn cross_point_of_oblique_edges() {
        let s = std::f64::consts::FRAC_1_SQRT_2;
        // x + y = 2 meets x - y = 0 at (1, 1)
        let a = Edge { px: 2.0, py: 0.0, nx: s, ny: s };
        let b = Edge { px: 0.0, py: 0.0, nx: s, ny: -s };
        let [x, y] = cross_point(a, b).unwrap();
        assert!((x - 1.0).abs() < 1e-9);
        assert!((y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cross_point_rejects_parallel_edges() {
        let a = Edge { px: 0.0, py: 0.0, nx: 0.0, ny: 1.0 };
        let b = Edge { px: 0.0, py: 3.0, nx: 0.0, ny: 1.0 };
        assert!(cross_point(a, b).is_none());
    }

    #[test]
    fn winding_and_convexity_gates() {
        let ccw = [[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]];
        assert!(is_convex_ccw(&ccw));
        assert!(signed_area(&ccw) > 0.0);

        let cw = [[0.0, 0.0], [0.0, 10.0], [10.0, 10.0], [10.0, 0.0]];
        assert!(!is_convex_ccw(&cw));

        // CCW but dented at the third corner
        let dart = [[0.0, 0.0], [10.0, 0.0], [2.0, 2.0], [0.0, 10.0]];
        assert!(!is_convex_ccw(&dart));
    }

    #[test]
    fn smoothing_spreads_a_spike_without_losing_mass() {
        let mut errs = vec![0.0, 0.0, 90.0, 0.0, 0.0, 0.0];
        let mass: f64 = errs.iter().sum();
        smooth_ring(&mut errs);
        assert!(errs[2] < 90.0);
        assert!(errs[1] > 0.0 && errs[3] > 0.0);
        assert!((errs.iter().sum::<f64>() - mass).abs() < 1e-9);
    }

    #[test]
    fn rectangle_ring_fits_one_quad() {
        let mut clusters = [Cluster { points: rect_ring(140, 140, 260, 260) }];
        let quads = fit_quads(&mut clusters, 400, 400, &QuadThreshParams::default());
        assert_eq!(quads.len(), 1);

        // Every fitted corner lands near a true rectangle corner
        let expect = [[70.0, 70.0], [130.0, 70.0], [130.0, 130.0], [70.0, 130.0]];
        for c in quads[0].corners {
            let near = expect
                .iter()
                .any(|e| (c[0] - e[0]).hypot(c[1] - e[1]) < 5.0);
            assert!(near, "corner {c:?} far from every rectangle corner");
        }
    }

    #[test]
    fn light_interior_ring_is_rejected() {
        let points: Vec<Pt> = rect_ring(140, 140, 260, 260)
            .iter()
            .map(|p| pt(p.x, p.y, -p.gx, -p.gy))
            .collect();
        let mut clusters = [Cluster { points }];
        let quads = fit_quads(&mut clusters, 400, 400, &QuadThreshParams::default());
        assert!(quads.is_empty());
    }

    #[test]
    fn ring_longer_than_frame_perimeter_is_rejected() {
        let mut clusters = [Cluster { points: rect_ring(140, 140, 260, 260) }];
        let quads = fit_quads(&mut clusters, 10, 10, &QuadThreshParams::default());
        assert!(quads.is_empty());
    }

    #[test]
    fn default_params_match_standard_tuning() {
        let p = QuadThreshParams::default();
        let knobs = (p.min_cluster_pixels, p.max_nmaxima, p.min_white_black_diff, p.deglitch);
        assert_eq!(knobs, (5, 10, 5, false));
        assert!(p.cos_critical_rad > 0.98);
        assert!((p.max_line_fit_mse - 10.0).abs() < 1e-6);
    }
}
