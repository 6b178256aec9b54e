//! Planar projective transforms.
//!
//! One solver serves two callers: the decoder maps marker tag space
//! [-1, 1]² onto a fitted quad, and the plane mapper maps frame pixels
//! onto ground-plane coordinates. Both paths run the normalized DLT;
//! exactly four correspondences use the direct 8×8 solve, more use the
//! least-squares SVD formulation.

use nalgebra::{DMatrix, Matrix3, SMatrix, SVector, Vector3};

/// |w| below this after the projective transform means the point is at or
/// beyond the horizon of the mapping and has no finite image.
const W_EPS: f64 = 1e-12;

/// Marker tag-space corners: top-left, top-right, bottom-right,
/// bottom-left of the printed marker, spanning the bordered pattern.
pub const TAG_CORNERS: [[f64; 2]; 4] = [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]];

/// A 3×3 projective transform between two planes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn from_array(rows: [[f64; 3]; 3]) -> Self {
        Self::new(Matrix3::from_row_slice(&[
            rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2], rows[2][0],
            rows[2][1], rows[2][2],
        ]))
    }

    pub fn to_array(&self) -> [[f64; 3]; 3] {
        [
            [self.h[(0, 0)], self.h[(0, 1)], self.h[(0, 2)]],
            [self.h[(1, 0)], self.h[(1, 1)], self.h[(1, 2)]],
            [self.h[(2, 0)], self.h[(2, 1)], self.h[(2, 2)]],
        ]
    }

    /// Apply the transform: lift (x, y) to homogeneous coordinates,
    /// multiply, perspective-divide.
    ///
    /// Returns `None` when the homogeneous w lands within `W_EPS` of zero;
    /// dividing there would produce unbounded coordinates.
    #[inline]
    pub fn apply(&self, x: f64, y: f64) -> Option<[f64; 2]> {
        let v = self.h * Vector3::new(x, y, 1.0);
        let w = v[2];
        if w.abs() < W_EPS {
            return None;
        }
        Some([v[0] / w, v[1] / w])
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }
}

/// Map tag space onto a fitted quad: H such that tag corner k lands on
/// `corners[k]`.
pub fn from_quad(corners: &[[f64; 2]; 4]) -> Option<Homography> {
    from_4pt(&TAG_CORNERS, corners)
}

/// Best-fit H with `dst ~ H * src` over equal-length point sets.
///
/// Fewer than 4 correspondences leave a planar projective transform
/// underdetermined; that and mismatched lengths return `None`, as does any
/// degenerate geometry the linear solve cannot handle.
pub fn estimate(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Option<Homography> {
    if src.len() != dst.len() || src.len() < 4 {
        return None;
    }

    if src.len() == 4 {
        let s: &[[f64; 2]; 4] = src.try_into().ok()?;
        let d: &[[f64; 2]; 4] = dst.try_into().ok()?;
        return from_4pt(s, d);
    }

    let (s, ts) = normalize_points(src);
    let (d, td) = normalize_points(dst);

    // Stack Ah = 0, two rows per correspondence
    let n = src.len();
    let mut a = DMatrix::<f64>::zeros(2 * n, 9);

    for k in 0..n {
        let x = s[k][0];
        let y = s[k][1];
        let u = d[k][0];
        let v = d[k][1];

        // [ -x -y -1   0  0  0   u*x u*y u ]
        a[(2 * k, 0)] = -x;
        a[(2 * k, 1)] = -y;
        a[(2 * k, 2)] = -1.0;
        a[(2 * k, 6)] = u * x;
        a[(2 * k, 7)] = u * y;
        a[(2 * k, 8)] = u;

        // [ 0  0  0  -x -y -1   v*x v*y v ]
        a[(2 * k + 1, 3)] = -x;
        a[(2 * k + 1, 4)] = -y;
        a[(2 * k + 1, 5)] = -1.0;
        a[(2 * k + 1, 6)] = v * x;
        a[(2 * k + 1, 7)] = v * y;
        a[(2 * k + 1, 8)] = v;
    }

    // Right singular vector of the smallest singular value
    let svd = a.svd(true, true);
    let vt = svd.v_t?;
    let last = vt.nrows().checked_sub(1)?;
    let h = vt.row(last);

    let hn =
        Matrix3::<f64>::from_row_slice(&[h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]]);

    let h_den = denormalize(hn, ts, td)?;
    rescale(h_den).map(Homography::new)
}

/// Direct solve from exactly four correspondences, h33 fixed to 1.
fn from_4pt(src: &[[f64; 2]; 4], dst: &[[f64; 2]; 4]) -> Option<Homography> {
    // For each (x,y) -> (u,v):
    //   h11 x + h12 y + h13 - u h31 x - u h32 y = u
    //   h21 x + h22 y + h23 - v h31 x - v h32 y = v
    let (src_n, t_src) = normalize_points(src);
    let (dst_n, t_dst) = normalize_points(dst);

    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for k in 0..4 {
        let x = src_n[k][0];
        let y = src_n[k][1];
        let u = dst_n[k][0];
        let v = dst_n[k][1];

        let r0 = 2 * k;
        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = 1.0;
        a[(r0, 6)] = -u * x;
        a[(r0, 7)] = -u * y;
        b[r0] = u;

        let r1 = 2 * k + 1;
        a[(r1, 3)] = x;
        a[(r1, 4)] = y;
        a[(r1, 5)] = 1.0;
        a[(r1, 6)] = -v * x;
        a[(r1, 7)] = -v * y;
        b[r1] = v;
    }

    let x = a.lu().solve(&b)?;

    let hn = Matrix3::<f64>::new(
        x[0], x[1], x[2], //
        x[3], x[4], x[5], //
        x[6], x[7], 1.0,
    );

    let h_den = denormalize(hn, t_src, t_dst)?;
    rescale(h_den).map(Homography::new)
}

/// Hartley normalization: centroid to the origin, mean distance √2.
fn normalize_points(pts: &[[f64; 2]]) -> (Vec<[f64; 2]>, Matrix3<f64>) {
    let n = pts.len() as f64;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for p in pts {
        cx += p[0];
        cy += p[1];
    }
    cx /= n;
    cy /= n;

    let mut mean_dist = 0.0;
    for p in pts {
        let dx = p[0] - cx;
        let dy = p[1] - cy;
        mean_dist += (dx * dx + dy * dy).sqrt();
    }
    mean_dist /= n;

    let s = if mean_dist > 1e-12 {
        (2.0f64).sqrt() / mean_dist
    } else {
        1.0
    };
    let t = Matrix3::<f64>::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);

    let mut out = Vec::with_capacity(pts.len());
    for p in pts {
        let v = t * Vector3::new(p[0], p[1], 1.0);
        out.push([v[0], v[1]]);
    }
    (out, t)
}

/// Undo the normalizing transforms: H = T_dst⁻¹ · Hn · T_src.
fn denormalize(hn: Matrix3<f64>, t_src: Matrix3<f64>, t_dst: Matrix3<f64>) -> Option<Matrix3<f64>> {
    let t_dst_inv = t_dst.try_inverse()?;
    Some(t_dst_inv * hn * t_src)
}

/// Scale so h33 = 1; a vanishing h33 marks a degenerate solution.
fn rescale(h: Matrix3<f64>) -> Option<Matrix3<f64>> {
    let s = h[(2, 2)];
    if s.abs() < 1e-12 {
        return None;
    }
    Some(h / s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_close(a: [f64; 2], b: [f64; 2], tol: f64) {
        assert!(
            (a[0] - b[0]).abs() < tol && (a[1] - b[1]).abs() < tol,
            "expected ({:.6},{:.6}) ~ ({:.6},{:.6}) within {}",
            a[0],
            a[1],
            b[0],
            b[1],
            tol
        );
    }

    #[test]
    fn apply_identity() {
        let h = Homography::new(Matrix3::identity());
        let p = h.apply(3.0, -2.0).unwrap();
        assert_relative_eq!(p[0], 3.0);
        assert_relative_eq!(p[1], -2.0);
    }

    #[test]
    fn apply_near_zero_w_is_none() {
        // Third row annihilates (1, 1, 1)
        let h = Homography::from_array([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, -2.0]]);
        assert!(h.apply(1.0, 1.0).is_none());
        assert!(h.apply(0.0, 0.0).is_some());
    }

    #[test]
    fn inverse_round_trips_points() {
        let h = Homography::new(Matrix3::new(
            1.2, 0.1, 5.0, //
            -0.05, 0.9, 3.0, //
            0.001, 0.0005, 1.0,
        ));
        let inv = h.inverse().expect("invertible");

        for p in [[0.0, 0.0], [50.0, -20.0], [320.0, 200.0]] {
            let q = h.apply(p[0], p[1]).unwrap();
            let back = inv.apply(q[0], q[1]).unwrap();
            assert_close(back, p, 1e-3);
        }
    }

    #[test]
    fn four_point_solve_recovers_h() {
        let ground_truth = Homography::new(Matrix3::new(
            0.8, 0.05, 120.0, //
            -0.02, 1.1, 80.0, //
            0.0009, -0.0004, 1.0,
        ));

        let src = [[0.0, 0.0], [180.0, 0.0], [180.0, 130.0], [0.0, 130.0]];
        let dst = src.map(|p| ground_truth.apply(p[0], p[1]).unwrap());

        let recovered = estimate(&src, &dst).expect("recoverable");

        for p in [[0.0, 0.0], [60.0, 40.0], [150.0, 120.0]] {
            assert_close(
                recovered.apply(p[0], p[1]).unwrap(),
                ground_truth.apply(p[0], p[1]).unwrap(),
                1e-3,
            );
        }
    }

    #[test]
    fn dlt_handles_overdetermined_case() {
        let ground_truth = Homography::new(Matrix3::new(
            1.0, 0.2, 12.0, //
            -0.1, 0.9, 6.0, //
            0.0006, 0.0004, 1.0,
        ));

        let src: Vec<[f64; 2]> = (0..3)
            .flat_map(|y| (0..3).map(move |x| [x as f64 * 40.0, y as f64 * 50.0]))
            .collect();
        let dst: Vec<[f64; 2]> = src
            .iter()
            .map(|p| ground_truth.apply(p[0], p[1]).unwrap())
            .collect();

        let estimated = estimate(&src, &dst).expect("estimate");
        for p in [[0.0, 0.0], [60.0, 40.0], [80.0, 90.0], [80.0, 100.0]] {
            assert_close(
                estimated.apply(p[0], p[1]).unwrap(),
                ground_truth.apply(p[0], p[1]).unwrap(),
                1e-3,
            );
        }
    }

    #[test]
    fn mismatched_input_lengths_fail() {
        let src = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        let dst = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]];
        assert!(estimate(&src, &dst).is_none());
    }

    #[test]
    fn fewer_than_four_fails() {
        let src = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]];
        let dst = [[5.0, 5.0], [6.0, 5.0], [6.0, 6.0]];
        assert!(estimate(&src, &dst).is_none());
    }

    #[test]
    fn collinear_points_fail() {
        let src = [[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [3.0, 0.0]];
        let dst = [[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [3.0, 3.0]];
        assert!(estimate(&src, &dst).is_none());
    }

    #[test]
    fn coincident_points_fail() {
        let src = [[1.0, 1.0]; 4];
        let dst = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        assert!(estimate(&src, &dst).is_none());
    }

    #[test]
    fn from_quad_maps_tag_corners() {
        let corners = [[100.0, 100.0], [200.0, 110.0], [210.0, 205.0], [95.0, 195.0]];
        let h = from_quad(&corners).expect("quad homography");
        for (k, tc) in TAG_CORNERS.iter().enumerate() {
            let p = h.apply(tc[0], tc[1]).unwrap();
            assert_close(p, corners[k], 1e-6);
        }
        // Tag center lands inside the quad
        let c = h.apply(0.0, 0.0).unwrap();
        assert!(c[0] > 95.0 && c[0] < 210.0);
        assert!(c[1] > 100.0 && c[1] < 205.0);
    }
}
