//! Geometric placements for markers in a synthetic frame.
//!
//! Every transform maps **tag space** to image space: the bordered marker
//! spans [-1, 1] x [-1, 1] with corners (-1,-1), (1,-1), (1,1), (-1,1) in
//! printed order (top-left, top-right, bottom-right, bottom-left).

use floortag::homography::{Homography, TAG_CORNERS};

/// A placement mapping tag space into the frame.
#[derive(Debug, Clone, Copy)]
pub enum Transform {
    /// Translate, scale and rotate, no perspective.
    Similarity {
        /// Marker center in image coordinates.
        cx: f64,
        cy: f64,
        /// Pixels per tag unit (half the bordered marker size).
        scale: f64,
        /// In-plane rotation in radians.
        theta: f64,
    },

    /// Full projective placement via a row-major 3x3 matrix.
    Perspective { h: [[f64; 3]; 3] },

    /// Pose-style placement: "put a marker here, this big, with this tilt."
    FromPose {
        /// Marker center in image coordinates.
        center: [f64; 2],
        /// Full width of the bordered marker in pixels.
        size: f64,
        /// In-plane rotation in radians.
        roll: f64,
        /// Tilt around the vertical axis (left-right lean), radians.
        tilt_x: f64,
        /// Tilt around the horizontal axis (top-bottom lean), radians.
        tilt_y: f64,
    },
}

impl Transform {
    /// The tag-space to image-space homography for this placement.
    pub fn homography(&self) -> Homography {
        match *self {
            Transform::Similarity { cx, cy, scale, theta } => {
                let (sin, cos) = theta.sin_cos();
                Homography::from_array([
                    [scale * cos, -scale * sin, cx],
                    [scale * sin, scale * cos, cy],
                    [0.0, 0.0, 1.0],
                ])
            }
            Transform::Perspective { h } => Homography::from_array(h),
            Transform::FromPose { center, size, roll, tilt_x, tilt_y } => {
                let half = size / 2.0;
                let (sr, cr) = roll.sin_cos();
                let (sx, cx) = tilt_x.sin_cos();
                let (sy, cy) = tilt_y.sin_cos();

                // First two columns of Rz(roll) * Ry(tilt_x) * Rx(tilt_y):
                // the in-plane axes of the tilted marker.
                let r0 = [cr * cx, sr * cx, -sx];
                let r1 = [cr * sx * sy - sr * cy, sr * sx * sy + cr * cy, cx * sy];

                // Virtual focal length proportional to the marker size keeps
                // the foreshortening strength independent of scale.
                let f = size * 2.0;

                Homography::from_array([
                    [half * r0[0], half * r1[0], center[0]],
                    [half * r0[1], half * r1[1], center[1]],
                    [half * r0[2] / f, half * r1[2] / f, 1.0],
                ])
            }
        }
    }

    /// Project a tag-space point into the image.
    pub fn project(&self, tx: f64, ty: f64) -> (f64, f64) {
        let [ix, iy] = self
            .homography()
            .apply(tx, ty)
            .expect("placement folds the marker over the horizon");
        (ix, iy)
    }

    /// Image positions of the bordered marker's corners, printed order.
    pub fn ground_truth_corners(&self) -> [[f64; 2]; 4] {
        TAG_CORNERS.map(|[tx, ty]| {
            let (ix, iy) = self.project(tx, ty);
            [ix, iy]
        })
    }
}
