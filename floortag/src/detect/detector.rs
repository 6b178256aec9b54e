use log::debug;

#[cfg(feature = "parallel")]
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::dict::{Dictionary, Matcher};
use crate::homography::{self, Homography, TAG_CORNERS};

use super::cluster::gradient_clusters;
use super::connected::connected_components;
use super::decode::decode_quad;
use super::dedup::deduplicate;
use super::image::GrayImage;
use super::preprocess::{apply_sigma, decimate};
use super::quad::{fit_quads, Quad, QuadThreshParams};
use super::refine::refine_edges;
use super::threshold::threshold;

/// A detected marker in an image.
///
/// `corners[0]` is the marker's printed top-left corner regardless of how
/// the marker is turned in the image; the remaining corners follow in the
/// printed order. Corner positions are truncated to whole pixels.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Detection {
    pub id: u32,
    pub hamming: u8,
    pub decision_margin: f32,
    pub corners: [[i32; 2]; 4],
    /// Centroid of the four corners.
    pub center: [f64; 2],
    /// Angle of the printed top edge in image coordinates, radians.
    pub orientation: f64,
}

/// Detector configuration.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Factor by which the image is shrunk before quad search. 1 disables.
    pub quad_decimate: f32,
    /// Gaussian blur sigma applied after decimation. 0 disables.
    pub quad_sigma: f32,
    /// Re-fit quad edges against the full-resolution image.
    pub refine_edges: bool,
    /// Strength of the sharpening applied to sampled cell values.
    pub decode_sharpening: f64,
    /// Reject decodes with more than this many correctable bit errors.
    pub max_hamming: u8,
    /// Tuning for the quad-fitting stage.
    pub quad_params: QuadThreshParams,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            quad_decimate: 1.0,
            quad_sigma: 0.0,
            refine_edges: true,
            decode_sharpening: 0.25,
            max_hamming: 1,
            quad_params: QuadThreshParams::default(),
        }
    }
}

/// A marker detector bound to one dictionary.
pub struct Detector {
    pub config: DetectorConfig,
    matcher: Matcher,
}

impl Detector {
    /// Create a detector for a dictionary with the given configuration.
    pub fn new(dict: Dictionary, config: DetectorConfig) -> Self {
        let matcher = Matcher::new(dict, config.max_hamming);
        Self { config, matcher }
    }

    pub fn dictionary(&self) -> Dictionary {
        self.matcher.dictionary()
    }

    /// Detect markers in a grayscale image.
    ///
    /// Quads are searched on a decimated, optionally blurred working copy;
    /// decoding and edge refinement sample the untouched input.
    pub fn detect(&self, img: &GrayImage) -> Vec<Detection> {
        let factor = self.config.quad_decimate as u32;
        let params = &self.config.quad_params;

        let reduced = apply_sigma(&decimate(img, factor), self.config.quad_sigma);

        let threshed = threshold(&reduced, params.min_white_black_diff, params.deglitch);
        let mut uf = connected_components(&threshed);
        let mut clusters = gradient_clusters(&threshed, &mut uf, params.min_cluster_pixels as u32);
        let mut quads = fit_quads(&mut clusters, reduced.width, reduced.height, params);

        // Quad corners live in working-copy coordinates until rescaled
        if factor > 1 {
            for corner in quads.iter_mut().flat_map(|q| q.corners.iter_mut()) {
                corner[0] *= factor as f64;
                corner[1] *= factor as f64;
            }
        }

        if self.config.refine_edges {
            for q in &mut quads {
                refine_edges(q, img, self.config.quad_decimate);
            }
        }

        let decode_one = |quad: &Quad| -> Option<Detection> {
            let h = homography::from_quad(&quad.corners)?;
            let result = decode_quad(img, &self.matcher, &h, self.config.decode_sharpening)?;
            let (corners, center, orientation) = detection_geometry(&h, result.rotation)?;

            Some(Detection {
                id: result.id,
                hamming: result.hamming,
                decision_margin: result.decision_margin,
                corners,
                center,
                orientation,
            })
        };

        #[cfg(feature = "parallel")]
        let mut detections: Vec<Detection> = quads.par_iter().filter_map(decode_one).collect();

        #[cfg(not(feature = "parallel"))]
        let mut detections: Vec<Detection> = quads.iter().filter_map(decode_one).collect();

        deduplicate(&mut detections);

        debug!(
            "{} clusters, {} quads, {} detections",
            clusters.len(),
            quads.len(),
            detections.len()
        );

        detections
    }
}

/// Rotate the quad corners so index 0 lands on the marker's printed
/// top-left corner, then derive the integer corners, centroid and top-edge
/// angle.
fn detection_geometry(h: &Homography, rotation: u8) -> Option<([[i32; 2]; 4], [f64; 2], f64)> {
    let mut corners = [[0i32; 2]; 4];
    for (i, corner) in corners.iter_mut().enumerate() {
        let src = TAG_CORNERS[(i + rotation as usize) % 4];
        let [px, py] = h.apply(src[0], src[1])?;
        *corner = [px as i32, py as i32];
    }

    let mut center = [0.0f64; 2];
    for c in &corners {
        center[0] += c[0] as f64;
        center[1] += c[1] as f64;
    }
    center[0] /= 4.0;
    center[1] /= 4.0;

    let dx = (corners[1][0] - corners[0][0]) as f64;
    let dy = (corners[1][1] - corners[0][1]) as f64;
    let orientation = dy.atan2(dx);

    Some((corners, center, orientation))
}
