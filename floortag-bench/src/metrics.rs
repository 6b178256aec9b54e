//! Scoring of detector output against a scene's ground truth.

use floortag::detect::detector::Detection;

use crate::scene::PlacedMarker;

/// Scorecard for one synthetic frame.
#[derive(Debug, Clone)]
pub struct SceneResult {
    /// One entry per ground-truth marker, matched or not.
    pub matches: Vec<DetectionMatch>,
    /// Detections left over after every ground-truth marker claimed its own.
    pub false_positives: Vec<Detection>,
    /// Fraction of ground-truth markers found, 0.0 to 1.0.
    pub detection_rate: f64,
    /// Root mean square of the per-corner distances over all matches, pixels.
    pub corner_rmse: f64,
    /// Worst single corner distance over all matches, pixels.
    pub max_corner_error: f64,
    /// Average corner distance over all matches, pixels.
    pub mean_corner_error: f64,
}

/// One ground-truth marker and whatever the detector said about it.
#[derive(Debug, Clone)]
pub struct DetectionMatch {
    pub ground_truth: PlacedMarker,
    pub detection: Option<Detection>,
    /// Corner distances in printed order [TL, TR, BR, BL], if matched.
    pub corner_errors: Option<[f64; 4]>,
}

/// Score `detections` against `ground_truth`, pairing strictly by id.
///
/// Corners are compared position by position in printed order. The detector
/// promises corner 0 at the printed top-left, so a detection that comes back
/// rotated is charged the full corner distance rather than silently realigned.
pub fn evaluate(ground_truth: &[PlacedMarker], detections: &[Detection]) -> SceneResult {
    let mut claimed = vec![false; detections.len()];
    let mut matches = Vec::with_capacity(ground_truth.len());

    for gt in ground_truth {
        let hit = (0..detections.len()).find(|&i| !claimed[i] && detections[i].id == gt.id);
        let (detection, errors) = match hit {
            Some(i) => {
                claimed[i] = true;
                let det = &detections[i];
                (Some(det.clone()), Some(corner_errors(&gt.corners, &det.corners)))
            }
            None => (None, None),
        };
        matches.push(DetectionMatch {
            ground_truth: gt.clone(),
            detection,
            corner_errors: errors,
        });
    }

    let false_positives: Vec<Detection> = detections
        .iter()
        .zip(&claimed)
        .filter(|&(_, taken)| !taken)
        .map(|(det, _)| det.clone())
        .collect();

    let found = matches.iter().filter(|m| m.detection.is_some()).count();
    let detection_rate = match ground_truth.len() {
        0 => 1.0,
        n => found as f64 / n as f64,
    };

    let (corner_rmse, max_corner_error, mean_corner_error) =
        corner_stats(matches.iter().filter_map(|m| m.corner_errors));

    SceneResult {
        matches,
        false_positives,
        detection_rate,
        corner_rmse,
        max_corner_error,
        mean_corner_error,
    }
}

/// Euclidean distance per corner, printed order preserved.
fn corner_errors(gt: &[[f64; 2]; 4], det: &[[i32; 2]; 4]) -> [f64; 4] {
    std::array::from_fn(|i| {
        let dx = gt[i][0] - det[i][0] as f64;
        let dy = gt[i][1] - det[i][1] as f64;
        dx.hypot(dy)
    })
}

/// (rmse, max, mean) pooled over every corner distance; zeros when nothing
/// matched.
fn corner_stats(errors: impl Iterator<Item = [f64; 4]>) -> (f64, f64, f64) {
    let mut n = 0usize;
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    let mut worst = 0.0_f64;

    for e in errors.flatten() {
        n += 1;
        sum += e;
        sum_sq += e * e;
        worst = worst.max(e);
    }

    if n == 0 {
        return (0.0, 0.0, 0.0);
    }
    ((sum_sq / n as f64).sqrt(), worst, sum / n as f64)
}
