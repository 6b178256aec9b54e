//! Ground-plane calibration and pixel-to-world projection.
//!
//! A [`PlaneMapper`] owns a table of calibration anchors (marker ids with
//! known world positions) and consumes each frame's detections to maintain
//! a pixel-to-world homography. Calibration is continuous: every frame
//! with at least four visible anchors replaces the mapping, and frames
//! with fewer leave the previous mapping in place. A stale mapping keeps
//! serving projections until a later frame replaces it.

use std::collections::BTreeMap;

use log::{debug, trace};

use crate::detect::detector::Detection;
use crate::homography::{self, Homography};

/// A point on the ground plane, in world units.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorldPoint {
    pub x: f64,
    pub y: f64,
}

impl WorldPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Known world positions for calibration marker ids.
#[derive(Debug, Clone, Default)]
pub struct CalibrationMap {
    anchors: BTreeMap<u32, WorldPoint>,
}

impl CalibrationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard six-marker layout for a rectangular floor region of
    /// `width` x `height` world units: ids 0 and 1 on the left edge, 2 and
    /// 3 at the midpoints of the top and bottom edges, 4 and 5 on the
    /// right edge.
    pub fn rectangle(width: f64, height: f64) -> Self {
        let mut map = Self::new();
        map.insert(0, WorldPoint::new(0.0, 0.0));
        map.insert(1, WorldPoint::new(0.0, height));
        map.insert(2, WorldPoint::new(width / 2.0, 0.0));
        map.insert(3, WorldPoint::new(width / 2.0, height));
        map.insert(4, WorldPoint::new(width, 0.0));
        map.insert(5, WorldPoint::new(width, height));
        map
    }

    pub fn insert(&mut self, id: u32, point: WorldPoint) {
        self.anchors.insert(id, point);
    }

    pub fn get(&self, id: u32) -> Option<WorldPoint> {
        self.anchors.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, WorldPoint)> + '_ {
        self.anchors.iter().map(|(&id, &p)| (id, p))
    }
}

impl FromIterator<(u32, WorldPoint)> for CalibrationMap {
    fn from_iter<T: IntoIterator<Item = (u32, WorldPoint)>>(iter: T) -> Self {
        Self {
            anchors: iter.into_iter().collect(),
        }
    }
}

/// Outcome of feeding one frame's detections to
/// [`PlaneMapper::compute_homography`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationUpdate {
    /// A new homography was solved and installed from this frame.
    Updated,
    /// The frame did not yield a usable calibration; any previously
    /// installed homography stays in effect.
    Unchanged,
}

/// Outcome of projecting a pixel through the current calibration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Point(WorldPoint),
    /// No homography has been installed yet.
    NoCalibration,
    /// The pixel lies on the horizon of the current homography and has no
    /// finite world position.
    Degenerate,
}

/// Maintains the pixel-to-world homography for one camera view.
pub struct PlaneMapper {
    anchors: CalibrationMap,
    h: Option<Homography>,
}

impl PlaneMapper {
    /// Create an uncalibrated mapper over a fixed anchor table.
    pub fn new(anchors: CalibrationMap) -> Self {
        Self { anchors, h: None }
    }

    pub fn anchors(&self) -> &CalibrationMap {
        &self.anchors
    }

    pub fn is_calibrated(&self) -> bool {
        self.h.is_some()
    }

    /// The currently installed pixel-to-world homography, if any.
    pub fn homography(&self) -> Option<&Homography> {
        self.h.as_ref()
    }

    /// Recompute the homography from one frame's detections.
    ///
    /// Detections whose id is an anchor contribute a correspondence from
    /// their center pixel to the anchor's world point; ids are paired
    /// explicitly, and only the first detection of each anchor id counts.
    /// Fewer than four distinct correspondences, or a correspondence set
    /// the solver rejects (collinear or coincident centers), leaves the
    /// previous homography installed and returns
    /// [`CalibrationUpdate::Unchanged`].
    pub fn compute_homography(&mut self, detections: &[Detection]) -> CalibrationUpdate {
        let mut seen: BTreeMap<u32, ([f64; 2], WorldPoint)> = BTreeMap::new();
        for d in detections {
            if let Some(p) = self.anchors.get(d.id) {
                seen.entry(d.id).or_insert((d.center, p));
            }
        }

        if seen.len() < 4 {
            trace!("calibration skipped: {} of 4 required anchors visible", seen.len());
            return CalibrationUpdate::Unchanged;
        }

        let mut src = Vec::with_capacity(seen.len());
        let mut dst = Vec::with_capacity(seen.len());
        for &(center, p) in seen.values() {
            src.push(center);
            dst.push([p.x, p.y]);
        }

        match homography::estimate(&src, &dst) {
            Some(h) => {
                debug!("homography installed from {} anchors", src.len());
                self.h = Some(h);
                CalibrationUpdate::Updated
            }
            None => {
                trace!("calibration skipped: solver rejected {} correspondences", src.len());
                CalibrationUpdate::Unchanged
            }
        }
    }

    /// Project a pixel position onto the world plane.
    pub fn pixel_to_world(&self, px: f64, py: f64) -> Projection {
        let Some(h) = &self.h else {
            return Projection::NoCalibration;
        };
        match h.apply(px, py) {
            Some([x, y]) => Projection::Point(WorldPoint::new(x, y)),
            None => Projection::Degenerate,
        }
    }
}
