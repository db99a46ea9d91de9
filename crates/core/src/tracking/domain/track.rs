use std::fmt;

use crate::detection::domain::detection::Detection;
use crate::shared::geometry::{BoundingBox, Point};

/// Session-unique token for one tracked subject. Issued monotonically and
/// never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(u64);

impl Identity {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Position history of one subject while it is active.
#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    pub identity: Identity,
    pub first_center: Point,
    pub last_center: Point,
    pub bbox: BoundingBox,
    pub crossed: bool,
    pub first_seen_frame: usize,
    pub last_seen_frame: usize,
    /// Consecutive processed frames without a matching detection.
    pub missed_updates: usize,
    /// Persistent id from the detection source, if it supplied one.
    pub external_id: Option<u32>,
}

impl Track {
    pub fn spawn(identity: Identity, detection: &Detection, frame_index: usize) -> Self {
        let center = detection.bbox.center();
        Self {
            identity,
            first_center: center,
            last_center: center,
            bbox: detection.bbox,
            crossed: false,
            first_seen_frame: frame_index,
            last_seen_frame: frame_index,
            missed_updates: 0,
            external_id: detection.track_id,
        }
    }

    pub fn observe(&mut self, detection: &Detection, frame_index: usize) {
        self.last_center = detection.bbox.center();
        self.bbox = detection.bbox;
        self.last_seen_frame = frame_index;
        self.missed_updates = 0;
    }

    pub fn mark_missed(&mut self) {
        self.missed_updates += 1;
    }
}
