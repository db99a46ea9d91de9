use crate::detection::domain::detection::Detection;
use crate::tracking::domain::track::Track;
use crate::tracking::domain::track_matcher::{greedy_assign, Assignment, TrackMatcher};

/// Pairs detections with the nearest track centroid.
///
/// Candidate pairs farther apart than `max_distance` pixels are never
/// matched. Large frame skips make real displacements exceed the gate, so
/// the gate should grow with the sampler interval.
pub struct NearestCentroidMatcher {
    max_distance: f64,
}

impl NearestCentroidMatcher {
    pub fn new(max_distance: f64) -> Self {
        Self { max_distance }
    }
}

impl TrackMatcher for NearestCentroidMatcher {
    fn assign(&self, detections: &[Detection], tracks: &[&Track]) -> Vec<Assignment> {
        let mut candidates = Vec::new();
        for (di, det) in detections.iter().enumerate() {
            let center = det.bbox.center();
            for (ti, track) in tracks.iter().enumerate() {
                let dist = center.distance(&track.last_center);
                if dist <= self.max_distance {
                    candidates.push((di, ti, dist));
                }
            }
        }
        greedy_assign(candidates, false)
    }
}
