use crate::detection::domain::detection::Detection;
use crate::tracking::domain::track::Track;
use crate::tracking::domain::track_matcher::{greedy_assign, Assignment, TrackMatcher};

/// Greedy IoU association between detection boxes and each track's last
/// box, as in ByteTrack's association step.
///
/// Robust for dense scenes at high frame rates; with a large sampler
/// interval boxes stop overlapping and every frame spawns new tracks.
pub struct IouMatcher {
    min_iou: f64,
}

impl IouMatcher {
    pub fn new(min_iou: f64) -> Self {
        Self { min_iou }
    }
}

impl TrackMatcher for IouMatcher {
    fn assign(&self, detections: &[Detection], tracks: &[&Track]) -> Vec<Assignment> {
        let mut candidates = Vec::new();
        for (di, det) in detections.iter().enumerate() {
            for (ti, track) in tracks.iter().enumerate() {
                let score = det.bbox.iou(&track.bbox);
                if score >= self.min_iou {
                    candidates.push((di, ti, score));
                }
            }
        }
        greedy_assign(candidates, true)
    }
}
