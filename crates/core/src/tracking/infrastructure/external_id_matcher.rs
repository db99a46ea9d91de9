use crate::detection::domain::detection::Detection;
use crate::tracking::domain::track::Track;
use crate::tracking::domain::track_matcher::{Assignment, TrackMatcher};

/// Trusts the persistent ids of a detection source that runs its own
/// multi-object tracker. A detection matches the active track holding the
/// same external id; detections without an id are rejected.
pub struct ExternalIdMatcher;

impl TrackMatcher for ExternalIdMatcher {
    fn assign(&self, detections: &[Detection], tracks: &[&Track]) -> Vec<Assignment> {
        let mut used = vec![false; tracks.len()];
        let mut out = Vec::new();
        for (di, det) in detections.iter().enumerate() {
            let Some(ext) = det.track_id else {
                continue;
            };
            let found = tracks
                .iter()
                .enumerate()
                .find(|(ti, t)| !used[*ti] && t.external_id == Some(ext));
            if let Some((ti, _)) = found {
                used[ti] = true;
                out.push(Assignment {
                    detection: di,
                    track: ti,
                });
            }
        }
        out
    }

    fn accepts(&self, detection: &Detection) -> bool {
        detection.track_id.is_some()
    }

    fn keys_on_external_id(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::geometry::BoundingBox;
    use crate::tracking::domain::track::Identity;

    fn det(ext: u32, cx: f64) -> Detection {
        Detection::new(0, 0.9, BoundingBox::new(cx - 5.0, 0.0, cx + 5.0, 10.0)).with_track_id(ext)
    }

    #[test]
    fn test_matches_by_external_id_not_position() {
        let a = Track::spawn(Identity::new(1), &det(7, 0.0), 0);
        let b = Track::spawn(Identity::new(2), &det(8, 500.0), 0);
        // id 7 jumped next to track b's position.
        let out = ExternalIdMatcher.assign(&[det(7, 499.0)], &[&a, &b]);
        assert_eq!(out, vec![Assignment { detection: 0, track: 0 }]);
    }

    #[test]
    fn test_unknown_external_id_is_unassigned() {
        let a = Track::spawn(Identity::new(1), &det(7, 0.0), 0);
        assert!(ExternalIdMatcher.assign(&[det(9, 0.0)], &[&a]).is_empty());
    }

    #[test]
    fn test_duplicate_external_id_in_frame_matches_once() {
        let a = Track::spawn(Identity::new(1), &det(7, 0.0), 0);
        let out = ExternalIdMatcher.assign(&[det(7, 0.0), det(7, 3.0)], &[&a]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_rejects_detection_without_id() {
        let plain = Detection::new(0, 0.9, BoundingBox::new(0.0, 0.0, 1.0, 1.0));
        assert!(!ExternalIdMatcher.accepts(&plain));
    }
}
