use crate::detection::domain::detection::Detection;
use crate::tracking::domain::track::Track;

/// Pairing of a detection (by index into the frame's accepted list) with an
/// active track (by index into the slice given to the matcher).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Assignment {
    pub detection: usize,
    pub track: usize,
}

/// Strategy for carrying identity across frames.
///
/// Implementations must use each detection and each track at most once.
/// Detections left unassigned become new tracks.
pub trait TrackMatcher: Send {
    fn assign(&self, detections: &[Detection], tracks: &[&Track]) -> Vec<Assignment>;

    /// Whether a detection carries what this strategy needs. Rejected
    /// detections are treated as malformed and never reach a track.
    fn accepts(&self, _detection: &Detection) -> bool {
        true
    }

    /// Whether a detection's external id names its track. When true, at
    /// most one active track may hold a given external id.
    fn keys_on_external_id(&self) -> bool {
        false
    }
}

/// Greedy global assignment over scored candidate pairs: best score first,
/// each side used once. `higher_is_better` selects the sort order.
pub(crate) fn greedy_assign(
    mut candidates: Vec<(usize, usize, f64)>,
    higher_is_better: bool,
) -> Vec<Assignment> {
    candidates.sort_by(|a, b| {
        let ord = a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal);
        if higher_is_better {
            ord.reverse()
        } else {
            ord
        }
    });

    let mut used_dets = std::collections::HashSet::new();
    let mut used_tracks = std::collections::HashSet::new();
    let mut out = Vec::new();
    for (di, ti, _) in candidates {
        if used_dets.contains(&di) || used_tracks.contains(&ti) {
            continue;
        }
        used_dets.insert(di);
        used_tracks.insert(ti);
        out.push(Assignment {
            detection: di,
            track: ti,
        });
    }
    out
}
