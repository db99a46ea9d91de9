use crate::counting::domain::boundary::Boundary;
use crate::tracking::domain::track::Track;

/// Once-per-identity decision rule for counting a boundary transition.
pub trait CrossingPolicy: Send {
    /// Returns `true` on exactly one call per track, the one at which the
    /// crossing is detected, and marks the track crossed. Later calls on a
    /// crossed track return `false`.
    fn evaluate(&self, track: &mut Track) -> bool;
}

/// Single static directional line with a net-displacement check.
///
/// A track counts once its latest centroid is strictly past the line on the
/// counted side and it has moved more than `min_displacement` pixels in the
/// counted direction since it spawned. Subjects first seen already past the
/// line therefore only count after moving further in the counted direction.
/// `min_displacement` absorbs detector jitter around a spawn point.
pub struct DirectionalLinePolicy {
    boundary: Boundary,
    min_displacement: f64,
}

impl DirectionalLinePolicy {
    pub fn new(boundary: Boundary, min_displacement: f64) -> Self {
        Self {
            boundary,
            min_displacement: min_displacement.max(0.0),
        }
    }

    pub fn boundary(&self) -> &Boundary {
        &self.boundary
    }
}

impl CrossingPolicy for DirectionalLinePolicy {
    fn evaluate(&self, track: &mut Track) -> bool {
        if track.crossed {
            return false;
        }
        let past = self.boundary.is_past(&track.last_center);
        let moved = self
            .boundary
            .displacement(&track.first_center, &track.last_center)
            > self.min_displacement;
        if past && moved {
            track.crossed = true;
            return true;
        }
        false
    }
}
