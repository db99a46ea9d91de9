use crate::detection::domain::detection::Detection;
use crate::shared::constants::{DEFAULT_CONFIDENCE_THRESHOLD, PERSON_CLASS_ID, TRACKER_MAX_LOST};
use crate::tracking::domain::track::{Identity, Track};
use crate::tracking::domain::track_matcher::TrackMatcher;

#[derive(Clone, Debug, PartialEq)]
pub struct TrackerConfig {
    pub target_class: u32,
    /// Detections must score strictly above this to be accepted.
    pub confidence_threshold: f64,
    /// Consecutive processed frames a track may go unmatched before retiring.
    pub max_lost: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            target_class: PERSON_CLASS_ID,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            max_lost: TRACKER_MAX_LOST,
        }
    }
}

/// Assigns persistent identities to per-frame detections.
///
/// Per update: filter to the target class above the confidence threshold,
/// let the matcher pair detections with active tracks, spawn tracks for the
/// rest, age unmatched tracks and retire those lost for more than
/// `max_lost` frames. Identities are issued from 1 upward, so an identity
/// below the counter that is no longer active is retired for good.
pub struct IdentityTracker {
    tracks: Vec<Track>,
    matcher: Box<dyn TrackMatcher>,
    config: TrackerConfig,
    next_id: u64,
    retired_count: usize,
}

impl IdentityTracker {
    pub fn new(matcher: Box<dyn TrackMatcher>, config: TrackerConfig) -> Self {
        Self {
            tracks: Vec::new(),
            matcher,
            config,
            next_id: 1,
            retired_count: 0,
        }
    }

    pub fn accepts(&self, detection: &Detection) -> bool {
        detection.class_id == self.config.target_class
            && detection.is_well_formed()
            && detection.confidence > self.config.confidence_threshold
            && self.matcher.accepts(detection)
    }

    /// Returns each accepted detection tagged with its identity, in input
    /// order. With an external-id matcher, a repeat of an id already held
    /// this frame is dropped.
    pub fn update(&mut self, detections: &[Detection], frame_index: usize) -> Vec<(Identity, Detection)> {
        let accepted: Vec<Detection> = detections
            .iter()
            .filter(|d| self.accepts(d))
            .copied()
            .collect();

        let assignments = {
            let active: Vec<&Track> = self.tracks.iter().collect();
            self.matcher.assign(&accepted, &active)
        };

        let mut track_matched = vec![false; self.tracks.len()];
        let mut identities: Vec<Option<Identity>> = vec![None; accepted.len()];
        for a in assignments {
            let valid = a.detection < accepted.len()
                && a.track < self.tracks.len()
                && identities[a.detection].is_none()
                && !track_matched[a.track];
            if !valid {
                log::warn!("Ignoring invalid track assignment {a:?}");
                continue;
            }
            let track = &mut self.tracks[a.track];
            track.observe(&accepted[a.detection], frame_index);
            track_matched[a.track] = true;
            identities[a.detection] = Some(track.identity);
        }

        for (track, matched) in self.tracks.iter_mut().zip(&track_matched) {
            if !matched {
                track.mark_missed();
            }
        }

        let keyed = self.matcher.keys_on_external_id();
        for (det, slot) in accepted.iter().zip(identities.iter_mut()) {
            if slot.is_none() {
                if keyed && self.holds_external_id(det.track_id) {
                    log::debug!(
                        "Frame {frame_index}: dropping duplicate detection for external id {:?}",
                        det.track_id
                    );
                    continue;
                }
                let identity = self.issue_identity();
                log::debug!("Frame {frame_index}: new track {identity}");
                self.tracks.push(Track::spawn(identity, det, frame_index));
                *slot = Some(identity);
            }
        }

        self.retire_lost(frame_index);

        identities
            .into_iter()
            .zip(accepted)
            .filter_map(|(id, det)| id.map(|id| (id, det)))
            .collect()
    }

    fn holds_external_id(&self, external_id: Option<u32>) -> bool {
        external_id.is_some() && self.tracks.iter().any(|t| t.external_id == external_id)
    }

    fn issue_identity(&mut self) -> Identity {
        let identity = Identity::new(self.next_id);
        self.next_id += 1;
        identity
    }

    fn retire_lost(&mut self, frame_index: usize) {
        let max_lost = self.config.max_lost;
        let before = self.tracks.len();
        self.tracks.retain(|t| {
            let keep = t.missed_updates <= max_lost;
            if !keep {
                log::debug!(
                    "Frame {frame_index}: retired track {} (crossed: {})",
                    t.identity,
                    t.crossed
                );
            }
            keep
        });
        self.retired_count += before - self.tracks.len();
    }

    pub fn active_tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn active_tracks_mut(&mut self) -> impl Iterator<Item = &mut Track> {
        self.tracks.iter_mut()
    }

    pub fn get(&self, identity: Identity) -> Option<&Track> {
        self.tracks.iter().find(|t| t.identity == identity)
    }

    pub fn is_active(&self, identity: Identity) -> bool {
        self.get(identity).is_some()
    }

    pub fn is_retired(&self, identity: Identity) -> bool {
        identity.value() >= 1 && identity.value() < self.next_id && !self.is_active(identity)
    }

    pub fn issued_count(&self) -> u64 {
        self.next_id - 1
    }

    pub fn retired_count(&self) -> usize {
        self.retired_count
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }
}
