use std::collections::BTreeSet;

use thiserror::Error;

use crate::counting::domain::count_result::{CountResult, FinishReason};
use crate::counting::domain::crossing_policy::CrossingPolicy;
use crate::counting::domain::frame_sampler::FrameSampler;
use crate::detection::domain::pedestrian_detector::PedestrianDetector;
use crate::shared::frame::Frame;
use crate::tracking::domain::identity_tracker::IdentityTracker;
use crate::tracking::domain::track::Identity;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    #[error("session is finalized ({0}); it cannot accept more frames")]
    InvalidState(FinishReason),
    #[error("detection failed on frame {frame}: {message}")]
    Detection { frame: usize, message: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Finalized(FinishReason),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedOutcome {
    /// Discarded by the sampler; the detector was not run.
    Skipped,
    Processed {
        accepted: usize,
        new_crossings: usize,
    },
}

/// Counting state for exactly one stream.
///
/// Owns the sampler, detector, tracker and crossing policy. Frames must be
/// fed strictly in stream order from a single caller. After
/// [`CountingSession::finalize`] every `feed` fails with
/// [`SessionError::InvalidState`]; the tallies stay readable.
pub struct CountingSession {
    sampler: FrameSampler,
    detector: Box<dyn PedestrianDetector>,
    tracker: IdentityTracker,
    policy: Box<dyn CrossingPolicy>,
    unique_crossed: BTreeSet<Identity>,
    total_detections: u64,
    frames_processed: usize,
    state: SessionState,
}

impl CountingSession {
    pub fn new(
        sampler: FrameSampler,
        detector: Box<dyn PedestrianDetector>,
        tracker: IdentityTracker,
        policy: Box<dyn CrossingPolicy>,
    ) -> Self {
        Self {
            sampler,
            detector,
            tracker,
            policy,
            unique_crossed: BTreeSet::new(),
            total_detections: 0,
            frames_processed: 0,
            state: SessionState::Active,
        }
    }

    pub fn feed(&mut self, frame: &Frame) -> Result<FeedOutcome, SessionError> {
        if let SessionState::Finalized(reason) = self.state {
            return Err(SessionError::InvalidState(reason));
        }
        if !self.sampler.admit() {
            return Ok(FeedOutcome::Skipped);
        }

        let detections = self
            .detector
            .detect(frame)
            .map_err(|e| SessionError::Detection {
                frame: frame.index(),
                message: e.to_string(),
            })?;

        let malformed = detections.iter().filter(|d| !d.is_well_formed()).count();
        if malformed > 0 {
            log::debug!("Frame {}: dropped {malformed} malformed detections", frame.index());
        }

        let tagged = self.tracker.update(&detections, frame.index());
        self.total_detections += tagged.len() as u64;
        self.frames_processed += 1;

        let mut new_crossings = 0;
        for track in self.tracker.active_tracks_mut() {
            if self.policy.evaluate(track) && self.unique_crossed.insert(track.identity) {
                new_crossings += 1;
                log::info!(
                    "Frame {}: track {} crossed the boundary ({} total)",
                    frame.index(),
                    track.identity,
                    self.unique_crossed.len()
                );
            }
        }

        Ok(FeedOutcome::Processed {
            accepted: tagged.len(),
            new_crossings,
        })
    }

    /// Snapshot of the tallies; partial while the session is active.
    pub fn result(&self) -> CountResult {
        CountResult {
            unique_count: self.unique_crossed.len(),
            total_detections: self.total_detections,
        }
    }

    /// Stops the session and returns the final tallies. Repeated calls
    /// return the same result and keep the first reason.
    pub fn finalize(&mut self, reason: FinishReason) -> CountResult {
        if self.state == SessionState::Active {
            self.state = SessionState::Finalized(reason);
            log::info!(
                "Session finalized ({reason}): {} frames seen, {} processed, {} tracks issued",
                self.sampler.frames_seen(),
                self.frames_processed,
                self.tracker.issued_count()
            );
        }
        self.result()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self.state, SessionState::Finalized(_))
    }

    pub fn unique_crossed(&self) -> &BTreeSet<Identity> {
        &self.unique_crossed
    }

    pub fn tracker(&self) -> &IdentityTracker {
        &self.tracker
    }

    pub fn frames_seen(&self) -> usize {
        self.sampler.frames_seen()
    }

    pub fn frames_processed(&self) -> usize {
        self.frames_processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::counting::domain::boundary::{Axis, Boundary, Direction};
    use crate::counting::domain::crossing_policy::DirectionalLinePolicy;
    use crate::detection::domain::detection::Detection;
    use crate::shared::geometry::BoundingBox;
    use crate::tracking::domain::identity_tracker::TrackerConfig;
    use crate::tracking::domain::track_matcher::TrackMatcher;
    use crate::tracking::infrastructure::centroid_matcher::NearestCentroidMatcher;
    use crate::tracking::infrastructure::external_id_matcher::ExternalIdMatcher;

    // --- Stubs ---

    struct StubDetector {
        results: HashMap<usize, Vec<Detection>>,
    }

    impl PedestrianDetector for StubDetector {
        fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
            Ok(self.results.get(&frame.index()).cloned().unwrap_or_default())
        }
    }

    struct FailingDetector;

    impl PedestrianDetector for FailingDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
            Err("model exploded".into())
        }
    }

    // --- Helpers ---

    fn person(cx: f64) -> Detection {
        Detection::new(0, 0.9, BoundingBox::new(cx - 20.0, 200.0, cx + 20.0, 300.0))
    }

    fn frame(index: usize) -> Frame {
        Frame::blank(2, 2, index)
    }

    fn script(frames: Vec<(usize, Vec<Detection>)>) -> Box<dyn PedestrianDetector> {
        Box::new(StubDetector {
            results: frames.into_iter().collect(),
        })
    }

    fn session_with(
        detector: Box<dyn PedestrianDetector>,
        matcher: Box<dyn TrackMatcher>,
        skip_interval: usize,
        max_lost: usize,
    ) -> CountingSession {
        CountingSession::new(
            FrameSampler::new(skip_interval).unwrap(),
            detector,
            IdentityTracker::new(
                matcher,
                TrackerConfig {
                    max_lost,
                    ..TrackerConfig::default()
                },
            ),
            Box::new(DirectionalLinePolicy::new(
                Boundary::new(Axis::Vertical, 320.0, Direction::Increasing),
                0.0,
            )),
        )
    }

    fn session(detector: Box<dyn PedestrianDetector>) -> CountingSession {
        session_with(detector, Box::new(NearestCentroidMatcher::new(80.0)), 1, 30)
    }

    fn run(session: &mut CountingSession, frames: usize) {
        run_from(session, 0, frames);
    }

    fn run_from(session: &mut CountingSession, start: usize, end: usize) {
        for i in start..end {
            session.feed(&frame(i)).unwrap();
        }
    }

    // --- Scenarios ---

    #[test]
    fn test_scenario_a_left_to_right_counted_once() {
        let path = [100.0, 160.0, 220.0, 280.0, 340.0, 360.0, 380.0];
        let mut s = session(script(
            path.iter().enumerate().map(|(i, &x)| (i, vec![person(x)])).collect(),
        ));

        run(&mut s, 4);
        assert_eq!(s.result().unique_count, 0);
        s.feed(&frame(4)).unwrap();
        assert_eq!(s.result().unique_count, 1);

        run_from(&mut s, 5, 7);
        assert_eq!(s.finalize(FinishReason::EndOfStream).unique_count, 1);
        assert_eq!(s.tracker().issued_count(), 1);
    }

    #[test]
    fn test_scenario_b_spawned_past_line_stationary_not_counted() {
        let mut s = session(script((0..10).map(|i| (i, vec![person(350.0)])).collect()));
        run(&mut s, 10);
        let result = s.finalize(FinishReason::EndOfStream);
        assert_eq!(result.unique_count, 0);
        assert_eq!(result.total_detections, 10);
    }

    #[test]
    fn test_scenario_c_same_centroid_different_subjects_counted_twice() {
        // Subject one walks the path, leaves and is retired; subject two
        // later walks through exactly the same centroids.
        let path = [100.0, 160.0, 220.0, 280.0, 340.0];
        let mut frames = Vec::new();
        for (i, &x) in path.iter().enumerate() {
            frames.push((i, vec![person(x)]));
            frames.push((20 + i, vec![person(x)]));
        }
        let mut s = session_with(
            script(frames),
            Box::new(NearestCentroidMatcher::new(80.0)),
            1,
            2,
        );
        run(&mut s, 25);

        assert_eq!(s.finalize(FinishReason::EndOfStream).unique_count, 2);
        assert_eq!(s.unique_crossed().len(), 2);
    }

    #[test]
    fn test_scenario_c_external_ids_distinguish_colliding_centroids() {
        let frames = vec![
            (0, vec![person(300.0).with_track_id(1)]),
            (1, vec![person(340.0).with_track_id(1)]),
            (2, vec![person(300.0).with_track_id(2)]),
            (3, vec![person(340.0).with_track_id(2)]),
        ];
        let mut s = session_with(script(frames), Box::new(ExternalIdMatcher), 1, 30);
        run(&mut s, 4);
        assert_eq!(s.result().unique_count, 2);
    }

    #[test]
    fn test_scenario_d_interval_longer_than_stream_yields_zero() {
        let mut s = session_with(
            script((0..5).map(|i| (i, vec![person(100.0 + 60.0 * i as f64)])).collect()),
            Box::new(NearestCentroidMatcher::new(80.0)),
            10,
            30,
        );
        for i in 0..5 {
            assert_eq!(s.feed(&frame(i)).unwrap(), FeedOutcome::Skipped);
        }
        let result = s.finalize(FinishReason::EndOfStream);
        assert_eq!(result, CountResult::default());
        assert_eq!(s.frames_processed(), 0);
    }

    #[test]
    fn test_scenario_e_interrupted_stream_keeps_committed_counts() {
        let path = [280.0, 340.0, 360.0, 380.0, 400.0, 420.0, 440.0, 460.0, 480.0, 500.0];
        let mut s = session(script(
            path.iter().enumerate().map(|(i, &x)| (i, vec![person(x)])).collect(),
        ));
        run(&mut s, 3);

        let result = s.finalize(FinishReason::Cancelled);
        assert_eq!(result.unique_count, 1);
        assert_eq!(result.total_detections, 3);
        assert_eq!(s.state(), SessionState::Finalized(FinishReason::Cancelled));
    }

    // --- Session lifecycle ---

    #[test]
    fn test_feed_after_finalize_is_invalid_state() {
        let mut s = session(script(vec![]));
        s.finalize(FinishReason::EndOfStream);
        assert_eq!(
            s.feed(&frame(0)),
            Err(SessionError::InvalidState(FinishReason::EndOfStream))
        );
    }

    #[test]
    fn test_finalize_is_idempotent_and_keeps_first_reason() {
        let mut s = session(script(vec![(0, vec![person(100.0)])]));
        run(&mut s, 1);
        let first = s.finalize(FinishReason::Cancelled);
        let second = s.finalize(FinishReason::EndOfStream);
        assert_eq!(first, second);
        assert_eq!(s.state(), SessionState::Finalized(FinishReason::Cancelled));
    }

    #[test]
    fn test_result_mid_stream_is_partial_snapshot() {
        let mut s = session(script(vec![(0, vec![person(100.0), person(500.0)])]));
        assert_eq!(s.result(), CountResult::default());
        run(&mut s, 1);
        assert_eq!(s.result().total_detections, 2);
        assert!(!s.is_finalized());
    }

    #[test]
    fn test_detector_error_leaves_session_active() {
        let mut s = session(Box::new(FailingDetector));
        let err = s.feed(&frame(7)).unwrap_err();
        assert!(matches!(err, SessionError::Detection { frame: 7, .. }));
        assert!(!s.is_finalized());
    }

    // --- Properties ---

    #[test]
    fn test_total_counts_only_accepted_detections() {
        let car = Detection { class_id: 2, ..person(100.0) };
        let faint = Detection { confidence: 0.2, ..person(200.0) };
        let broken = Detection::new(0, f64::NAN, BoundingBox::new(0.0, 0.0, 1.0, 1.0));
        let mut s = session(script(vec![(0, vec![car, faint, broken, person(400.0)])]));
        run(&mut s, 1);
        assert_eq!(s.result().total_detections, 1);
        assert_eq!(s.tracker().issued_count(), 1);
    }

    #[test]
    fn test_counters_are_monotonic() {
        let frames: Vec<(usize, Vec<Detection>)> = (0..12)
            .map(|i| {
                let walker = person(100.0 + 40.0 * i as f64);
                let loiterer = person(600.0);
                let dets = if i % 3 == 0 { vec![walker] } else { vec![walker, loiterer] };
                (i, dets)
            })
            .collect();
        let mut s = session(script(frames));

        let mut prev = s.result();
        for i in 0..12 {
            s.feed(&frame(i)).unwrap();
            let now = s.result();
            assert!(now.unique_count >= prev.unique_count);
            assert!(now.total_detections >= prev.total_detections);
            prev = now;
        }
    }

    #[test]
    fn test_retired_track_never_double_counted() {
        // Crosses, disappears long enough to retire, then a detection shows
        // up far past the line: a fresh identity that has not moved.
        let mut frames = vec![(0, vec![person(300.0)]), (1, vec![person(340.0)])];
        frames.push((6, vec![person(360.0)]));
        frames.push((7, vec![person(360.0)]));
        let mut s = session_with(
            script(frames),
            Box::new(NearestCentroidMatcher::new(80.0)),
            1,
            1,
        );
        run(&mut s, 8);

        let first = *s.unique_crossed().iter().next().unwrap();
        assert!(s.tracker().is_retired(first));
        assert_eq!(s.result().unique_count, 1);
        assert_eq!(s.tracker().issued_count(), 2);
    }

    #[test]
    fn test_crossed_identities_are_active_or_retired() {
        let frames = (0..6).map(|i| (i, vec![person(250.0 + 30.0 * i as f64)])).collect();
        let mut s = session_with(script(frames), Box::new(NearestCentroidMatcher::new(80.0)), 1, 0);
        run(&mut s, 10);
        for id in s.unique_crossed() {
            assert!(s.tracker().is_active(*id) || s.tracker().is_retired(*id));
        }
    }

    #[test]
    fn test_skipped_frames_do_not_reach_detector() {
        let frames = (0..6).map(|i| (i, vec![person(100.0)])).collect();
        let mut s = session_with(script(frames), Box::new(NearestCentroidMatcher::new(80.0)), 2, 30);
        run(&mut s, 6);
        assert_eq!(s.frames_seen(), 6);
        assert_eq!(s.frames_processed(), 3);
        assert_eq!(s.result().total_detections, 3);
    }
}
