use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::counting::domain::boundary::{Axis, Boundary, BoundaryPosition, Direction};
use crate::counting::domain::counting_session::CountingSession;
use crate::counting::domain::crossing_policy::DirectionalLinePolicy;
use crate::counting::domain::frame_sampler::FrameSampler;
use crate::detection::domain::pedestrian_detector::PedestrianDetector;
use crate::detection::infrastructure::onnx_yolo_detector::DEFAULT_SCORE_FLOOR;
use crate::shared::constants::{
    DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_MAX_MATCH_DISTANCE, DEFAULT_MIN_IOU,
    DEFAULT_SKIP_INTERVAL, PERSON_CLASS_ID, TRACKER_MAX_LOST,
};
use crate::shared::stream_metadata::StreamMetadata;
use crate::tracking::domain::identity_tracker::{IdentityTracker, TrackerConfig};
use crate::tracking::domain::track_matcher::TrackMatcher;
use crate::tracking::infrastructure::centroid_matcher::NearestCentroidMatcher;
use crate::tracking::infrastructure::external_id_matcher::ExternalIdMatcher;
use crate::tracking::infrastructure::iou_matcher::IouMatcher;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("skip_interval must be >= 1")]
    ZeroInterval,
    #[error("confidence_threshold must be within [0, 1], got {0}")]
    ConfidenceOutOfRange(f64),
    #[error("boundary fraction must be within [0, 1], got {0}")]
    FractionOutOfRange(f64),
    #[error("boundary position must be a finite, non-negative pixel value, got {0}")]
    InvalidPosition(f64),
    #[error("{name} must be finite and non-negative, got {value}")]
    InvalidDistance { name: &'static str, value: f64 },
    #[error("min_iou must be within (0, 1], got {0}")]
    IouOutOfRange(f64),
}

/// How detections are paired with active tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatcherKind {
    Centroid,
    Iou,
    External,
}

impl std::fmt::Display for MatcherKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatcherKind::Centroid => write!(f, "centroid"),
            MatcherKind::Iou => write!(f, "iou"),
            MatcherKind::External => write!(f, "external"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
    pub target_class: u32,
    pub confidence_threshold: f64,
    pub max_lost: usize,
    pub matcher: MatcherKind,
    /// Centroid gate in pixels, used by [`MatcherKind::Centroid`].
    pub max_match_distance: f64,
    /// Overlap gate, used by [`MatcherKind::Iou`].
    pub min_iou: f64,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            target_class: PERSON_CLASS_ID,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            max_lost: TRACKER_MAX_LOST,
            matcher: MatcherKind::Centroid,
            max_match_distance: DEFAULT_MAX_MATCH_DISTANCE,
            min_iou: DEFAULT_MIN_IOU,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundarySettings {
    pub axis: Axis,
    pub position: BoundaryPosition,
    pub direction: Direction,
    pub min_displacement: f64,
}

impl Default for BoundarySettings {
    fn default() -> Self {
        Self {
            axis: Axis::Vertical,
            position: BoundaryPosition::Fraction(0.5),
            direction: Direction::Increasing,
            min_displacement: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    /// Explicit model file; skips cache lookup and download.
    pub model: Option<PathBuf>,
    /// Where to fetch the model when it is not cached.
    pub model_url: Option<String>,
    /// Candidates below this score are discarded inside the detector.
    pub score_floor: f64,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            model: None,
            model_url: None,
            score_floor: DEFAULT_SCORE_FLOOR,
        }
    }
}

/// Everything needed to build a counting session, loadable from JSON.
///
/// Missing fields fall back to defaults, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    /// Run the detector on every Nth frame.
    pub skip_interval: usize,
    pub tracker: TrackerSettings,
    pub boundary: BoundarySettings,
    pub detector: DetectorSettings,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            skip_interval: DEFAULT_SKIP_INTERVAL,
            tracker: TrackerSettings::default(),
            boundary: BoundarySettings::default(),
            detector: DetectorSettings::default(),
        }
    }
}

impl CounterConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.skip_interval == 0 {
            return Err(ConfigError::ZeroInterval);
        }

        let t = &self.tracker;
        if !(0.0..=1.0).contains(&t.confidence_threshold) {
            return Err(ConfigError::ConfidenceOutOfRange(t.confidence_threshold));
        }
        if !t.max_match_distance.is_finite() || t.max_match_distance < 0.0 {
            return Err(ConfigError::InvalidDistance {
                name: "max_match_distance",
                value: t.max_match_distance,
            });
        }
        if !(t.min_iou > 0.0 && t.min_iou <= 1.0) {
            return Err(ConfigError::IouOutOfRange(t.min_iou));
        }

        let b = &self.boundary;
        match b.position {
            BoundaryPosition::Fraction(f) if !(0.0..=1.0).contains(&f) => {
                return Err(ConfigError::FractionOutOfRange(f));
            }
            BoundaryPosition::Absolute(px) if !px.is_finite() || px < 0.0 => {
                return Err(ConfigError::InvalidPosition(px));
            }
            _ => {}
        }
        if !b.min_displacement.is_finite() || b.min_displacement < 0.0 {
            return Err(ConfigError::InvalidDistance {
                name: "min_displacement",
                value: b.min_displacement,
            });
        }

        Ok(())
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            target_class: self.tracker.target_class,
            confidence_threshold: self.tracker.confidence_threshold,
            max_lost: self.tracker.max_lost,
        }
    }

    pub fn build_matcher(&self) -> Box<dyn TrackMatcher> {
        match self.tracker.matcher {
            MatcherKind::Centroid => {
                Box::new(NearestCentroidMatcher::new(self.tracker.max_match_distance))
            }
            MatcherKind::Iou => Box::new(IouMatcher::new(self.tracker.min_iou)),
            MatcherKind::External => Box::new(ExternalIdMatcher),
        }
    }

    /// Resolves the configured line against the stream's frame size.
    pub fn boundary_for(&self, metadata: &StreamMetadata) -> Boundary {
        let b = &self.boundary;
        Boundary::new(
            b.axis,
            b.position.resolve(b.axis, metadata.width, metadata.height),
            b.direction,
        )
    }

    /// Validates the config and assembles a fresh session for one stream.
    pub fn build_session(
        &self,
        detector: Box<dyn PedestrianDetector>,
        metadata: &StreamMetadata,
    ) -> Result<CountingSession, ConfigError> {
        self.validate()?;
        let sampler =
            FrameSampler::new(self.skip_interval).map_err(|_| ConfigError::ZeroInterval)?;
        let tracker = IdentityTracker::new(self.build_matcher(), self.tracker_config());
        let policy = DirectionalLinePolicy::new(
            self.boundary_for(metadata),
            self.boundary.min_displacement,
        );
        Ok(CountingSession::new(sampler, detector, tracker, Box::new(policy)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;
    use std::io::Write;

    fn metadata(width: u32, height: u32) -> StreamMetadata {
        StreamMetadata {
            width,
            height,
            fps: 25.0,
            total_frames: 0,
            codec: "h264".to_string(),
            source: "test".to_string(),
        }
    }

    #[test]
    fn test_defaults_match_constants() {
        let config = CounterConfig::default();
        assert_eq!(config.skip_interval, DEFAULT_SKIP_INTERVAL);
        assert_eq!(config.tracker.target_class, PERSON_CLASS_ID);
        assert_eq!(config.tracker.matcher, MatcherKind::Centroid);
        assert_eq!(config.boundary.position, BoundaryPosition::Fraction(0.5));
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config: CounterConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, CounterConfig::default());
    }

    #[test]
    fn test_partial_json_overrides_nested_fields() {
        let json = r#"{
            "skip_interval": 5,
            "tracker": { "matcher": "iou", "max_lost": 10 },
            "boundary": { "axis": "horizontal", "position": { "absolute": 240.0 }, "direction": "decreasing" }
        }"#;
        let config: CounterConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.skip_interval, 5);
        assert_eq!(config.tracker.matcher, MatcherKind::Iou);
        assert_eq!(config.tracker.max_lost, 10);
        assert_relative_eq!(config.tracker.confidence_threshold, DEFAULT_CONFIDENCE_THRESHOLD);
        assert_eq!(config.boundary.axis, Axis::Horizontal);
        assert_eq!(config.boundary.position, BoundaryPosition::Absolute(240.0));
        assert_eq!(config.boundary.direction, Direction::Decreasing);
    }

    #[test]
    fn test_from_file_reads_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"skip_interval": 3}}"#).unwrap();

        let config = CounterConfig::from_file(file.path()).unwrap();
        assert_eq!(config.skip_interval, 3);
    }

    #[test]
    fn test_from_file_missing_is_read_error() {
        let err = CounterConfig::from_file(Path::new("/nonexistent/pedcount.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_from_file_malformed_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        let err = CounterConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    fn valid() -> CounterConfig {
        CounterConfig::default()
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = CounterConfig {
            skip_interval: 0,
            ..valid()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroInterval)));
    }

    #[rstest]
    #[case(-0.1)]
    #[case(1.5)]
    #[case(f64::NAN)]
    fn test_confidence_out_of_range_rejected(#[case] threshold: f64) {
        let mut config = valid();
        config.tracker.confidence_threshold = threshold;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ConfidenceOutOfRange(_))
        ));
    }

    #[rstest]
    #[case(BoundaryPosition::Fraction(1.2), true)]
    #[case(BoundaryPosition::Fraction(-0.5), true)]
    #[case(BoundaryPosition::Fraction(0.25), false)]
    #[case(BoundaryPosition::Absolute(-3.0), true)]
    #[case(BoundaryPosition::Absolute(f64::INFINITY), true)]
    #[case(BoundaryPosition::Absolute(320.0), false)]
    fn test_boundary_position_validation(
        #[case] position: BoundaryPosition,
        #[case] rejected: bool,
    ) {
        let mut config = valid();
        config.boundary.position = position;
        assert_eq!(config.validate().is_err(), rejected);
    }

    #[test]
    fn test_negative_min_displacement_rejected() {
        let mut config = valid();
        config.boundary.min_displacement = -1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDistance {
                name: "min_displacement",
                ..
            })
        ));
    }

    #[test]
    fn test_zero_min_iou_rejected() {
        let mut config = valid();
        config.tracker.min_iou = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::IouOutOfRange(_))));
    }

    #[rstest]
    #[case(Axis::Vertical, 0.5, 320.0)]
    #[case(Axis::Vertical, 0.25, 160.0)]
    #[case(Axis::Horizontal, 0.5, 240.0)]
    fn test_fraction_resolved_against_frame(
        #[case] axis: Axis,
        #[case] fraction: f64,
        #[case] expected: f64,
    ) {
        let mut config = valid();
        config.boundary.axis = axis;
        config.boundary.position = BoundaryPosition::Fraction(fraction);

        let boundary = config.boundary_for(&metadata(640, 480));
        assert_relative_eq!(boundary.position, expected);
        assert_eq!(boundary.axis, axis);
    }

    #[test]
    fn test_external_matcher_rejects_untracked_detections() {
        use crate::detection::domain::detection::Detection;
        use crate::shared::geometry::BoundingBox;

        let mut config = valid();
        config.tracker.matcher = MatcherKind::External;
        let matcher = config.build_matcher();

        let det = Detection::new(0, 0.9, BoundingBox::new(0.0, 0.0, 10.0, 10.0));
        assert!(!matcher.accepts(&det));
        assert!(matcher.accepts(&det.with_track_id(3)));
    }

    #[test]
    fn test_build_session_rejects_invalid_config() {
        struct NoDetections;
        impl PedestrianDetector for NoDetections {
            fn detect(
                &mut self,
                _frame: &crate::shared::frame::Frame,
            ) -> Result<Vec<crate::detection::domain::detection::Detection>, Box<dyn std::error::Error>>
            {
                Ok(Vec::new())
            }
        }

        let invalid = CounterConfig {
            skip_interval: 0,
            ..valid()
        };
        assert!(invalid
            .build_session(Box::new(NoDetections), &metadata(640, 480))
            .is_err());

        let session = valid()
            .build_session(Box::new(NoDetections), &metadata(640, 480))
            .unwrap();
        assert!(!session.is_finalized());
    }
}
