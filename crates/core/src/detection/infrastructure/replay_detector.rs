use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::detection::domain::detection::{Detection, RawDetection};
use crate::detection::domain::pedestrian_detector::PedestrianDetector;
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("failed to read detections file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct FrameRecord {
    frame: usize,
    #[serde(default)]
    detections: Vec<serde_json::Value>,
}

/// Replays precomputed detections by frame index.
///
/// Input is JSON Lines, one record per frame:
/// `{"frame": 12, "detections": [{"class_id": 0, "confidence": 0.8,
/// "bbox": [x1, y1, x2, y2], "track_id": 4}]}`. This is how an external
/// multi-object tracker feeds persistent ids into the counter. Malformed or
/// wrong-typed detections inside a record are dropped; frames with no record
/// yield nothing.
pub struct ReplayDetector {
    frames: HashMap<usize, Vec<Detection>>,
}

impl ReplayDetector {
    pub fn new(frames: HashMap<usize, Vec<Detection>>) -> Self {
        Self { frames }
    }

    pub fn from_file(path: &Path) -> Result<Self, ReplayError> {
        Self::from_json_lines(&fs::read_to_string(path)?)
    }

    pub fn from_json_lines(text: &str) -> Result<Self, ReplayError> {
        let mut frames: HashMap<usize, Vec<Detection>> = HashMap::new();
        let mut dropped = 0usize;

        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let record: FrameRecord =
                serde_json::from_str(line).map_err(|source| ReplayError::Parse {
                    line: i + 1,
                    source,
                })?;
            let total = record.detections.len();
            let valid: Vec<Detection> = record
                .detections
                .into_iter()
                .filter_map(RawDetection::parse_value)
                .collect();
            dropped += total - valid.len();
            frames.entry(record.frame).or_default().extend(valid);
        }

        if dropped > 0 {
            log::debug!("Dropped {dropped} malformed detections from replay input");
        }
        Ok(Self::new(frames))
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

impl PedestrianDetector for ReplayDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        Ok(self.frames.get(&frame.index()).cloned().unwrap_or_default())
    }
}
