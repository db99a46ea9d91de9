use std::fmt;

use serde::Serialize;

/// Tallies of one session.
///
/// `unique_count` is the number of distinct identities that crossed the
/// boundary; `total_detections` is raw accepted-detection volume over all
/// processed frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CountResult {
    pub unique_count: usize,
    pub total_detections: u64,
}

/// Why a session stopped accepting frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    EndOfStream,
    Cancelled,
    /// The source failed mid-stream; counts up to the failure stand.
    SourceFailed,
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinishReason::EndOfStream => write!(f, "end of stream"),
            FinishReason::Cancelled => write!(f, "cancelled"),
            FinishReason::SourceFailed => write!(f, "source failed"),
        }
    }
}
