use serde::Serialize;

use crate::counting::domain::count_result::{CountResult, FinishReason};

/// Summary of one finished counting run, ready for delivery.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Report {
    pub unique_count: usize,
    pub total_count: u64,
    pub source_label: Option<String>,
    pub reason: FinishReason,
}

impl Report {
    pub fn new(result: &CountResult, reason: FinishReason, source_label: Option<String>) -> Self {
        Self {
            unique_count: result.unique_count,
            total_count: result.total_detections,
            source_label,
            reason,
        }
    }

    /// Plain-text body for chat-style channels.
    pub fn message(&self) -> String {
        let headline = match self.reason {
            FinishReason::EndOfStream => "Counting finished.".to_string(),
            other => format!("Counting stopped early ({other})."),
        };
        let mut lines = vec![headline];
        if let Some(label) = &self.source_label {
            lines.push(format!("Source: {label}"));
        }
        lines.push(format!(
            "Unique pedestrians: {}, total pedestrian detections: {}",
            self.unique_count, self.total_count
        ));
        lines.join("\n")
    }
}
