use crate::detection::domain::detection::Detection;
use crate::shared::frame::Frame;

/// Domain interface for per-frame object localization.
///
/// Implementations may be stateful (replay cursors, model sessions), hence
/// `&mut self`. They return every detection they produce; class and
/// confidence filtering is the tracker's job.
pub trait PedestrianDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>>;
}
