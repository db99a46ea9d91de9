use crate::shared::frame::Frame;
use crate::shared::stream_metadata::StreamMetadata;

/// Reads frames from a recorded file or a live stream.
///
/// Implementations handle container, codec and transport details; the
/// counting pipeline only sees [`Frame`] and [`StreamMetadata`].
pub trait VideoReader: Send {
    /// Opens a local path or a stream URL and returns its metadata.
    fn open(&mut self, source: &str) -> Result<StreamMetadata, Box<dyn std::error::Error>>;

    /// Returns an iterator over frames in decode order. An `Err` item means
    /// the source failed mid-stream; callers stop reading after it.
    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_>;

    /// Releases any resources held by the reader.
    fn close(&mut self);
}
