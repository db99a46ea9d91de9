/// Properties of an opened video stream.
///
/// `total_frames` is 0 for live sources whose length is unknown.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: usize,
    pub codec: String,
    pub source: String,
}

impl StreamMetadata {
    pub fn is_live(&self) -> bool {
        self.total_frames == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(total_frames: usize) -> StreamMetadata {
        StreamMetadata {
            width: 640,
            height: 480,
            fps: 25.0,
            total_frames,
            codec: "h264".to_string(),
            source: "rtsp://camera.local/stream".to_string(),
        }
    }

    #[test]
    fn test_unknown_length_is_live() {
        assert!(metadata(0).is_live());
    }

    #[test]
    fn test_known_length_is_not_live() {
        assert!(!metadata(250).is_live());
    }
}
