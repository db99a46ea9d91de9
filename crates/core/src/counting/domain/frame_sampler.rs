use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SamplerError {
    #[error("skip_interval must be >= 1")]
    ZeroInterval,
}

/// Fixed-interval gate in front of the detector.
///
/// Admits every Nth frame counting from 1 (frames N, 2N, ...), so a stream
/// shorter than N admits nothing. Raising N divides detector cost by N but
/// lets subjects move N times further between sampled frames: fast walkers
/// can break centroid or IoU matching, or pass the line unseen.
#[derive(Clone, Debug)]
pub struct FrameSampler {
    skip_interval: usize,
    seen: usize,
}

impl FrameSampler {
    pub fn new(skip_interval: usize) -> Result<Self, SamplerError> {
        if skip_interval < 1 {
            return Err(SamplerError::ZeroInterval);
        }
        Ok(Self {
            skip_interval,
            seen: 0,
        })
    }

    /// Registers one incoming frame and returns whether it is processed.
    pub fn admit(&mut self) -> bool {
        self.seen += 1;
        self.seen % self.skip_interval == 0
    }

    pub fn skip_interval(&self) -> usize {
        self.skip_interval
    }

    pub fn frames_seen(&self) -> usize {
        self.seen
    }
}
