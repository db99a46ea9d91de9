use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;

use crate::counting::domain::count_result::{CountResult, FinishReason};
use crate::counting::domain::counting_session::{FeedOutcome, SessionError};
use crate::detection::domain::pedestrian_detector::PedestrianDetector;
use crate::video::domain::video_reader::VideoReader;

use super::counter_config::{ConfigError, CounterConfig};
use super::pipeline_logger::PipelineLogger;

#[derive(Error, Debug)]
pub enum CountError {
    #[error("cannot open source {input}: {reason}")]
    SourceUnavailable { input: String, reason: String },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("counting run already executed")]
    AlreadyExecuted,
}

/// Final state of one counting run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CountOutcome {
    pub source: String,
    #[serde(flatten)]
    pub result: CountResult,
    pub reason: FinishReason,
    pub frames_seen: usize,
    pub frames_processed: usize,
}

/// Counts pedestrians crossing the configured line in one stream.
///
/// Single-use: `execute` consumes the detector, so a second call fails with
/// [`CountError::AlreadyExecuted`]. Cancellation is checked before every
/// frame through the shared flag and the progress callback; either one
/// finalizes the session with the crossings committed so far.
pub struct CountPedestriansUseCase {
    reader: Box<dyn VideoReader>,
    detector: Option<Box<dyn PedestrianDetector>>,
    config: CounterConfig,
    logger: Box<dyn PipelineLogger>,
    on_progress: Option<Box<dyn Fn(usize, usize) -> bool + Send>>,
    cancelled: Arc<AtomicBool>,
}

impl CountPedestriansUseCase {
    pub fn new(
        reader: Box<dyn VideoReader>,
        detector: Box<dyn PedestrianDetector>,
        config: CounterConfig,
        logger: Box<dyn PipelineLogger>,
        on_progress: Option<Box<dyn Fn(usize, usize) -> bool + Send>>,
        cancelled: Option<Arc<AtomicBool>>,
    ) -> Self {
        Self {
            reader,
            detector: Some(detector),
            config,
            logger,
            on_progress,
            cancelled: cancelled.unwrap_or_else(|| Arc::new(AtomicBool::new(false))),
        }
    }

    pub fn execute(&mut self, source: &str) -> Result<CountOutcome, CountError> {
        self.config.validate()?;
        let detector = self.detector.take().ok_or(CountError::AlreadyExecuted)?;

        let metadata = self
            .reader
            .open(source)
            .map_err(|e| CountError::SourceUnavailable {
                input: source.to_string(),
                reason: e.to_string(),
            })?;

        let mut session = match self.config.build_session(detector, &metadata) {
            Ok(session) => session,
            Err(e) => {
                self.reader.close();
                return Err(e.into());
            }
        };
        self.logger.info(&format!(
            "Counting {source} with {} matching, every {} frame(s)",
            self.config.tracker.matcher, self.config.skip_interval
        ));

        let total = metadata.total_frames;
        let mut reason = FinishReason::EndOfStream;
        let mut frames = self.reader.frames();
        let mut seen = 0;

        loop {
            if self.cancelled.load(Ordering::Relaxed) {
                reason = FinishReason::Cancelled;
                break;
            }

            let t0 = Instant::now();
            let Some(item) = frames.next() else {
                break;
            };
            self.logger
                .timing("read", t0.elapsed().as_secs_f64() * 1000.0);

            let frame = match item {
                Ok(frame) => frame,
                Err(e) => {
                    log::warn!("Reading {source} failed after {seen} frames: {e}");
                    reason = FinishReason::SourceFailed;
                    break;
                }
            };
            seen += 1;

            let t0 = Instant::now();
            match session.feed(&frame) {
                Ok(FeedOutcome::Processed { new_crossings, .. }) => {
                    self.logger
                        .timing("count", t0.elapsed().as_secs_f64() * 1000.0);
                    self.logger.metric(
                        "active_tracks",
                        session.tracker().active_tracks().len() as f64,
                    );
                    if new_crossings > 0 {
                        log::debug!("Frame {}: {new_crossings} new crossing(s)", frame.index());
                    }
                }
                Ok(FeedOutcome::Skipped) => {}
                Err(SessionError::Detection { frame, message }) => {
                    log::warn!("Detector failed on frame {frame}: {message}");
                    reason = FinishReason::SourceFailed;
                    break;
                }
                Err(SessionError::InvalidState(r)) => {
                    reason = r;
                    break;
                }
            }

            self.logger.progress(seen, total);
            if let Some(ref cb) = self.on_progress {
                if !cb(seen, total) {
                    reason = FinishReason::Cancelled;
                    break;
                }
            }
        }
        drop(frames);

        let result = session.finalize(reason);
        self.reader.close();
        self.logger.summary();

        Ok(CountOutcome {
            source: source.to_string(),
            result,
            reason,
            frames_seen: session.frames_seen(),
            frames_processed: session.frames_processed(),
        })
    }
}
