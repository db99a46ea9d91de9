use std::collections::BTreeMap;
use std::time::Instant;

/// Cross-cutting logger for counting-run events.
///
/// Keeps the use case free of output concerns: the CLI logs progress and a
/// timing summary, tests discard everything.
pub trait PipelineLogger: Send {
    /// Frame-level progress. `total` is 0 for live streams.
    fn progress(&mut self, current: usize, total: usize);

    /// How long a named stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Point-in-time metric, e.g. active track count.
    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// End-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards all events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Running aggregate of one timing stage or metric. Constant size, so a
/// live stream can run for days.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RunningStat {
    pub count: u64,
    pub sum: f64,
    pub max: f64,
}

impl RunningStat {
    fn record(&mut self, value: f64) {
        if self.count == 0 || value > self.max {
            self.max = value;
        }
        self.count += 1;
        self.sum += value;
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Percentage of `wall_s` seconds spent in a stage totalling `sum_ms`.
fn wall_time_share(sum_ms: f64, wall_s: f64) -> f64 {
    if wall_s > 0.0 {
        sum_ms / 1000.0 / wall_s * 100.0
    } else {
        0.0
    }
}

/// Logs throttled progress through the `log` crate and aggregates stage
/// timings and metrics for an end-of-run summary.
pub struct StdoutPipelineLogger {
    every_frames: usize,
    stages: BTreeMap<String, RunningStat>,
    metrics: BTreeMap<String, RunningStat>,
    started: Instant,
    frames_seen: usize,
    last_message: Option<String>,
}

impl StdoutPipelineLogger {
    /// Logs progress once every `every_frames` frames.
    pub fn new(every_frames: usize) -> Self {
        Self {
            every_frames: every_frames.max(1),
            stages: BTreeMap::new(),
            metrics: BTreeMap::new(),
            started: Instant::now(),
            frames_seen: 0,
            last_message: None,
        }
    }

    pub fn stage(&self, name: &str) -> Option<&RunningStat> {
        self.stages.get(name)
    }

    pub fn metric_stat(&self, name: &str) -> Option<&RunningStat> {
        self.metrics.get(name)
    }

    pub fn last_message(&self) -> Option<&str> {
        self.last_message.as_deref()
    }

    /// Returns the summary text, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.stages.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let wall_s = self.started.elapsed().as_secs_f64();
        let mut out = format!(
            "Counting summary: {} frames in {wall_s:.1}s",
            self.frames_seen
        );
        if self.frames_seen > 0 && wall_s > 0.0 {
            out.push_str(&format!(" ({:.1} fps)", self.frames_seen as f64 / wall_s));
        }

        for (name, stat) in &self.stages {
            let share = wall_time_share(stat.sum, wall_s);
            out.push_str(&format!(
                "\n  {name:<8} mean {:>6.1}ms  max {:>6.1}ms  {share:>5.1}% of wall time",
                stat.mean(),
                stat.max
            ));
        }
        for (name, stat) in &self.metrics {
            out.push_str(&format!(
                "\n  {name} mean {:.1}, peak {:.0}",
                stat.mean(),
                stat.max
            ));
        }
        Some(out)
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(100)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.frames_seen = current;
        let at_end = total > 0 && current == total;
        if current % self.every_frames != 0 && !at_end {
            return;
        }
        match total {
            0 => log::info!("Frame {current} (live)"),
            _ => log::info!(
                "Frame {current}/{total} ({:.1}%)",
                current as f64 * 100.0 / total as f64
            ),
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.stages
            .entry(stage.to_string())
            .or_default()
            .record(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().record(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
        self.last_message = Some(message.to_string());
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("{text}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_null_logger_accepts_everything() {
        let mut logger = NullPipelineLogger;
        logger.progress(1, 10);
        logger.timing("detect", 5.0);
        logger.metric("active_tracks", 3.0);
        logger.info("hello");
        logger.summary();
    }

    #[test]
    fn test_running_stat_tracks_mean_and_max() {
        let mut stat = RunningStat::default();
        assert_relative_eq!(stat.mean(), 0.0);
        for v in [4.0, 10.0, 1.0] {
            stat.record(v);
        }
        assert_eq!(stat.count, 3);
        assert_relative_eq!(stat.mean(), 5.0);
        assert_relative_eq!(stat.max, 10.0);
    }

    #[test]
    fn test_running_stat_max_of_negative_values() {
        let mut stat = RunningStat::default();
        stat.record(-3.0);
        stat.record(-7.0);
        assert_relative_eq!(stat.max, -3.0);
    }

    #[test]
    fn test_timings_aggregate_per_stage() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.timing("count", 20.0);
        logger.timing("count", 30.0);
        logger.timing("read", 5.0);

        assert_relative_eq!(logger.stage("count").unwrap().mean(), 25.0);
        assert_eq!(logger.stage("read").unwrap().count, 1);
        assert!(logger.stage("detect").is_none());
    }

    #[test]
    fn test_summary_lists_stages_and_metrics() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.progress(100, 0);
        logger.timing("count", 10.0);
        logger.metric("active_tracks", 3.0);
        logger.metric("active_tracks", 5.0);

        let summary = logger.summary_string().unwrap();
        assert!(summary.starts_with("Counting summary: 100 frames"));
        assert!(summary.contains("count"));
        assert!(summary.contains("active_tracks mean 4.0, peak 5"));
        assert_relative_eq!(logger.metric_stat("active_tracks").unwrap().max, 5.0);
    }

    #[test]
    fn test_wall_time_share_is_percent_of_elapsed() {
        assert_relative_eq!(wall_time_share(500.0, 2.0), 25.0);
        assert_relative_eq!(wall_time_share(2000.0, 2.0), 100.0);
        assert_relative_eq!(wall_time_share(100.0, 0.0), 0.0);
    }

    #[test]
    fn test_empty_summary_returns_none() {
        assert!(StdoutPipelineLogger::default().summary_string().is_none());
    }

    #[test]
    fn test_progress_counts_live_frames() {
        let mut logger = StdoutPipelineLogger::new(10);
        for i in 1..=25 {
            logger.progress(i, 0);
        }
        assert_eq!(logger.frames_seen, 25);
    }

    #[test]
    fn test_info_keeps_last_message() {
        let mut logger = StdoutPipelineLogger::new(1);
        logger.info("opened stream");
        logger.info("counting");
        assert_eq!(logger.last_message(), Some("counting"));
    }
}
