use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Parser, ValueEnum};

use pedcount_core::counting::domain::boundary::{Axis, BoundaryPosition, Direction};
use pedcount_core::detection::domain::pedestrian_detector::PedestrianDetector;
use pedcount_core::detection::infrastructure::onnx_yolo_detector::OnnxYoloDetector;
use pedcount_core::detection::infrastructure::replay_detector::ReplayDetector;
use pedcount_core::pipeline::count_pedestrians_use_case::{CountOutcome, CountPedestriansUseCase};
use pedcount_core::pipeline::counter_config::{CounterConfig, MatcherKind};
use pedcount_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use pedcount_core::report::domain::report::Report;
use pedcount_core::report::domain::report_sink::ReportSink;
use pedcount_core::report::infrastructure::log_report_sink::LogReportSink;
use pedcount_core::report::infrastructure::report_dispatcher::ReportDispatcher;
use pedcount_core::report::infrastructure::telegram_report_sink::TelegramReportSink;
use pedcount_core::shared::constants::YOLO_MODEL_NAME;
use pedcount_core::shared::model_resolver;
use pedcount_core::video::infrastructure::ffmpeg_reader::FfmpegReader;

#[derive(Clone, Copy, ValueEnum)]
enum AxisArg {
    /// Line x = position, crossed by horizontal motion.
    Vertical,
    /// Line y = position, crossed by vertical motion.
    Horizontal,
}

#[derive(Clone, Copy, ValueEnum)]
enum DirectionArg {
    /// Left to right, or top to bottom.
    Increasing,
    /// Right to left, or bottom to top.
    Decreasing,
}

#[derive(Clone, Copy, ValueEnum)]
enum MatcherArg {
    Centroid,
    Iou,
    External,
}

/// Counts pedestrians crossing a line in a video file or live stream.
#[derive(Parser)]
#[command(name = "pedcount", version)]
struct Cli {
    /// Video file path or stream URL (rtsp://, http://, ...).
    source: String,

    /// JSON config file; flags below override its fields.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Minimum person confidence, exclusive (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// Run detection every Nth frame. Higher is faster but fast walkers
    /// may be lost between sampled frames.
    #[arg(long)]
    skip_frames: Option<usize>,

    #[arg(long, value_enum)]
    axis: Option<AxisArg>,

    /// Line position in pixels.
    #[arg(long, conflicts_with = "fraction")]
    position: Option<f64>,

    /// Line position as a fraction of the frame width (vertical) or height
    /// (horizontal).
    #[arg(long)]
    fraction: Option<f64>,

    /// Counted direction of motion.
    #[arg(long, value_enum)]
    direction: Option<DirectionArg>,

    /// How detections are linked across frames.
    #[arg(long, value_enum)]
    matcher: Option<MatcherArg>,

    /// Processed frames a subject may go undetected before its identity is
    /// retired.
    #[arg(long)]
    max_lost: Option<usize>,

    /// Centroid matching gate in pixels.
    #[arg(long)]
    max_match_distance: Option<f64>,

    /// ONNX detection model (YOLOv8, COCO classes).
    #[arg(long)]
    model: Option<PathBuf>,

    /// Download URL used when the model is not cached.
    #[arg(long)]
    model_url: Option<String>,

    /// Replay precomputed detections (JSON Lines) instead of running the
    /// model.
    #[arg(long)]
    detections: Option<PathBuf>,

    /// Name of the source shown in reports.
    #[arg(long)]
    label: Option<String>,

    #[arg(long, env = "BOT_TOKEN", hide_env_values = true)]
    telegram_token: Option<String>,

    #[arg(long, env = "CHAT_ID")]
    telegram_chat_id: Option<String>,

    /// Print the outcome as JSON on stdout.
    #[arg(long)]
    json: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = build_config(&cli)?;
    config.validate()?;

    let detector = build_detector(&cli, &config)?;
    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = cancelled.clone();
    ctrlc::set_handler(move || {
        if !request_stop(&flag) {
            eprintln!("Second interrupt, exiting without a report");
            process::exit(130);
        }
        log::info!("Interrupt received, finishing up (press Ctrl-C again to abort)");
    })?;

    let mut use_case = CountPedestriansUseCase::new(
        Box::new(FfmpegReader::new()),
        detector,
        config,
        Box::new(StdoutPipelineLogger::default()),
        None,
        Some(cancelled),
    );
    let outcome = use_case.execute(&cli.source)?;

    print_outcome(&outcome, cli.json)?;

    let dispatcher = ReportDispatcher::new(build_sinks(&cli)?);
    dispatcher.dispatch(Report::new(
        &outcome.result,
        outcome.reason,
        cli.label.clone(),
    ));
    let stats = dispatcher.shutdown();
    if stats.failed > 0 {
        log::warn!("{} report deliveries failed", stats.failed);
    }
    Ok(())
}

/// Sets the stop flag. Returns `false` when it was already set, i.e. on a
/// repeated interrupt while the reader is still blocked.
fn request_stop(flag: &AtomicBool) -> bool {
    !flag.swap(true, Ordering::Relaxed)
}

fn build_config(cli: &Cli) -> Result<CounterConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => CounterConfig::from_file(path)?,
        None => CounterConfig::default(),
    };

    if let Some(confidence) = cli.confidence {
        config.tracker.confidence_threshold = confidence;
    }
    if let Some(n) = cli.skip_frames {
        config.skip_interval = n;
    }
    if let Some(axis) = cli.axis {
        config.boundary.axis = match axis {
            AxisArg::Vertical => Axis::Vertical,
            AxisArg::Horizontal => Axis::Horizontal,
        };
    }
    if let Some(px) = cli.position {
        config.boundary.position = BoundaryPosition::Absolute(px);
    }
    if let Some(f) = cli.fraction {
        config.boundary.position = BoundaryPosition::Fraction(f);
    }
    if let Some(direction) = cli.direction {
        config.boundary.direction = match direction {
            DirectionArg::Increasing => Direction::Increasing,
            DirectionArg::Decreasing => Direction::Decreasing,
        };
    }
    if let Some(matcher) = cli.matcher {
        config.tracker.matcher = match matcher {
            MatcherArg::Centroid => MatcherKind::Centroid,
            MatcherArg::Iou => MatcherKind::Iou,
            MatcherArg::External => MatcherKind::External,
        };
    }
    if let Some(n) = cli.max_lost {
        config.tracker.max_lost = n;
    }
    if let Some(d) = cli.max_match_distance {
        config.tracker.max_match_distance = d;
    }
    if let Some(path) = &cli.model {
        config.detector.model = Some(path.clone());
    }
    if let Some(url) = &cli.model_url {
        config.detector.model_url = Some(url.clone());
    }

    Ok(config)
}

fn build_detector(
    cli: &Cli,
    config: &CounterConfig,
) -> Result<Box<dyn PedestrianDetector>, Box<dyn std::error::Error>> {
    if let Some(path) = &cli.detections {
        let replay = ReplayDetector::from_file(path)?;
        log::info!(
            "Replaying detections for {} frames from {}",
            replay.frame_count(),
            path.display()
        );
        return Ok(Box::new(replay));
    }

    let progress: model_resolver::ProgressFn = Box::new(|downloaded, total| {
        if total > 0 {
            eprint!("\rDownloading model: {}%", downloaded * 100 / total);
        } else {
            eprint!("\rDownloading model: {} KiB", downloaded / 1024);
        }
    });
    let model_path = model_resolver::resolve(
        YOLO_MODEL_NAME,
        config.detector.model.as_deref(),
        config.detector.model_url.as_deref(),
        Some(progress),
    )?;
    Ok(Box::new(OnnxYoloDetector::new(
        &model_path,
        config.detector.score_floor,
    )?))
}

fn build_sinks(cli: &Cli) -> Result<Vec<Box<dyn ReportSink>>, Box<dyn std::error::Error>> {
    let mut sinks: Vec<Box<dyn ReportSink>> = vec![Box::new(LogReportSink)];
    match (&cli.telegram_token, &cli.telegram_chat_id) {
        (Some(token), Some(chat_id)) => {
            sinks.push(Box::new(TelegramReportSink::new(token, chat_id)?));
        }
        (Some(_), None) | (None, Some(_)) => {
            log::warn!("Telegram needs both a bot token and a chat id; skipping");
        }
        (None, None) => {}
    }
    Ok(sinks)
}

fn print_outcome(outcome: &CountOutcome, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
    } else {
        println!(
            "Unique pedestrians: {}, total detections: {} ({}, {} frames)",
            outcome.result.unique_count,
            outcome.result.total_detections,
            outcome.reason,
            outcome.frames_seen
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_interrupt_stops_second_aborts() {
        let flag = AtomicBool::new(false);
        assert!(request_stop(&flag));
        assert!(flag.load(Ordering::Relaxed));
        assert!(!request_stop(&flag));
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "pedcount",
            "clip.mp4",
            "--skip-frames",
            "3",
            "--matcher",
            "external",
        ]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.skip_interval, 3);
        assert_eq!(config.tracker.matcher, MatcherKind::External);
    }
}
