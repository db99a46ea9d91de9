pub const YOLO_MODEL_NAME: &str = "yolov8n.onnx";

/// COCO class index for `person`.
pub const PERSON_CLASS_ID: u32 = 0;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.5;

/// Max processed frames a track can go unmatched before it is retired.
pub const TRACKER_MAX_LOST: usize = 30;

/// Centroid gate for nearest-centroid matching, in pixels.
pub const DEFAULT_MAX_MATCH_DISTANCE: f64 = 80.0;

pub const DEFAULT_MIN_IOU: f64 = 0.3;

pub const DEFAULT_SKIP_INTERVAL: usize = 1;

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
