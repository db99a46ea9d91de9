//! COCO object detector for YOLOv8-family ONNX exports, run through `ort`.
//!
//! Letterboxes each frame to the model's square input, runs inference,
//! decodes the `[1, 4 + classes, anchors]` head and applies per-class NMS.
//! Output boxes are in the frame's own pixel space.

use std::path::Path;

use crate::detection::domain::detection::Detection;
use crate::detection::domain::pedestrian_detector::PedestrianDetector;
use crate::shared::frame::Frame;
use crate::shared::geometry::BoundingBox;

const DEFAULT_INPUT_SIZE: u32 = 640;

/// Boxes below this score are discarded before NMS. The tracker applies
/// the user-facing threshold on top.
pub const DEFAULT_SCORE_FLOOR: f64 = 0.25;

const NMS_IOU_THRESH: f64 = 0.45;

/// Values per anchor ahead of the class scores: cx, cy, w, h.
const BOX_VALUES: usize = 4;

pub struct OnnxYoloDetector {
    session: ort::session::Session,
    score_floor: f64,
    input_size: u32,
}

/// CoreML on macOS, DirectML on Windows; elsewhere `ort` stays on CPU.
fn execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    return vec![ort::execution_providers::CoreMLExecutionProvider::default().build()];
    #[cfg(target_os = "windows")]
    return vec![ort::execution_providers::DirectMLExecutionProvider::default().build()];
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    Vec::new()
}

impl OnnxYoloDetector {
    /// Loads the model; the input resolution is read from its NCHW input
    /// shape and falls back to 640 when dynamic.
    pub fn new(model_path: &Path, score_floor: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_execution_providers(execution_providers())?
            .commit_from_file(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| match input.dtype() {
                ort::value::ValueType::Tensor { ref shape, .. }
                    if shape.len() >= 4 && shape[2] > 0 =>
                {
                    Some(shape[2] as u32)
                }
                _ => None,
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        log::info!(
            "Loaded detection model {} (input {input_size}px)",
            model_path.display()
        );

        Ok(Self {
            session,
            score_floor,
            input_size,
        })
    }
}

impl PedestrianDetector for OnnxYoloDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        let (input_tensor, letterbox) = letterbox(frame, self.input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        if shape.len() != 3 {
            return Err(format!("Unexpected YOLO output shape: {shape:?}").into());
        }
        let data = tensor
            .as_standard_layout()
            .as_slice()
            .ok_or("Cannot get tensor slice")?
            .to_vec();

        let candidates = decode_head(&data, shape[1], shape[2], self.score_floor, &letterbox);
        Ok(nms(candidates, NMS_IOU_THRESH))
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Mapping from letterboxed model space back to frame space.
#[derive(Clone, Copy, Debug)]
struct Letterbox {
    scale: f64,
    pad_x: f64,
    pad_y: f64,
}

impl Letterbox {
    fn to_frame(self, cx: f64, cy: f64, w: f64, h: f64) -> BoundingBox {
        BoundingBox::new(
            (cx - w / 2.0 - self.pad_x) / self.scale,
            (cy - h / 2.0 - self.pad_y) / self.scale,
            (cx + w / 2.0 - self.pad_x) / self.scale,
            (cy + h / 2.0 - self.pad_y) / self.scale,
        )
    }
}

/// Nearest-neighbour resize into a gray-padded square NCHW float tensor.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, Letterbox) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    let gray = 114.0f32 / 255.0;
    let size = target_size as usize;
    let mut tensor = ndarray::Array4::<f32>::from_elem((1, 3, size, size), gray);

    let src = frame.pixels();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, pad_y as usize + y, pad_x as usize + x]] =
                    src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    (
        tensor,
        Letterbox {
            scale,
            pad_x: pad_x as f64,
            pad_y: pad_y as f64,
        },
    )
}

// ---------------------------------------------------------------------------
// Postprocessing
// ---------------------------------------------------------------------------

/// Decodes a YOLOv8 head. Exports are either `[1, features, anchors]`
/// (the default) or `[1, anchors, features]`; the smaller dimension is
/// taken to be the feature axis.
fn decode_head(
    data: &[f32],
    dim1: usize,
    dim2: usize,
    score_floor: f64,
    letterbox: &Letterbox,
) -> Vec<Detection> {
    let transposed = dim1 < dim2;
    let (num_anchors, num_feats) = if transposed { (dim2, dim1) } else { (dim1, dim2) };
    if num_feats <= BOX_VALUES {
        return Vec::new();
    }
    let value = |anchor: usize, feat: usize| -> f64 {
        if transposed {
            data[feat * num_anchors + anchor] as f64
        } else {
            data[anchor * num_feats + feat] as f64
        }
    };

    let mut out = Vec::new();
    for anchor in 0..num_anchors {
        let (class_id, score) = (BOX_VALUES..num_feats)
            .map(|f| (f - BOX_VALUES, value(anchor, f)))
            .fold((0, f64::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });
        if score < score_floor {
            continue;
        }
        let bbox = letterbox.to_frame(
            value(anchor, 0),
            value(anchor, 1),
            value(anchor, 2),
            value(anchor, 3),
        );
        out.push(Detection::new(class_id as u32, score.min(1.0), bbox));
    }
    out
}

/// Greedy per-class NMS, highest score first.
fn nms(mut dets: Vec<Detection>, iou_thresh: f64) -> Vec<Detection> {
    dets.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<Detection> = Vec::new();
    for det in dets {
        let suppressed = keep
            .iter()
            .any(|k| k.class_id == det.class_id && k.bbox.iou(&det.bbox) > iou_thresh);
        if !suppressed {
            keep.push(det);
        }
    }
    keep
}
