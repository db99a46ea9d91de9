use serde::{Deserialize, Serialize};

use crate::shared::geometry::BoundingBox;

/// A single localized object in one frame.
///
/// `track_id` is set only when the detection source runs its own
/// multi-object tracker and supplies a persistent id.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub class_id: u32,
    pub confidence: f64,
    pub bbox: BoundingBox,
    pub track_id: Option<u32>,
}

impl Detection {
    pub fn new(class_id: u32, confidence: f64, bbox: BoundingBox) -> Self {
        Self {
            class_id,
            confidence,
            bbox,
            track_id: None,
        }
    }

    pub fn with_track_id(mut self, track_id: u32) -> Self {
        self.track_id = Some(track_id);
        self
    }

    /// Finite confidence in `[0, 1]` and a valid box.
    pub fn is_well_formed(&self) -> bool {
        self.confidence.is_finite()
            && (0.0..=1.0).contains(&self.confidence)
            && self.bbox.is_valid()
    }
}

/// Lenient wire form of a detection, as read from external sources.
///
/// Every field is optional so that one bad record does not reject a whole
/// frame; [`RawDetection::into_detection`] decides what survives. Ids are
/// read as numbers because trackers such as Ultralytics export them as
/// floats (`"cls": 0.0`); only integral values convert.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    #[serde(default, alias = "class", alias = "cls")]
    pub class_id: Option<f64>,
    #[serde(default, alias = "conf", alias = "score")]
    pub confidence: Option<f64>,
    #[serde(default, alias = "box", alias = "xyxy")]
    pub bbox: Option<Vec<f64>>,
    #[serde(default, alias = "id")]
    pub track_id: Option<f64>,
}

/// `Some` only for a finite, integral, non-negative value that fits a `u32`.
fn integral_id(value: f64) -> Option<u32> {
    let in_range = value.is_finite()
        && value.fract() == 0.0
        && (0.0..=u32::MAX as f64).contains(&value);
    in_range.then_some(value as u32)
}

impl RawDetection {
    /// Parses one untyped JSON entry, dropping it when any field has the
    /// wrong type.
    pub fn parse_value(value: serde_json::Value) -> Option<Detection> {
        serde_json::from_value::<RawDetection>(value)
            .ok()?
            .into_detection()
    }

    /// Returns `None` for a missing class, confidence or box, a box that is
    /// not exactly four coordinates, a fractional or negative id, or any
    /// value that fails [`Detection::is_well_formed`].
    pub fn into_detection(self) -> Option<Detection> {
        let class_id = integral_id(self.class_id?)?;
        let confidence = self.confidence?;
        let coords: [f64; 4] = self.bbox?.try_into().ok()?;
        let track_id = match self.track_id {
            Some(id) => Some(integral_id(id)?),
            None => None,
        };

        let detection = Detection {
            class_id,
            confidence,
            bbox: BoundingBox::from_array(coords),
            track_id,
        };
        detection.is_well_formed().then_some(detection)
    }
}
