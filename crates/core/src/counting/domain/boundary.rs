use serde::{Deserialize, Serialize};

use crate::shared::geometry::Point;

/// Orientation of the counting line.
///
/// `Vertical` is the line `x = position`, crossed by horizontal motion.
/// `Horizontal` is the line `y = position`, crossed by vertical motion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Vertical,
    Horizontal,
}

/// Which way a subject must move to be counted.
///
/// `Increasing` means toward larger coordinates: left to right for a
/// vertical line, top to bottom for a horizontal one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increasing,
    Decreasing,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Boundary {
    pub axis: Axis,
    pub position: f64,
    pub direction: Direction,
}

impl Boundary {
    pub fn new(axis: Axis, position: f64, direction: Direction) -> Self {
        Self {
            axis,
            position,
            direction,
        }
    }

    /// The coordinate of `p` along the line's normal.
    pub fn coordinate(&self, p: &Point) -> f64 {
        match self.axis {
            Axis::Vertical => p.x,
            Axis::Horizontal => p.y,
        }
    }

    /// Strictly beyond the line on the counted side.
    pub fn is_past(&self, p: &Point) -> bool {
        let c = self.coordinate(p);
        match self.direction {
            Direction::Increasing => c > self.position,
            Direction::Decreasing => c < self.position,
        }
    }

    /// Signed movement from `from` to `to`, positive in the counted direction.
    pub fn displacement(&self, from: &Point, to: &Point) -> f64 {
        let delta = self.coordinate(to) - self.coordinate(from);
        match self.direction {
            Direction::Increasing => delta,
            Direction::Decreasing => -delta,
        }
    }
}

/// Line position as configured: absolute pixels or a fraction of the frame
/// dimension along the line's normal.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryPosition {
    Absolute(f64),
    Fraction(f64),
}

impl BoundaryPosition {
    pub fn resolve(&self, axis: Axis, frame_width: u32, frame_height: u32) -> f64 {
        match *self {
            BoundaryPosition::Absolute(px) => px,
            BoundaryPosition::Fraction(f) => {
                let extent = match axis {
                    Axis::Vertical => frame_width,
                    Axis::Horizontal => frame_height,
                };
                extent as f64 * f
            }
        }
    }
}
