//! Detection data model.
//!
//! One object reported by the vision collaborator for a single frame. The
//! engine never mutates a detection; it only reads it during one decision cycle.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

pub const DEFAULT_FRAME_WIDTH: f64 = 640.0;

const LEFT_BOUNDARY_RATIO: f64 = 0.35;
const RIGHT_BOUNDARY_RATIO: f64 = 0.65;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Front,
    Left,
    Right,
    Back,
    Center,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Front => "front",
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::Back => "back",
            Direction::Center => "center",
        }
    }

    /// Spoken form used inside alert messages.
    pub fn phrase(&self) -> &'static str {
        match self {
            Direction::Front => "ahead of you",
            Direction::Left => "on your left",
            Direction::Right => "on your right",
            Direction::Back => "behind you",
            Direction::Center => "in the middle",
        }
    }

    /// Derive a direction from the horizontal centre of a `[x1, y1, x2, y2]` box.
    /// The frame is split into left / front / right at 35% and 65% of its width.
    pub fn from_bbox(bbox: &[f64; 4], frame_width: f64) -> Self {
        let center_x = (bbox[0] + bbox[2]) / 2.0;
        if center_x < frame_width * LEFT_BOUNDARY_RATIO {
            Direction::Left
        } else if center_x > frame_width * RIGHT_BOUNDARY_RATIO {
            Direction::Right
        } else {
            Direction::Front
        }
    }
}

fn default_confidence() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Detection {
    pub class: String,
    /// Label spoken to the user; falls back to `class` when empty.
    #[serde(default, alias = "class_ar")]
    pub class_localized: String,
    pub distance_m: f64,
    #[serde(default)]
    pub direction: Option<Direction>,
    #[serde(default = "default_confidence", alias = "conf")]
    pub confidence: f64,
    #[serde(default)]
    pub bbox: Option<[f64; 4]>,
}

impl Detection {
    pub fn new(class: impl Into<String>, distance_m: f64) -> Self {
        Self {
            class: class.into(),
            class_localized: String::new(),
            distance_m,
            direction: None,
            confidence: default_confidence(),
            bbox: None,
        }
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.class_localized = label.into();
        self
    }

    pub fn with_bbox(mut self, bbox: [f64; 4]) -> Self {
        self.bbox = Some(bbox);
        self
    }

    /// Lowercased, trimmed class used as the key for every per-class table.
    pub fn class_key(&self) -> String {
        normalize_class(&self.class)
    }

    pub fn label(&self) -> &str {
        let localized = self.class_localized.trim();
        if localized.is_empty() {
            self.class.trim()
        } else {
            localized
        }
    }

    /// Explicit direction wins; otherwise derive one from the bounding box.
    pub fn resolved_direction(&self, frame_width: f64) -> Direction {
        match (self.direction, self.bbox.as_ref()) {
            (Some(direction), _) => direction,
            (None, Some(bbox)) => Direction::from_bbox(bbox, frame_width),
            (None, None) => Direction::Front,
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.class.trim().is_empty() {
            return Err(EngineError::InvalidInput("detection has an empty class".into()));
        }
        if !self.distance_m.is_finite() || self.distance_m < 0.0 {
            return Err(EngineError::InvalidInput(format!(
                "detection '{}' has invalid distance {}",
                self.class, self.distance_m
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(EngineError::InvalidInput(format!(
                "detection '{}' has confidence {} outside [0, 1]",
                self.class, self.confidence
            )));
        }
        Ok(())
    }
}

pub fn normalize_class(class: &str) -> String {
    class.trim().to_lowercase()
}

/// Output of the motion collaborator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct StationarySignal {
    pub is_stationary: bool,
    #[serde(default)]
    pub confidence: f64,
}

impl StationarySignal {
    pub fn moving() -> Self {
        Self::default()
    }

    pub fn stationary(confidence: f64) -> Self {
        Self {
            is_stationary: true,
            confidence,
        }
    }
}
