use serde::{Deserialize, Serialize};

use crate::perception::{BoundingBox, ScreenSize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetectionMethod {
    Pattern,
    Text,
    Object,
    Combined,
}

/// Where an element was found on one screenshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementLocation {
    pub bounding_box: BoundingBox,
    pub confidence: f64,
    pub detection_method: DetectionMethod,
    pub screen_size: ScreenSize,
}

impl ElementLocation {
    pub fn new(
        bounding_box: BoundingBox,
        confidence: f64,
        detection_method: DetectionMethod,
        screen_size: ScreenSize,
    ) -> Self {
        Self {
            bounding_box,
            confidence: clamp_confidence(confidence),
            detection_method,
            screen_size,
        }
    }
}

/// A single detector's candidate, before fusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementMatch {
    pub label: String,
    pub bounding_box: BoundingBox,
    pub confidence: f64,
    pub method: DetectionMethod,
}

impl ElementMatch {
    pub fn new(
        label: impl Into<String>,
        bounding_box: BoundingBox,
        confidence: f64,
        method: DetectionMethod,
    ) -> Self {
        Self {
            label: label.into(),
            bounding_box,
            confidence: clamp_confidence(confidence),
            method,
        }
    }
}

fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
