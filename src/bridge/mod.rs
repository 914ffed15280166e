//! Seams to the device and the vision services the agent depends on.
//!
//! Every trait here is a blocking call against something outside the
//! process. Callers on the async side run them through
//! `tokio::task::spawn_blocking` with a timeout.

mod screenshot;

pub use screenshot::Screenshot;

use anyhow::Result;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::perception::{BoundingBox, Point};
use crate::templates::Template;

/// Captures the current device screen.
pub trait ScreenCapture: Send + Sync {
    fn capture(&self) -> Result<Screenshot>;
}

/// Low-level touch and keyboard primitives of the device transport.
pub trait TouchDriver: Send + Sync {
    fn tap(&self, point: Point) -> Result<()>;
    fn press(&self, point: Point) -> Result<()>;
    fn move_to(&self, point: Point, duration_ms: u64) -> Result<()>;
    fn release(&self, point: Point) -> Result<()>;
    /// Injects characters into whatever field currently has focus.
    fn input_text(&self, text: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrLabel {
    pub text: String,
    /// Screen bounds of the label when the OCR engine reports them.
    pub bounds: Option<BoundingBox>,
}

impl OcrLabel {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bounds: None,
        }
    }

    pub fn with_bounds(text: impl Into<String>, bounds: BoundingBox) -> Self {
        Self {
            text: text.into(),
            bounds: Some(bounds),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrResult {
    pub text: String,
    pub confidence: f64,
    pub word_count: u64,
    /// Short strings the engine considers likely button or field labels.
    pub labels: Vec<OcrLabel>,
}

pub trait OcrService: Send + Sync {
    fn recognize(&self, image: &RgbaImage) -> Result<OcrResult>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatternHit {
    pub bounds: BoundingBox,
    pub score: f64,
}

/// Scores a template image against a screenshot.
pub trait PatternMatcher: Send + Sync {
    fn match_template(&self, screenshot: &RgbaImage, template: &Template) -> Result<Option<PatternHit>>;
}

/// Proposes candidate element regions for runtime template discovery.
pub trait RegionDetector: Send + Sync {
    fn detect(&self, screenshot: &RgbaImage) -> Result<Vec<BoundingBox>>;
}

/// Pattern matching has no built-in engine; plug a real matcher in through
/// [`PatternMatcher`].
#[derive(Debug, Default)]
pub struct UnimplementedPatternMatcher;

impl PatternMatcher for UnimplementedPatternMatcher {
    fn match_template(&self, _screenshot: &RgbaImage, template: &Template) -> Result<Option<PatternHit>> {
        log::trace!("no pattern matcher configured, skipping template {}", template.name);
        Ok(None)
    }
}

/// Object detection is not implemented; discovery sees no regions until a
/// real detector is supplied.
#[derive(Debug, Default)]
pub struct UnimplementedRegionDetector;

impl RegionDetector for UnimplementedRegionDetector {
    fn detect(&self, _screenshot: &RgbaImage) -> Result<Vec<BoundingBox>> {
        Ok(Vec::new())
    }
}
