use std::sync::Arc;

use crate::bridge::{OcrLabel, OcrResult, OcrService, Screenshot};
use crate::perception::BoundingBox;

use super::element::{DetectionMethod, ElementMatch};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_warn;

/// Fixed glyph width used when OCR gives no label bounds.
pub const CHAR_WIDTH_PX: i32 = 12;
/// Fixed line height used when OCR gives no label bounds.
pub const LINE_HEIGHT_PX: i32 = 40;
/// Input fields sit this far below their label.
pub const INPUT_FIELD_OFFSET_PX: i32 = 30;

pub const BUTTON_CONFIDENCE: f64 = 0.85;
pub const TEXT_CONFIDENCE: f64 = 0.75;
pub const INPUT_FIELD_CONFIDENCE: f64 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextTarget {
    Button,
    Text,
    InputField,
}

impl TextTarget {
    fn confidence(self) -> f64 {
        match self {
            TextTarget::Button => BUTTON_CONFIDENCE,
            TextTarget::Text => TEXT_CONFIDENCE,
            TextTarget::InputField => INPUT_FIELD_CONFIDENCE,
        }
    }
}

/// OCR-backed detector: exact, case-insensitive label lookup.
#[derive(Clone)]
pub struct TextDetector {
    ocr: Arc<dyn OcrService>,
}

impl TextDetector {
    pub fn new(ocr: Arc<dyn OcrService>) -> Self {
        Self { ocr }
    }

    /// Runs OCR, degrading to `None` when the service fails.
    pub fn recognize(&self, screenshot: &Screenshot) -> Option<OcrResult> {
        match self.ocr.recognize(&screenshot.image) {
            Ok(result) => Some(result),
            Err(err) => {
                log_warn!("ocr failed on screenshot {}: {err:#}", screenshot.id);
                None
            }
        }
    }

    pub fn detect(&self, query: &str, target: TextTarget, screenshot: &Screenshot) -> Vec<ElementMatch> {
        match self.recognize(screenshot) {
            Some(result) => matches_in(&result, query, target),
            None => Vec::new(),
        }
    }
}

/// Candidates for `query` among the labels of an OCR pass.
pub fn matches_in(result: &OcrResult, query: &str, target: TextTarget) -> Vec<ElementMatch> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }

    result
        .labels
        .iter()
        .enumerate()
        .filter(|(_, label)| label.text.trim().to_lowercase() == query)
        .filter_map(|(index, label)| {
            let label_box = label_bounds(label, index, &result.text)?;
            let bbox = match target {
                TextTarget::InputField => label_box.shifted_down(INPUT_FIELD_OFFSET_PX),
                TextTarget::Button | TextTarget::Text => label_box,
            };
            Some(ElementMatch::new(
                label.text.clone(),
                bbox,
                target.confidence(),
                DetectionMethod::Text,
            ))
        })
        .collect()
}

/// Reported bounds, or an estimate from where the label sits in the full text.
fn label_bounds(label: &OcrLabel, index: usize, full_text: &str) -> Option<BoundingBox> {
    if let Some(bounds) = label.bounds {
        return Some(bounds);
    }

    let needle = label.text.trim().to_lowercase();
    let chars = needle.chars().count().max(1) as i32;
    let (line, column) = locate_in_text(full_text, &needle).unwrap_or((index, 0));

    BoundingBox::new(
        column as i32 * CHAR_WIDTH_PX,
        line as i32 * LINE_HEIGHT_PX,
        chars * CHAR_WIDTH_PX,
        LINE_HEIGHT_PX,
    )
    .ok()
}

fn locate_in_text(full_text: &str, needle: &str) -> Option<(usize, usize)> {
    if needle.is_empty() {
        return None;
    }
    full_text.lines().enumerate().find_map(|(line_index, line)| {
        let lowered = line.to_lowercase();
        lowered
            .find(needle)
            .map(|byte_offset| (line_index, lowered[..byte_offset].chars().count()))
    })
}
