use crate::bridge::Screenshot;
use crate::templates::ElementType;

use super::element::{ElementLocation, ElementMatch};
use super::fusion::integrate_matches;
use super::pattern::PatternDetector;
use super::text::{TextDetector, TextTarget};

/// Locates UI elements by fusing OCR text hits with template hits.
#[derive(Clone)]
pub struct ElementFinder {
    text: TextDetector,
    pattern: PatternDetector,
}

impl ElementFinder {
    pub fn new(text: TextDetector, pattern: PatternDetector) -> Self {
        Self { text, pattern }
    }

    pub fn find_button(&self, text: &str, screenshot: &Screenshot) -> Option<ElementLocation> {
        let mut candidates = self.text.detect(text, TextTarget::Button, screenshot);
        candidates.extend(self.pattern.detect(text, &[ElementType::Button], screenshot));
        self.fuse(text, candidates, screenshot)
    }

    /// The field is assumed to sit just below its visible label.
    pub fn find_input_field(&self, label: &str, screenshot: &Screenshot) -> Option<ElementLocation> {
        let mut candidates = self.text.detect(label, TextTarget::InputField, screenshot);
        candidates.extend(self.pattern.detect(label, &[ElementType::Other], screenshot));
        self.fuse(label, candidates, screenshot)
    }

    pub fn find_text(&self, text: &str, screenshot: &Screenshot) -> Option<ElementLocation> {
        let candidates = self.text.detect(text, TextTarget::Text, screenshot);
        self.fuse(text, candidates, screenshot)
    }

    pub fn find_icon(&self, name: &str, screenshot: &Screenshot) -> Option<ElementLocation> {
        let candidates =
            self.pattern
                .detect(name, &[ElementType::Icon, ElementType::Indicator], screenshot);
        self.fuse(name, candidates, screenshot)
    }

    /// Locating the field that currently holds keyboard focus needs
    /// platform support the bridge does not expose yet.
    pub fn find_focused_input_field(&self, _screenshot: &Screenshot) -> Option<ElementLocation> {
        log::debug!("focused field lookup is not supported; a field label is required");
        None
    }

    fn fuse(
        &self,
        query: &str,
        candidates: Vec<ElementMatch>,
        screenshot: &Screenshot,
    ) -> Option<ElementLocation> {
        let count = candidates.len();
        let location = integrate_matches(candidates, screenshot.screen_size);
        match &location {
            Some(found) => log::debug!(
                "'{query}' located at ({}, {}) from {count} candidates via {:?} (confidence {:.2})",
                found.bounding_box.x,
                found.bounding_box.y,
                found.detection_method,
                found.confidence
            ),
            None => log::debug!("'{query}' not found on screenshot {}", screenshot.id),
        }
        location
    }
}
