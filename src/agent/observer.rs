use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use image::ImageFormat;
use serde::{Deserialize, Serialize};

use crate::bridge::{OcrResult, OcrService, Screenshot};
use crate::detection::TextDetector;
use crate::llm::VisionClient;
use crate::utils::run_blocking;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_warn;

const UNKNOWN_STATE: &str = "unknown";
const STATE_PROMPT: &str = "You are looking at a mobile app screenshot. \
Answer with the name of the screen only, in at most four words (for example: Login, Home, Settings).";

/// What the agent perceives after an action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub state: String,
    pub elements: Vec<String>,
}

/// Turns screenshots into observations: OCR labels for elements, the
/// vision model (when configured) for the screen name.
#[derive(Clone)]
pub struct ScreenObserver {
    text: TextDetector,
    vision: Option<VisionClient>,
    ocr_timeout: Duration,
}

impl ScreenObserver {
    pub fn new(ocr: Arc<dyn OcrService>, ocr_timeout: Duration) -> Self {
        Self {
            text: TextDetector::new(ocr),
            vision: None,
            ocr_timeout,
        }
    }

    pub fn with_vision(mut self, client: VisionClient) -> Self {
        self.vision = Some(client);
        self
    }

    pub async fn observe(&self, screenshot: &Screenshot) -> Observation {
        let text = self.text.clone();
        let shot = screenshot.clone();
        let ocr = match run_blocking("ocr", self.ocr_timeout, move || Ok(text.recognize(&shot))).await {
            Ok(result) => result.unwrap_or_default(),
            Err(err) => {
                log_warn!("observing without OCR: {err:#}");
                OcrResult::default()
            }
        };

        let state = match self.vision_state(screenshot).await {
            Some(state) => state,
            None => fallback_state(&ocr),
        };

        Observation {
            state,
            elements: ocr.labels.into_iter().map(|label| label.text).collect(),
        }
    }

    async fn vision_state(&self, screenshot: &Screenshot) -> Option<String> {
        let client = self.vision.as_ref()?;
        let png = match encode_png(screenshot) {
            Ok(png) => png,
            Err(err) => {
                log_warn!("could not encode screenshot for the vision model: {err:#}");
                return None;
            }
        };

        match client.generate(STATE_PROMPT, Some(&png)).await {
            Ok(answer) => first_line(&answer),
            Err(err) => {
                log_warn!("vision model unavailable, using OCR for screen state: {err:#}");
                None
            }
        }
    }
}

fn encode_png(screenshot: &Screenshot) -> Result<Vec<u8>> {
    let mut png = Vec::new();
    screenshot
        .image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .context("failed to encode screenshot as PNG")?;
    Ok(png)
}

fn first_line(text: &str) -> Option<String> {
    text.lines()
        .map(|line| line.trim().trim_matches(|c| c == '"' || c == '.'))
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

/// First non-empty OCR line, or "unknown".
pub fn fallback_state(ocr: &OcrResult) -> String {
    first_line(&ocr.text).unwrap_or_else(|| UNKNOWN_STATE.to_string())
}
