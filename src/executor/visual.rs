use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::time::Instant;

use crate::bridge::{ScreenCapture, Screenshot, TouchDriver};
use crate::detection::{ElementFinder, ElementLocation};
use crate::journal::{JournalEntry, RunJournal};
use crate::metrics::{MetricsCollector, StepMetrics};
use crate::perception::{ActionTargetCalculator, SpatialAnalyzer, SwipePath};
use crate::settings::AgentSettings;
use crate::templates::signature::{compute_hamming_distance, compute_phash};
use crate::utils::run_blocking;

use super::result::{ActionResult, AgentAction};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// How long a swipe holds its first contact before moving.
const PRESS_HOLD_MS: u64 = 100;
/// Pause between focusing a field and typing into it.
const FOCUS_DELAY_MS: u64 = 200;

#[derive(Debug, Clone, Copy)]
enum Lookup {
    Button,
    Icon,
    InputField,
    Text,
}

#[derive(Debug, Default)]
struct Attempt {
    capture_ms: u64,
    detection_ms: u64,
    action_ms: u64,
    verification_ms: u64,
    last_screenshot: Option<Screenshot>,
}

/// Performs one perceived interaction: capture, locate, touch, settle,
/// capture again.
pub struct VisualActionExecutor {
    capture: Arc<dyn ScreenCapture>,
    touch: Arc<dyn TouchDriver>,
    finder: Arc<ElementFinder>,
    spatial: SpatialAnalyzer,
    targets: ActionTargetCalculator,
    settle_delay: Duration,
    transport_timeout: Duration,
    screenshot_dir: Option<PathBuf>,
    metrics: MetricsCollector,
    journal: Arc<dyn RunJournal>,
}

impl VisualActionExecutor {
    pub fn new(
        capture: Arc<dyn ScreenCapture>,
        touch: Arc<dyn TouchDriver>,
        finder: Arc<ElementFinder>,
        journal: Arc<dyn RunJournal>,
        settings: &AgentSettings,
    ) -> Self {
        Self {
            capture,
            touch,
            finder,
            spatial: SpatialAnalyzer::new(),
            targets: ActionTargetCalculator::new(settings.tap_margin_px),
            settle_delay: settings.settle_delay(),
            transport_timeout: settings.transport_timeout(),
            screenshot_dir: settings.screenshot_dir.clone(),
            metrics: MetricsCollector::new(),
            journal,
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub async fn execute(&self, action: &AgentAction) -> ActionResult {
        match action {
            AgentAction::Tap { label } => self.tap_button(label).await,
            AgentAction::TapIcon { name } => self.tap_icon(name).await,
            AgentAction::Type { text, field } => self.type_text(text, field).await,
            AgentAction::Swipe { from, to } => self.swipe(from, to).await,
            AgentAction::Wait { duration_ms } => self.wait(Duration::from_millis(*duration_ms)).await,
        }
    }

    pub async fn tap_button(&self, text: &str) -> ActionResult {
        let description = format!("Tap '{text}'");
        let mut attempt = Attempt::default();
        let started = Instant::now();
        let outcome = self.tap_element(Lookup::Button, text, &mut attempt).await;
        self.finish(&description, started, attempt, outcome).await
    }

    pub async fn tap_icon(&self, name: &str) -> ActionResult {
        let description = format!("Tap icon '{name}'");
        let mut attempt = Attempt::default();
        let started = Instant::now();
        let outcome = self.tap_element(Lookup::Icon, name, &mut attempt).await;
        self.finish(&description, started, attempt, outcome).await
    }

    pub async fn type_text(&self, text: &str, field_label: &str) -> ActionResult {
        let description = format!("Type '{text}' into '{field_label}'");
        let mut attempt = Attempt::default();
        let started = Instant::now();
        let outcome = self.type_into_field(text, field_label, &mut attempt).await;
        self.finish(&description, started, attempt, outcome).await
    }

    pub async fn swipe(&self, from_text: &str, to_text: &str) -> ActionResult {
        let description = format!("Swipe from '{from_text}' to '{to_text}'");
        let mut attempt = Attempt::default();
        let started = Instant::now();
        let outcome = self.swipe_between(from_text, to_text, &mut attempt).await;
        self.finish(&description, started, attempt, outcome).await
    }

    pub async fn wait(&self, duration: Duration) -> ActionResult {
        let description = format!("Wait {}ms", duration.as_millis());
        let mut attempt = Attempt::default();
        let started = Instant::now();
        tokio::time::sleep(duration).await;
        let outcome = self
            .verification_capture(&mut attempt)
            .await
            .map(|screenshot| ActionResult::Success {
                message: format!("Waited {}ms", duration.as_millis()),
                screenshot,
                coordinates: None,
            });
        self.finish(&description, started, attempt, outcome).await
    }

    async fn tap_element(&self, lookup: Lookup, query: &str, attempt: &mut Attempt) -> Result<ActionResult> {
        let before = self.timed_capture(attempt).await?;
        let Some(location) = self.locate(lookup, query, &before, attempt).await? else {
            return Ok(ActionResult::failure(
                format!("{} '{query}' not found on screen", lookup.noun()),
                Some(before),
            ));
        };

        let spatial = self.spatial.analyze(&location);
        if !spatial.is_visible {
            log_warn!("'{query}' extends past the screen edge; tapping its on-box point anyway");
        }
        let target = self.targets.calculate_tap_target(&location, &spatial);
        let point = target.point();

        let action_start = Instant::now();
        let touch = Arc::clone(&self.touch);
        self.blocking("tap", move || touch.tap(point)).await?;
        attempt.action_ms = elapsed_ms(action_start);

        tokio::time::sleep(self.settle_delay).await;
        let after = self.verification_capture(attempt).await?;

        if !self.verify_action(&before, &after) {
            return Ok(ActionResult::failure(
                format!("Tap on '{query}' had no visible effect"),
                Some(after),
            ));
        }

        Ok(ActionResult::Success {
            message: format!(
                "Tapped '{query}' at ({}, {}) with confidence {:.2}",
                point.x, point.y, target.confidence
            ),
            screenshot: after,
            coordinates: Some(point),
        })
    }

    async fn type_into_field(&self, text: &str, field_label: &str, attempt: &mut Attempt) -> Result<ActionResult> {
        let before = self.timed_capture(attempt).await?;

        let location = if field_label.trim().is_empty() {
            self.finder.find_focused_input_field(&before)
        } else {
            self.locate(Lookup::InputField, field_label, &before, attempt)
                .await?
        };
        let Some(location) = location else {
            let message = if field_label.trim().is_empty() {
                "No field label given and the focused field cannot be located".to_string()
            } else {
                format!("Input field '{field_label}' not found on screen")
            };
            return Ok(ActionResult::failure(message, Some(before)));
        };

        let spatial = self.spatial.analyze(&location);
        let target = self.targets.calculate_input_field_target(&location, &spatial);
        let point = target.point();

        let action_start = Instant::now();
        let touch = Arc::clone(&self.touch);
        self.blocking("focus tap", move || touch.tap(point)).await?;
        tokio::time::sleep(Duration::from_millis(FOCUS_DELAY_MS)).await;

        let touch = Arc::clone(&self.touch);
        let typed = text.to_string();
        self.blocking("text input", move || touch.input_text(&typed))
            .await?;
        attempt.action_ms = elapsed_ms(action_start);

        tokio::time::sleep(self.settle_delay).await;
        let after = self.verification_capture(attempt).await?;

        Ok(ActionResult::Success {
            message: format!("Typed {} characters into '{field_label}'", text.chars().count()),
            screenshot: after,
            coordinates: Some(point),
        })
    }

    async fn swipe_between(&self, from_text: &str, to_text: &str, attempt: &mut Attempt) -> Result<ActionResult> {
        let before = self.timed_capture(attempt).await?;

        let from = self.locate(Lookup::Text, from_text, &before, attempt).await?;
        let to = self.locate(Lookup::Text, to_text, &before, attempt).await?;
        let (from, to) = match (from, to) {
            (Some(from), Some(to)) => (from, to),
            (None, _) => {
                return Ok(ActionResult::failure(
                    format!("Swipe start '{from_text}' not found on screen"),
                    Some(before),
                ))
            }
            (_, None) => {
                return Ok(ActionResult::failure(
                    format!("Swipe end '{to_text}' not found on screen"),
                    Some(before),
                ))
            }
        };

        let from_spatial = self.spatial.analyze(&from);
        let to_spatial = self.spatial.analyze(&to);
        let path = self
            .targets
            .calculate_swipe_path(&from, &from_spatial, &to, &to_spatial);

        let action_start = Instant::now();
        let touch = Arc::clone(&self.touch);
        self.blocking("swipe", move || perform_swipe(touch.as_ref(), path))
            .await?;
        attempt.action_ms = elapsed_ms(action_start);

        tokio::time::sleep(self.settle_delay).await;
        let after = self.verification_capture(attempt).await?;

        Ok(ActionResult::Success {
            message: format!(
                "Swiped from ({}, {}) to ({}, {}) in {}ms",
                path.start.x, path.start.y, path.end.x, path.end.y, path.duration_ms
            ),
            screenshot: after,
            coordinates: Some(path.start),
        })
    }

    async fn locate(
        &self,
        lookup: Lookup,
        query: &str,
        screenshot: &Screenshot,
        attempt: &mut Attempt,
    ) -> Result<Option<ElementLocation>> {
        let started = Instant::now();
        let finder = Arc::clone(&self.finder);
        let shot = screenshot.clone();
        let query = query.to_string();
        let location = self
            .blocking("element lookup", move || {
                Ok(match lookup {
                    Lookup::Button => finder.find_button(&query, &shot),
                    Lookup::Icon => finder.find_icon(&query, &shot),
                    Lookup::InputField => finder.find_input_field(&query, &shot),
                    Lookup::Text => finder.find_text(&query, &shot),
                })
            })
            .await?;
        attempt.detection_ms += elapsed_ms(started);
        Ok(location)
    }

    async fn timed_capture(&self, attempt: &mut Attempt) -> Result<Screenshot> {
        let started = Instant::now();
        let capture = Arc::clone(&self.capture);
        let screenshot = self
            .blocking("screenshot capture", move || capture.capture())
            .await?;
        attempt.capture_ms += elapsed_ms(started);
        attempt.last_screenshot = Some(screenshot.clone());
        Ok(screenshot)
    }

    async fn verification_capture(&self, attempt: &mut Attempt) -> Result<Screenshot> {
        let started = Instant::now();
        let capture = Arc::clone(&self.capture);
        let mut screenshot = self
            .blocking("verification capture", move || capture.capture())
            .await?;

        if let Some(dir) = &self.screenshot_dir {
            if let Err(err) = screenshot.save_png(dir) {
                log_warn!("could not keep verification screenshot: {err:#}");
            }
        }

        attempt.verification_ms += elapsed_ms(started);
        attempt.last_screenshot = Some(screenshot.clone());
        Ok(screenshot)
    }

    /// Whether the action visibly took effect. Screen diffing is not
    /// implemented, so every action counts as effective; the perceptual
    /// distance is only logged.
    fn verify_action(&self, before: &Screenshot, after: &Screenshot) -> bool {
        let distance = compute_hamming_distance(&compute_phash(&before.image), &compute_phash(&after.image));
        log::debug!("screen change after action: phash distance {distance}");
        true
    }

    /// Runs a blocking bridge call off the async runtime, bounded by the
    /// transport timeout.
    async fn blocking<T, F>(&self, what: &str, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        run_blocking(what, self.transport_timeout, job).await
    }

    async fn finish(
        &self,
        description: &str,
        started: Instant,
        attempt: Attempt,
        outcome: Result<ActionResult>,
    ) -> ActionResult {
        let result = match outcome {
            Ok(result) => result,
            Err(err) => {
                log_error!("{description} failed: {err:#}");
                ActionResult::failure(format!("{description} failed: {err:#}"), attempt.last_screenshot)
            }
        };

        let coordinates = result.coordinates();
        self.journal.record(JournalEntry::Action {
            action: description.to_string(),
            success: result.is_success(),
            message: result.message().to_string(),
            x: coordinates.map(|p| p.x),
            y: coordinates.map(|p| p.y),
        });
        self.journal.narrative(result.message());
        log_info!("{description}: {}", result.message());

        let system = self.metrics.sample_system_metrics().await;
        self.metrics
            .record_step(StepMetrics {
                timestamp: Utc::now(),
                action: description.to_string(),
                capture_ms: attempt.capture_ms,
                detection_ms: attempt.detection_ms,
                action_ms: attempt.action_ms,
                verification_ms: attempt.verification_ms,
                total_ms: elapsed_ms(started),
                success: result.is_success(),
                cpu_percent: system.cpu_percent,
                memory_mb: system.memory_mb,
            })
            .await;

        result
    }
}

impl Lookup {
    fn noun(self) -> &'static str {
        match self {
            Lookup::Button => "Button",
            Lookup::Icon => "Icon",
            Lookup::InputField => "Input field",
            Lookup::Text => "Text",
        }
    }
}

/// Press, hold, move, release.
fn perform_swipe(touch: &dyn TouchDriver, path: SwipePath) -> Result<()> {
    touch.press(path.start)?;
    std::thread::sleep(Duration::from_millis(PRESS_HOLD_MS));
    if let Err(err) = touch.move_to(path.end, path.duration_ms) {
        // Never leave a finger down on the device.
        let _ = touch.release(path.end);
        return Err(err);
    }
    touch.release(path.end)
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}
