use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::attention::AttentionManager;
use crate::bridge::{OcrService, PatternMatcher, RegionDetector, ScreenCapture, Screenshot, TouchDriver};
use crate::db::{Database, StepRecord, TemplateRecord};
use crate::detection::{ElementFinder, PatternDetector, TextDetector};
use crate::executor::{ActionResult, VisualActionExecutor};
use crate::goals::{GoalManager, GoalState};
use crate::journal::RunJournal;
use crate::llm::VisionClient;
use crate::metrics::MetricsCollector;
use crate::prediction::{PredictionManager, VerificationResult};
use crate::settings::AgentSettings;
use crate::templates::{HybridTemplateManager, RuntimeTemplateDiscovery, Template};
use crate::utils::run_blocking;

use super::observer::{Observation, ScreenObserver};
use super::planner::{PlannedStep, PlanningContext, StepPlanner};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Device and vision services one run is wired to.
#[derive(Clone)]
pub struct AgentServices {
    pub capture: Arc<dyn ScreenCapture>,
    pub touch: Arc<dyn TouchDriver>,
    pub ocr: Arc<dyn OcrService>,
    pub matcher: Arc<dyn PatternMatcher>,
    pub regions: Arc<dyn RegionDetector>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    GoalAchieved,
    PlannerFinished,
    Stuck,
    IterationLimit,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub iterations: u32,
    pub failures: u32,
}

/// The perception, action and prediction cycle of one run.
pub struct AgentLoop {
    run_id: String,
    capture: Arc<dyn ScreenCapture>,
    executor: VisualActionExecutor,
    observer: ScreenObserver,
    planner: Arc<dyn StepPlanner>,
    templates: Arc<HybridTemplateManager>,
    goals: GoalManager,
    predictions: PredictionManager,
    attention: AttentionManager,
    db: Option<Database>,
    journal: Arc<dyn RunJournal>,
    transport_timeout: Duration,
    max_iterations: u32,
    stuck_threshold: u32,
}

impl AgentLoop {
    pub fn new(
        services: AgentServices,
        planner: Arc<dyn StepPlanner>,
        settings: &AgentSettings,
        journal: Arc<dyn RunJournal>,
    ) -> Self {
        let mut discovery = RuntimeTemplateDiscovery::new(services.regions);
        if let Some(dir) = &settings.runtime_template_dir {
            discovery = discovery.with_output_dir(dir.clone());
        }
        let templates = Arc::new(HybridTemplateManager::load(&settings.reference_template_dir, discovery));

        let finder = ElementFinder::new(
            TextDetector::new(Arc::clone(&services.ocr)),
            PatternDetector::new(services.matcher, Arc::clone(&templates)),
        );
        let executor = VisualActionExecutor::new(
            Arc::clone(&services.capture),
            services.touch,
            Arc::new(finder),
            Arc::clone(&journal),
            settings,
        );

        Self {
            run_id: Uuid::new_v4().to_string(),
            capture: services.capture,
            executor,
            observer: ScreenObserver::new(services.ocr, settings.transport_timeout()),
            planner,
            templates,
            goals: GoalManager::new(Arc::clone(&journal)),
            predictions: PredictionManager::new(Arc::clone(&journal)),
            attention: AttentionManager::new(),
            db: None,
            journal,
            transport_timeout: settings.transport_timeout(),
            max_iterations: settings.max_iterations,
            stuck_threshold: settings.stuck_threshold.max(1),
        }
    }

    pub fn with_database(mut self, db: Database) -> Self {
        self.db = Some(db);
        self
    }

    pub fn with_vision(mut self, client: VisionClient) -> Self {
        self.observer = self.observer.with_vision(client);
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.executor = self.executor.with_metrics(metrics);
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn goals(&self) -> &GoalManager {
        &self.goals
    }

    pub fn goals_mut(&mut self) -> &mut GoalManager {
        &mut self.goals
    }

    pub fn predictions(&self) -> &PredictionManager {
        &self.predictions
    }

    pub fn templates(&self) -> &Arc<HybridTemplateManager> {
        &self.templates
    }

    pub fn metrics(&self) -> &MetricsCollector {
        self.executor.metrics()
    }

    /// Reloads runtime templates promoted in earlier runs from the catalog.
    pub async fn restore_templates(&self) -> Result<usize> {
        let Some(db) = &self.db else {
            return Ok(0);
        };

        let records = db
            .load_runtime_templates()
            .await
            .context("failed to load runtime template catalog")?;

        let mut restored: Vec<Template> = Vec::with_capacity(records.len());
        for record in records {
            match record.load_template() {
                Ok(template) => restored.push(template),
                Err(err) => log_warn!("skipping runtime template {}: {err:#}", record.name),
            }
        }

        let count = restored.len();
        self.templates.restore_runtime(restored);
        log_info!("restored {count} runtime templates");
        Ok(count)
    }

    pub async fn run(&mut self, cancel: CancellationToken) -> RunOutcome {
        let mut iterations = 0u32;
        let mut failures = 0u32;
        let mut consecutive_failures = 0u32;
        let mut last_result: Option<String> = None;

        self.journal.narrative(&format!(
            "Run {} started: {}",
            self.run_id,
            self.goals
                .main_goal()
                .map(|goal| goal.description.as_str())
                .unwrap_or("no goal")
        ));

        let Some(mut observation) = self.initial_observation(&cancel).await else {
            return self.finish(RunStatus::Cancelled, iterations, failures);
        };

        let status = loop {
            if cancel.is_cancelled() {
                break RunStatus::Cancelled;
            }
            if self.goals.is_main_goal_achieved() {
                break RunStatus::GoalAchieved;
            }
            if iterations >= self.max_iterations {
                break RunStatus::IterationLimit;
            }

            let goal_description = self.active_goal_description();
            let planned = {
                let context = PlanningContext {
                    goal: &goal_description,
                    observation: &observation,
                    iteration: iterations,
                    last_result: last_result.as_deref(),
                };
                tokio::select! {
                    planned = self.planner.next_step(&context) => planned,
                    _ = cancel.cancelled() => break RunStatus::Cancelled,
                }
            };

            let step = match planned {
                Ok(Some(step)) => step,
                Ok(None) => break RunStatus::PlannerFinished,
                Err(err) => {
                    iterations += 1;
                    log_error!("planner failed on iteration {iterations}: {err:#}");
                    failures += 1;
                    consecutive_failures += 1;
                    last_result = Some(format!("planner error: {err}"));
                    if consecutive_failures >= self.stuck_threshold {
                        self.block_current_goal();
                        break RunStatus::Stuck;
                    }
                    continue;
                }
            };

            iterations += 1;
            let Some(report) = self
                .perform_step(iterations, &goal_description, &observation, step, &cancel)
                .await
            else {
                break RunStatus::Cancelled;
            };

            if let Some(next) = report.observation {
                observation = next;
            }
            last_result = Some(report.message);

            if report.succeeded && report.verification != VerificationResult::Rejected {
                consecutive_failures = 0;
            } else {
                failures += 1;
                consecutive_failures += 1;
                if consecutive_failures >= self.stuck_threshold {
                    log_warn!("{consecutive_failures} consecutive failed steps, giving up");
                    self.block_current_goal();
                    break RunStatus::Stuck;
                }
            }
        };

        self.finish(status, iterations, failures)
    }

    fn finish(&self, status: RunStatus, iterations: u32, failures: u32) -> RunOutcome {
        let outcome = RunOutcome {
            status,
            iterations,
            failures,
        };
        self.journal.narrative(&format!(
            "Run {} finished: {:?} after {} iterations ({} failed)",
            self.run_id, outcome.status, outcome.iterations, outcome.failures
        ));
        outcome
    }

    /// One iteration after planning. `None` when cancelled mid-action.
    async fn perform_step(
        &mut self,
        iteration: u32,
        goal_description: &str,
        observation: &Observation,
        step: PlannedStep,
        cancel: &CancellationToken,
    ) -> Option<StepReport> {
        let started = Instant::now();
        let action_description = step.action.describe();

        let focus = self
            .attention
            .focus_for_action(goal_description, &step.action, &observation.state);
        log_info!(
            "step {iteration}: {action_description}, focusing on {}",
            focus
                .iter()
                .map(|area| area.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let prediction_id = self.predictions.generate_prediction(
            &action_description,
            &step.expected_state,
            step.expected_elements.clone(),
        );

        let current_goal_id = self.goals.current_goal().map(|goal| goal.id.clone());
        if let Some(id) = &current_goal_id {
            self.set_goal_state(id, GoalState::InProgress);
        }

        let result = tokio::select! {
            result = self.executor.execute(&step.action) => result,
            _ = cancel.cancelled() => return None,
        };

        let next_observation = match result.screenshot() {
            Some(screenshot) => tokio::select! {
                seen = self.observer.observe(screenshot) => Some(seen),
                _ = cancel.cancelled() => return None,
            },
            None => None,
        };
        let (observed_state, observed_elements) = match &next_observation {
            Some(seen) => (seen.state.clone(), seen.elements.clone()),
            None => (observation.state.clone(), Vec::new()),
        };

        let verification = self.predictions.verify_prediction(
            &prediction_id,
            &observed_state,
            observed_elements,
            result.is_success(),
        );

        if let Some(id) = &current_goal_id {
            if verification == VerificationResult::Confirmed && step.completes_goal {
                self.set_goal_state(id, GoalState::Achieved);
            }
        }

        if let Some(screenshot) = result.screenshot() {
            tokio::select! {
                _ = self.learn_templates(screenshot) => {}
                _ = cancel.cancelled() => return None,
            }
        }

        self.persist_step(iteration, &action_description, &result, verification, started)
            .await;

        Some(StepReport {
            succeeded: result.is_success(),
            verification,
            message: result.message().to_string(),
            observation: next_observation,
        })
    }

    /// `None` when cancelled before the first screen was seen. A failed or
    /// stalled capture starts the run from an empty observation.
    async fn initial_observation(&self, cancel: &CancellationToken) -> Option<Observation> {
        let capture = Arc::clone(&self.capture);
        let observed = async {
            match run_blocking("initial capture", self.transport_timeout, move || capture.capture()).await {
                Ok(screenshot) => self.observer.observe(&screenshot).await,
                Err(err) => {
                    log_warn!("starting without an initial observation: {err:#}");
                    Observation::default()
                }
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            observation = observed => Some(observation),
        }
    }

    async fn learn_templates(&self, screenshot: &Screenshot) {
        let templates = Arc::clone(&self.templates);
        let shot = screenshot.clone();
        let discovered = run_blocking("template discovery", self.transport_timeout, move || {
            Ok(templates.discover_templates(&shot))
        })
        .await;
        let promoted = match discovered {
            Ok(promoted) => promoted,
            Err(err) => {
                log_warn!("skipping template discovery: {err:#}");
                return;
            }
        };

        let Some(db) = &self.db else {
            return;
        };
        for template in promoted {
            let Some(record) = TemplateRecord::from_template(&template) else {
                continue;
            };
            if let Err(err) = db.insert_runtime_template(&record).await {
                log_warn!("failed to catalog runtime template {}: {err:#}", template.name);
            }
        }
    }

    async fn persist_step(
        &self,
        iteration: u32,
        action: &str,
        result: &ActionResult,
        verification: VerificationResult,
        started: Instant,
    ) {
        let Some(db) = &self.db else {
            return;
        };
        let record = StepRecord {
            id: Uuid::new_v4().to_string(),
            run_id: self.run_id.clone(),
            iteration,
            action: action.to_string(),
            success: result.is_success(),
            message: result.message().to_string(),
            prediction_result: verification.as_str().to_string(),
            goal_error: self.goals.goal_error(),
            total_ms: started.elapsed().as_millis() as u64,
            created_at: Utc::now(),
        };
        if let Err(err) = db.insert_step_record(&record).await {
            log_warn!("failed to persist step {iteration}: {err:#}");
        }
    }

    fn active_goal_description(&self) -> String {
        self.goals
            .current_goal()
            .or_else(|| self.goals.main_goal())
            .map(|goal| goal.description.clone())
            .unwrap_or_default()
    }

    fn block_current_goal(&mut self) {
        if let Some(id) = self.goals.current_goal().map(|goal| goal.id.clone()) {
            self.set_goal_state(&id, GoalState::Blocked);
        }
    }

    fn set_goal_state(&mut self, id: &str, state: GoalState) {
        if let Err(err) = self.goals.update_goal_state(id, state) {
            log_warn!("{err}");
        }
    }
}

struct StepReport {
    succeeded: bool,
    verification: VerificationResult,
    message: String,
    observation: Option<Observation>,
}
