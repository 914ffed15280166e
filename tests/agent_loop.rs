mod common;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use tokio_util::sync::CancellationToken;

use common::{fast_settings, login_app, FailingMatcher, FailingRegions, MemoryJournal};
use tapsense::agent::{Observation, PlannedStep, PlanningContext, ScriptedPlanner, StepPlanner};
use tapsense::db::Database;
use tapsense::goals::GoalState;
use tapsense::{AgentAction, AgentController, AgentLoop, RunStatus};

fn tap(label: &str) -> AgentAction {
    AgentAction::Tap { label: label.into() }
}

fn login_steps() -> Vec<PlannedStep> {
    vec![
        PlannedStep::new(tap("Sign In"), "Login").expecting(&["Email"]),
        PlannedStep::new(
            AgentAction::Type {
                text: "bob@example.com".into(),
                field: "Email".into(),
            },
            "Login",
        ),
        PlannedStep::new(tap("Log In"), "Home")
            .expecting(&["Item 1"])
            .completing_goal(),
    ]
}

struct HangingPlanner;

#[async_trait]
impl StepPlanner for HangingPlanner {
    async fn next_step(&self, _context: &PlanningContext<'_>) -> Result<Option<PlannedStep>> {
        std::future::pending().await
    }
}

/// Remembers what it was shown, then ends the run.
#[derive(Default)]
struct RecordingPlanner {
    seen: Mutex<Vec<Observation>>,
}

#[async_trait]
impl StepPlanner for RecordingPlanner {
    async fn next_step(&self, context: &PlanningContext<'_>) -> Result<Option<PlannedStep>> {
        self.seen.lock().unwrap().push(context.observation.clone());
        Ok(None)
    }
}

#[tokio::test]
async fn test_login_flow_reaches_goal() {
    let device = login_app();
    let journal = Arc::new(MemoryJournal::default());
    let mut agent = AgentLoop::new(
        device.services(),
        Arc::new(ScriptedPlanner::new(login_steps())),
        &fast_settings(),
        journal.clone(),
    );
    let goal = agent.goals_mut().add_goal("Log in", GoalState::Achieved, None, 1);

    let outcome = agent.run(CancellationToken::new()).await;

    assert_eq!(outcome.status, RunStatus::GoalAchieved);
    assert_eq!(outcome.iterations, 3);
    assert_eq!(outcome.failures, 0);
    assert_eq!(device.current_screen(), "Home");
    assert!(agent.goals().get_goal(&goal).unwrap().is_achieved());
    assert_eq!(agent.predictions().accuracy(), 1.0);
    assert!(journal.lines().iter().any(|l| l.contains("Goal achieved: Log in")));
}

#[tokio::test]
async fn test_repeated_misses_mark_the_goal_blocked() {
    let device = login_app();
    let steps = (0..5).map(|_| PlannedStep::new(tap("Missing"), "Nowhere"));
    let mut agent = AgentLoop::new(
        device.services(),
        Arc::new(ScriptedPlanner::new(steps)),
        &fast_settings(),
        Arc::new(MemoryJournal::default()),
    );
    let goal = agent.goals_mut().add_goal("Open settings", GoalState::Achieved, None, 1);

    let outcome = agent.run(CancellationToken::new()).await;

    assert_eq!(outcome.status, RunStatus::Stuck);
    assert_eq!(outcome.iterations, 3);
    assert_eq!(outcome.failures, 3);
    assert_eq!(agent.goals().get_goal(&goal).unwrap().current_state, GoalState::Blocked);
    assert!(device.gestures().is_empty());
}

#[tokio::test]
async fn test_planner_running_out_ends_the_run() {
    let device = login_app();
    let mut agent = AgentLoop::new(
        device.services(),
        Arc::new(ScriptedPlanner::new(vec![
            PlannedStep::new(tap("Sign In"), "Login")
        ])),
        &fast_settings(),
        Arc::new(MemoryJournal::default()),
    );
    agent.goals_mut().add_goal("Log in", GoalState::Achieved, None, 1);

    let outcome = agent.run(CancellationToken::new()).await;

    assert_eq!(outcome.status, RunStatus::PlannerFinished);
    assert_eq!(outcome.iterations, 1);
    assert!(!agent.goals().is_main_goal_achieved());
}

#[tokio::test]
async fn test_iteration_limit_bounds_the_run() {
    let device = login_app();
    let mut settings = fast_settings();
    settings.max_iterations = 2;
    let steps = (0..5).map(|_| PlannedStep::new(AgentAction::Wait { duration_ms: 1 }, "Welcome"));
    let mut agent = AgentLoop::new(
        device.services(),
        Arc::new(ScriptedPlanner::new(steps)),
        &settings,
        Arc::new(MemoryJournal::default()),
    );

    let outcome = agent.run(CancellationToken::new()).await;

    assert_eq!(outcome.status, RunStatus::IterationLimit);
    assert_eq!(outcome.iterations, 2);
    assert_eq!(outcome.failures, 0);
}

#[tokio::test]
async fn test_controller_stop_cancels_a_waiting_run() {
    let device = login_app();
    let agent = AgentLoop::new(
        device.services(),
        Arc::new(HangingPlanner),
        &fast_settings(),
        Arc::new(MemoryJournal::default()),
    );

    let mut controller = AgentController::new();
    controller.start(agent).unwrap();
    assert!(controller.is_running());

    let outcome = controller.stop().await.unwrap().unwrap();
    assert_eq!(outcome.status, RunStatus::Cancelled);
    assert_eq!(outcome.iterations, 0);
    assert!(!controller.is_running());
    assert!(controller.stop().await.unwrap().is_none());
}

#[tokio::test]
async fn test_controller_rejects_second_start_and_waits_for_completion() {
    let device = login_app();
    let settings = fast_settings();
    let mut controller = AgentController::new();

    let mut first = AgentLoop::new(
        device.services(),
        Arc::new(HangingPlanner),
        &settings,
        Arc::new(MemoryJournal::default()),
    );
    first.goals_mut().add_goal("Log in", GoalState::Achieved, None, 1);
    controller.start(first).unwrap();

    let second = AgentLoop::new(
        device.services(),
        Arc::new(ScriptedPlanner::new(login_steps())),
        &settings,
        Arc::new(MemoryJournal::default()),
    );
    assert!(controller.start(second).is_err());
    controller.stop().await.unwrap();

    let mut third = AgentLoop::new(
        device.services(),
        Arc::new(ScriptedPlanner::new(login_steps())),
        &settings,
        Arc::new(MemoryJournal::default()),
    );
    third.goals_mut().add_goal("Log in", GoalState::Achieved, None, 1);
    controller.start(third).unwrap();
    let outcome = controller.wait().await.unwrap().unwrap();
    assert_eq!(outcome.status, RunStatus::GoalAchieved);
}

#[tokio::test]
async fn test_steps_are_persisted_per_run() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(dir.path().join("tapsense.db")).unwrap();
    let device = login_app();
    let mut agent = AgentLoop::new(
        device.services(),
        Arc::new(ScriptedPlanner::new(login_steps())),
        &fast_settings(),
        Arc::new(MemoryJournal::default()),
    )
    .with_database(db.clone());
    agent.goals_mut().add_goal("Log in", GoalState::Achieved, None, 1);

    let outcome = agent.run(CancellationToken::new()).await;

    let records = db.get_step_records(agent.run_id()).await.unwrap();
    assert_eq!(records.len() as u32, outcome.iterations);
    assert_eq!(records[0].action, "Tap 'Sign In'");
    assert_eq!(records[0].prediction_result, "CONFIRMED");
    assert!(records.iter().all(|r| r.success));
    assert_eq!(records.last().unwrap().goal_error, 0.0);
}

#[tokio::test]
async fn test_stalled_capture_does_not_delay_cancellation() {
    let device = login_app();
    device.slow_capture(Duration::from_secs(3));
    let mut agent = AgentLoop::new(
        device.services(),
        Arc::new(ScriptedPlanner::new(login_steps())),
        &fast_settings(),
        Arc::new(MemoryJournal::default()),
    );
    let cancel = CancellationToken::new();
    cancel.cancel();

    let started = Instant::now();
    let outcome = agent.run(cancel).await;

    assert_eq!(outcome.status, RunStatus::Cancelled);
    assert_eq!(outcome.iterations, 0);
    assert!(started.elapsed() < Duration::from_millis(500), "{:?}", started.elapsed());
    assert!(device.gestures().is_empty());
}

#[tokio::test]
async fn test_stalled_capture_times_out_into_an_empty_observation() {
    let device = login_app();
    device.slow_capture(Duration::from_millis(2500));
    let planner = Arc::new(RecordingPlanner::default());
    let mut agent = AgentLoop::new(
        device.services(),
        planner.clone(),
        &fast_settings(),
        Arc::new(MemoryJournal::default()),
    );

    let started = Instant::now();
    let outcome = agent.run(CancellationToken::new()).await;

    assert_eq!(outcome.status, RunStatus::PlannerFinished);
    assert!(started.elapsed() < Duration::from_millis(2000), "{:?}", started.elapsed());
    assert_eq!(*planner.seen.lock().unwrap(), vec![Observation::default()]);
}

#[tokio::test]
async fn test_ocr_failure_fails_the_step_but_not_the_run() {
    let device = login_app();
    device.fail_ocr();
    let mut agent = AgentLoop::new(
        device.services(),
        Arc::new(ScriptedPlanner::new(vec![PlannedStep::new(tap("Sign In"), "Login")])),
        &fast_settings(),
        Arc::new(MemoryJournal::default()),
    );

    let outcome = agent.run(CancellationToken::new()).await;

    assert_eq!(outcome.status, RunStatus::PlannerFinished);
    assert_eq!(outcome.iterations, 1);
    assert_eq!(outcome.failures, 1);
    assert!(device.taps().is_empty());
}

#[tokio::test]
async fn test_failing_matcher_and_detector_fall_back_to_text() {
    let templates = tempfile::tempdir().unwrap();
    let pixel = RgbaImage::from_pixel(24, 24, Rgba([10, 200, 10, 255]));
    pixel.save(templates.path().join("button_sign_in.png")).unwrap();
    pixel.save(templates.path().join("button_log_in.png")).unwrap();

    let mut settings = fast_settings();
    settings.reference_template_dir = templates.path().to_path_buf();
    let device = login_app();
    let mut agent = AgentLoop::new(
        device.services_with(Arc::new(FailingMatcher), Arc::new(FailingRegions)),
        Arc::new(ScriptedPlanner::new(login_steps())),
        &settings,
        Arc::new(MemoryJournal::default()),
    );
    agent.goals_mut().add_goal("Log in", GoalState::Achieved, None, 1);
    assert_eq!(agent.templates().get_templates().len(), 2);

    let outcome = agent.run(CancellationToken::new()).await;

    assert_eq!(outcome.status, RunStatus::GoalAchieved);
    assert_eq!(outcome.failures, 0);
    assert_eq!(device.current_screen(), "Home");
    assert_eq!(agent.templates().runtime_count(), 0);
}
