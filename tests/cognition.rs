mod common;

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use common::MemoryJournal;
use tapsense::attention::AttentionManager;
use tapsense::goals::{GoalError, GoalManager, GoalState};
use tapsense::journal::JournalEntry;
use tapsense::prediction::{Prediction, PredictionManager, VerificationResult};

const STATES: [GoalState; 5] = [
    GoalState::Unknown,
    GoalState::InProgress,
    GoalState::Achieved,
    GoalState::Failed,
    GoalState::Blocked,
];

#[test]
fn test_goal_error_is_zero_exactly_when_state_matches_reference() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut goals = GoalManager::new(Arc::new(MemoryJournal::default()));
    let id = goals.add_goal("Reach the settings screen", GoalState::Achieved, None, 1);

    for _ in 0..200 {
        let state = *STATES.choose(&mut rng).unwrap();
        goals.update_goal_state(&id, state).unwrap();
        let goal = goals.get_goal(&id).unwrap();
        let expected = if state == GoalState::Achieved { 0.0 } else { 1.0 };
        assert_eq!(goal.error(), expected);
        assert!(goal.error() == 0.0 || goal.error() == 1.0);
        if state == GoalState::Achieved {
            break;
        }
    }
}

#[test]
fn test_current_goal_only_moves_when_it_is_achieved() {
    let mut rng = StdRng::seed_from_u64(9);
    let mut goals = GoalManager::new(Arc::new(MemoryJournal::default()));
    let main = goals.add_goal("Log in", GoalState::Achieved, None, 1);
    let ids: Vec<String> = (0..4)
        .map(|i| goals.add_goal(&format!("step {i}"), GoalState::Achieved, Some(&main), rng.gen_range(0..5)))
        .collect();

    for _ in 0..100 {
        let target = ids.choose(&mut rng).unwrap();
        let state = [GoalState::InProgress, GoalState::Failed, GoalState::Blocked]
            .choose(&mut rng)
            .copied()
            .unwrap();
        goals.update_goal_state(target, state).unwrap();
        assert_eq!(goals.current_goal().unwrap().id, main);
    }
}

#[test]
fn test_achieving_current_goal_picks_highest_priority_remaining() {
    let mut goals = GoalManager::new(Arc::new(MemoryJournal::default()));
    let main = goals.add_goal("Send a message", GoalState::Achieved, None, 0);
    let low = goals.add_goal("Open chat", GoalState::Achieved, Some(&main), 1);
    let high = goals.add_goal("Unlock", GoalState::Achieved, Some(&main), 5);
    let tie = goals.add_goal("Dismiss banner", GoalState::Achieved, Some(&main), 5);

    goals.update_goal_state(&main, GoalState::Achieved).unwrap();
    assert_eq!(goals.current_goal().unwrap().id, high);
    assert!(goals.is_main_goal_achieved());

    goals.update_goal_state(&high, GoalState::Achieved).unwrap();
    assert_eq!(goals.current_goal().unwrap().id, tie);
    goals.update_goal_state(&tie, GoalState::Achieved).unwrap();
    assert_eq!(goals.current_goal().unwrap().id, low);
    goals.update_goal_state(&low, GoalState::Achieved).unwrap();
    assert!(goals.current_goal().is_none());
    assert_eq!(goals.goal_error(), 0.0);
}

#[test]
fn test_unknown_goal_is_an_error_and_changes_are_journaled() {
    let journal = Arc::new(MemoryJournal::default());
    let mut goals = GoalManager::new(journal.clone());
    let id = goals.add_goal("Log in", GoalState::Achieved, None, 1);

    assert!(matches!(
        goals.update_goal_state("missing", GoalState::Achieved),
        Err(GoalError::UnknownGoal(_))
    ));

    goals.update_goal_state(&id, GoalState::InProgress).unwrap();
    goals.update_goal_state(&id, GoalState::InProgress).unwrap();
    let changes = journal
        .entries()
        .into_iter()
        .filter(|e| matches!(e, JournalEntry::StateChange { .. }))
        .count();
    assert_eq!(changes, 1);
}

#[test]
fn test_prediction_matches_its_own_expectation() {
    let mut rng = StdRng::seed_from_u64(3);
    let words = ["Login", "Home", "Sign In", "Settings", "Profile", "Item 5", ""];

    for _ in 0..300 {
        let state = words.choose(&mut rng).unwrap().to_string();
        let elements: Vec<String> = (0..rng.gen_range(0..4))
            .map(|_| words.choose(&mut rng).unwrap().to_string())
            .filter(|w| !w.is_empty())
            .collect();
        let prediction = Prediction::new("p".into(), "Tap 'X'", state.clone(), elements.clone());

        assert!(prediction.matches(&state, &elements, false));
        assert!(prediction.matches(&state, &elements, true));
    }
}

#[test]
fn test_login_screen_confirms_sign_in_prediction() {
    let journal = Arc::new(MemoryJournal::default());
    let mut predictions = PredictionManager::new(journal.clone());
    let id = predictions.generate_prediction("Tap 'Sign In'", "Login", vec!["Sign In".into()]);
    assert_eq!(predictions.active_count(), 1);

    let result = predictions.verify_prediction(&id, "Login Screen", vec!["Sign In Button".into()], false);

    assert_eq!(result, VerificationResult::Confirmed);
    assert_eq!(predictions.active_count(), 0);
    assert_eq!(predictions.history().len(), 1);
    assert!(predictions.history()[0].verified);
    assert!(journal.lines().iter().any(|l| l.contains("CONFIRMED")));
}

#[test]
fn test_mismatched_observation_is_partial_and_replays_are_rejected() {
    let mut predictions = PredictionManager::new(Arc::new(MemoryJournal::default()));
    let id = predictions.generate_prediction("Tap 'Log In'", "Home", vec!["Inbox".into()]);

    let first = predictions.verify_prediction(&id, "Login", vec!["Password".into()], false);
    assert_eq!(first, VerificationResult::Partial);

    let replay = predictions.verify_prediction(&id, "Home", vec!["Inbox".into()], true);
    assert_eq!(replay, VerificationResult::Rejected);
    assert!(predictions.accuracy() < 1.0);
}

#[test]
fn test_attention_always_watches_for_errors() {
    let attention = AttentionManager::new();
    for action in ["Tap 'OK'", "Type 'x' into 'Email'", "Wait 500ms", "Swipe from 'A' to 'B'"] {
        let areas = attention.compute_focus("goal", action, "Home");
        assert!(areas.iter().any(|a| a.name == "error_detection"), "{action}");
        assert!(areas.windows(2).all(|w| w[0].priority >= w[1].priority));
    }
}
