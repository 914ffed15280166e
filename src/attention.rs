use serde::{Deserialize, Serialize};

use crate::executor::AgentAction;

/// A category of screen content worth perceiving next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusArea {
    pub name: String,
    pub priority: u8,
    pub element_types: Vec<String>,
}

impl FocusArea {
    fn new(name: &str, priority: u8, element_types: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            priority,
            element_types: element_types.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// What an action does, as far as attention cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Type,
    Tap,
    Wait,
    Other,
}

impl ActionKind {
    pub fn of(action: &AgentAction) -> Self {
        match action {
            AgentAction::Type { .. } => ActionKind::Type,
            AgentAction::Tap { .. } | AgentAction::TapIcon { .. } => ActionKind::Tap,
            AgentAction::Wait { .. } => ActionKind::Wait,
            AgentAction::Swipe { .. } => ActionKind::Other,
        }
    }

    /// Keyword match on a free-form description. Quoted labels are skipped,
    /// so `Tap 'Prototype'` is a tap.
    pub fn from_description(description: &str) -> Self {
        let verbs = description
            .split('\'')
            .step_by(2)
            .collect::<String>()
            .to_lowercase();

        if verbs.contains("type") {
            ActionKind::Type
        } else if verbs.contains("tap") {
            ActionKind::Tap
        } else if verbs.contains("wait") {
            ActionKind::Wait
        } else {
            ActionKind::Other
        }
    }
}

/// Decides where to look from the goal, the next action and the screen.
#[derive(Debug, Default, Clone, Copy)]
pub struct AttentionManager;

impl AttentionManager {
    pub fn new() -> Self {
        Self
    }

    /// Focus areas ordered by descending priority. Error detection is
    /// always present.
    pub fn compute_focus(&self, current_goal: &str, next_action: &str, screen_state: &str) -> Vec<FocusArea> {
        let areas = focus_areas(ActionKind::from_description(next_action));
        log::debug!(
            "focus for goal '{current_goal}' / action '{next_action}' on '{screen_state}': {:?}",
            areas.iter().map(|a| a.name.as_str()).collect::<Vec<_>>()
        );
        areas
    }

    /// Same as [`compute_focus`](Self::compute_focus), keyed on the action
    /// variant rather than its description.
    pub fn focus_for_action(&self, current_goal: &str, action: &AgentAction, screen_state: &str) -> Vec<FocusArea> {
        let areas = focus_areas(ActionKind::of(action));
        log::debug!(
            "focus for goal '{current_goal}' / {action:?} on '{screen_state}': {:?}",
            areas.iter().map(|a| a.name.as_str()).collect::<Vec<_>>()
        );
        areas
    }
}

fn focus_areas(kind: ActionKind) -> Vec<FocusArea> {
    let mut areas = match kind {
        ActionKind::Type => vec![
            FocusArea::new("input_fields", 10, &["text_field", "cursor", "keyboard"]),
            FocusArea::new("error_zones", 8, &["validation_message", "field_error"]),
        ],
        ActionKind::Tap => vec![
            FocusArea::new("interactive_elements", 10, &["button", "link", "icon"]),
            FocusArea::new("blocking_dialogs", 9, &["dialog", "popup", "overlay"]),
        ],
        ActionKind::Wait => vec![
            FocusArea::new("loading_indicators", 10, &["spinner", "progress_bar"]),
            FocusArea::new("state_transitions", 8, &["screen_title", "navigation"]),
        ],
        ActionKind::Other => vec![FocusArea::new("general_observation", 5, &["any"])],
    };

    areas.push(FocusArea::new("error_detection", 9, &["error_message", "toast", "alert"]));
    areas.sort_by(|a, b| b.priority.cmp(&a.priority));
    areas
}
