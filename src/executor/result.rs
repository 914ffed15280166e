use serde::{Deserialize, Serialize};

use crate::bridge::Screenshot;
use crate::perception::Point;

/// Outcome of one executor action. Expected misses ("element not found")
/// and transport errors both end up as `Failure`.
#[derive(Debug, Clone)]
pub enum ActionResult {
    Success {
        message: String,
        screenshot: Screenshot,
        coordinates: Option<Point>,
    },
    Failure {
        message: String,
        screenshot: Option<Screenshot>,
    },
}

impl ActionResult {
    pub fn failure(message: impl Into<String>, screenshot: Option<Screenshot>) -> Self {
        ActionResult::Failure {
            message: message.into(),
            screenshot,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ActionResult::Success { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            ActionResult::Success { message, .. } | ActionResult::Failure { message, .. } => message,
        }
    }

    pub fn screenshot(&self) -> Option<&Screenshot> {
        match self {
            ActionResult::Success { screenshot, .. } => Some(screenshot),
            ActionResult::Failure { screenshot, .. } => screenshot.as_ref(),
        }
    }

    pub fn coordinates(&self) -> Option<Point> {
        match self {
            ActionResult::Success { coordinates, .. } => *coordinates,
            ActionResult::Failure { .. } => None,
        }
    }
}

/// What the planner asks the executor to do next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentAction {
    Tap { label: String },
    TapIcon { name: String },
    Type { text: String, field: String },
    Swipe { from: String, to: String },
    Wait { duration_ms: u64 },
}

impl AgentAction {
    /// Short imperative description for logs and the journal.
    pub fn describe(&self) -> String {
        match self {
            AgentAction::Tap { label } => format!("Tap '{label}'"),
            AgentAction::TapIcon { name } => format!("Tap icon '{name}'"),
            AgentAction::Type { text, field } => format!("Type '{text}' into '{field}'"),
            AgentAction::Swipe { from, to } => format!("Swipe from '{from}' to '{to}'"),
            AgentAction::Wait { duration_ms } => format!("Wait {duration_ms}ms"),
        }
    }
}
