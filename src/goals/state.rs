use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GoalState {
    #[default]
    Unknown,
    InProgress,
    Achieved,
    Failed,
    Blocked,
}

impl GoalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalState::Unknown => "UNKNOWN",
            GoalState::InProgress => "IN_PROGRESS",
            GoalState::Achieved => "ACHIEVED",
            GoalState::Failed => "FAILED",
            GoalState::Blocked => "BLOCKED",
        }
    }
}

/// One reference signal of the controller: where the agent wants the app
/// to be, and where it currently perceives it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub description: String,
    pub reference_state: GoalState,
    pub current_state: GoalState,
    /// Stored for bookkeeping; child errors are not rolled up into parents.
    pub parent_goal_id: Option<String>,
    pub priority: i32,
}

impl Goal {
    pub fn new(
        id: String,
        description: impl Into<String>,
        parent_goal_id: Option<String>,
        priority: i32,
    ) -> Self {
        Self {
            id,
            description: description.into(),
            reference_state: GoalState::Achieved,
            current_state: GoalState::Unknown,
            parent_goal_id,
            priority,
        }
    }

    /// 0.0 when perception agrees with the reference, 1.0 otherwise.
    pub fn error(&self) -> f64 {
        if self.current_state == self.reference_state {
            0.0
        } else {
            1.0
        }
    }

    pub fn is_achieved(&self) -> bool {
        self.current_state == GoalState::Achieved
    }

    pub fn is_root(&self) -> bool {
        self.parent_goal_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_unknown() {
        assert_eq!(GoalState::default(), GoalState::Unknown);
        assert_eq!(serde_json::to_string(&GoalState::InProgress).unwrap(), "\"IN_PROGRESS\"");
    }
}
