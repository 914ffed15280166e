use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::journal::{JournalEntry, RunJournal};

use super::state::{Goal, GoalState};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GoalError {
    #[error("unknown goal {0}")]
    UnknownGoal(String),
}

/// Sole owner of goal state. Other components read goals or report
/// outcomes through this API.
pub struct GoalManager {
    goals: Vec<Goal>,
    current_goal_id: Option<String>,
    journal: Arc<dyn RunJournal>,
}

impl GoalManager {
    pub fn new(journal: Arc<dyn RunJournal>) -> Self {
        Self {
            goals: Vec::new(),
            current_goal_id: None,
            journal,
        }
    }

    /// Registers a goal. The first goal added becomes the current one.
    pub fn add_goal(
        &mut self,
        description: &str,
        reference_state: GoalState,
        parent_goal_id: Option<&str>,
        priority: i32,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        let mut goal = Goal::new(
            id.clone(),
            description,
            parent_goal_id.map(str::to_string),
            priority,
        );
        goal.reference_state = reference_state;
        self.goals.push(goal);

        if self.current_goal_id.is_none() {
            self.current_goal_id = Some(id.clone());
        }
        id
    }

    pub fn update_goal_state(&mut self, id: &str, new_state: GoalState) -> Result<(), GoalError> {
        let goal = self
            .goals
            .iter_mut()
            .find(|goal| goal.id == id)
            .ok_or_else(|| GoalError::UnknownGoal(id.to_string()))?;

        let previous = goal.current_state;
        goal.current_state = new_state;
        if previous != new_state {
            self.journal.record(JournalEntry::StateChange {
                subject: goal.description.clone(),
                from: previous.as_str().to_string(),
                to: new_state.as_str().to_string(),
            });
        }

        let is_current = self.current_goal_id.as_deref() == Some(id);
        if is_current && new_state == GoalState::Achieved {
            self.journal
                .narrative(&format!("Goal achieved: {}", goal.description));
            self.current_goal_id = self.next_unachieved_goal();
        }
        Ok(())
    }

    pub fn current_goal(&self) -> Option<&Goal> {
        let id = self.current_goal_id.as_deref()?;
        self.get_goal(id)
    }

    /// Error of the current goal; 0.0 once nothing is left to pursue.
    pub fn goal_error(&self) -> f64 {
        self.current_goal().map(Goal::error).unwrap_or(0.0)
    }

    pub fn is_main_goal_achieved(&self) -> bool {
        self.main_goal().is_some_and(Goal::is_achieved)
    }

    pub fn main_goal(&self) -> Option<&Goal> {
        self.goals.iter().find(|goal| goal.is_root())
    }

    pub fn get_goal(&self, id: &str) -> Option<&Goal> {
        self.goals.iter().find(|goal| goal.id == id)
    }

    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    fn next_unachieved_goal(&self) -> Option<String> {
        self.goals
            .iter()
            .filter(|goal| !goal.is_achieved())
            .fold(None::<&Goal>, |best, goal| match best {
                Some(current) if current.priority >= goal.priority => Some(current),
                _ => Some(goal),
            })
            .map(|goal| goal.id.clone())
    }
}
