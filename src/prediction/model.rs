use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationResult {
    Confirmed,
    Partial,
    Rejected,
    Pending,
}

impl VerificationResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationResult::Confirmed => "CONFIRMED",
            VerificationResult::Partial => "PARTIAL",
            VerificationResult::Rejected => "REJECTED",
            VerificationResult::Pending => "PENDING",
        }
    }
}

/// What the agent expects to see after an action, stated before acting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub action: String,
    pub expected_state: String,
    pub expected_elements: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub verified: bool,
    pub verification_result: VerificationResult,
    pub observed_state: Option<String>,
    pub observed_elements: Vec<String>,
}

impl Prediction {
    pub fn new(
        id: String,
        action: impl Into<String>,
        expected_state: impl Into<String>,
        expected_elements: Vec<String>,
    ) -> Self {
        Self {
            id,
            action: action.into(),
            expected_state: expected_state.into(),
            expected_elements,
            created_at: Utc::now(),
            verified: false,
            verification_result: VerificationResult::Pending,
            observed_state: None,
            observed_elements: Vec::new(),
        }
    }

    /// Fuzzy agreement between the expectation and an observation.
    ///
    /// Without task success both the state and the elements must agree;
    /// with it, either one is enough.
    pub fn matches(&self, observed_state: &str, observed_elements: &[String], task_succeeded: bool) -> bool {
        let state_matches = state_matches(&self.expected_state, observed_state);
        let elements_match = elements_match(&self.expected_elements, observed_elements);

        if task_succeeded {
            state_matches || elements_match
        } else {
            state_matches && elements_match
        }
    }

    /// Classifies an observation against this prediction.
    pub fn evaluate(
        &self,
        observed_state: &str,
        observed_elements: &[String],
        task_succeeded: bool,
    ) -> VerificationResult {
        if self.matches(observed_state, observed_elements, task_succeeded) {
            return VerificationResult::Confirmed;
        }

        let observed_present = !observed_state.trim().is_empty();
        let both_states_present = !self.expected_state.trim().is_empty() && observed_present;
        if (observed_present && task_succeeded) || both_states_present {
            VerificationResult::Partial
        } else {
            VerificationResult::Rejected
        }
    }
}

/// Either side empty, or one contains the other.
fn state_matches(expected: &str, observed: &str) -> bool {
    let expected = expected.trim().to_lowercase();
    let observed = observed.trim().to_lowercase();
    expected.is_empty()
        || observed.is_empty()
        || observed.contains(&expected)
        || expected.contains(&observed)
}

/// No expected elements, or any expected one overlaps any observed one.
fn elements_match(expected: &[String], observed: &[String]) -> bool {
    if expected.is_empty() {
        return true;
    }
    expected.iter().any(|e| {
        let e = e.to_lowercase();
        observed.iter().any(|o| {
            let o = o.to_lowercase();
            o.contains(&e) || e.contains(&o)
        })
    })
}
