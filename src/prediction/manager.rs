use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::journal::{JournalEntry, RunJournal};

use super::model::{Prediction, VerificationResult};

/// Tracks open predictions and closes each exactly once.
pub struct PredictionManager {
    active: HashMap<String, Prediction>,
    history: Vec<Prediction>,
    journal: Arc<dyn RunJournal>,
}

impl PredictionManager {
    pub fn new(journal: Arc<dyn RunJournal>) -> Self {
        Self {
            active: HashMap::new(),
            history: Vec::new(),
            journal,
        }
    }

    pub fn generate_prediction(
        &mut self,
        action: &str,
        expected_state: &str,
        expected_elements: Vec<String>,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        let prediction = Prediction::new(id.clone(), action, expected_state, expected_elements);

        self.journal.narrative(&format!(
            "Before '{}' I expect to see '{}'",
            prediction.action, prediction.expected_state
        ));
        self.active.insert(id.clone(), prediction);
        id
    }

    /// Scores the observation and moves the prediction into history.
    /// Unknown or already verified ids are rejected.
    pub fn verify_prediction(
        &mut self,
        id: &str,
        observed_state: &str,
        observed_elements: Vec<String>,
        task_succeeded: bool,
    ) -> VerificationResult {
        let Some(mut prediction) = self.active.remove(id) else {
            log::warn!("verification requested for unknown prediction {id}");
            return VerificationResult::Rejected;
        };

        let result = prediction.evaluate(observed_state, &observed_elements, task_succeeded);
        prediction.verified = true;
        prediction.verification_result = result;
        prediction.observed_state = Some(observed_state.to_string());
        prediction.observed_elements = observed_elements;

        self.journal.record(JournalEntry::Prediction {
            prediction_id: prediction.id.clone(),
            action: prediction.action.clone(),
            result: result.as_str().to_string(),
        });
        self.journal.narrative(&format!(
            "After '{}' I saw '{}': {}",
            prediction.action,
            observed_state,
            result.as_str()
        ));

        self.history.push(prediction);
        result
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn get_active(&self, id: &str) -> Option<&Prediction> {
        self.active.get(id)
    }

    pub fn history(&self) -> &[Prediction] {
        &self.history
    }

    /// Share of verified predictions that were confirmed.
    pub fn accuracy(&self) -> f64 {
        if self.history.is_empty() {
            return 0.0;
        }
        let confirmed = self
            .history
            .iter()
            .filter(|p| p.verification_result == VerificationResult::Confirmed)
            .count();
        confirmed as f64 / self.history.len() as f64
    }
}
