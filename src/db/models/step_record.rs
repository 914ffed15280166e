use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub id: String,
    pub run_id: String,
    pub iteration: u32,
    pub action: String,
    pub success: bool,
    pub message: String,
    pub prediction_result: String,
    pub goal_error: f64,
    pub total_ms: u64,
    pub created_at: DateTime<Utc>,
}
