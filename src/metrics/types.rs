use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timings of one executor action, from first capture to verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepMetrics {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub capture_ms: u64,
    pub detection_ms: u64,
    pub action_ms: u64,
    pub verification_ms: u64,
    pub total_ms: u64,
    pub success: bool,
    pub cpu_percent: f32,
    pub memory_mb: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub cpu_percent: f32,
    pub memory_mb: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub system: SystemMetrics,
    pub recent_steps: Vec<StepMetrics>,
    pub step_count: u64,
    pub failure_count: u64,
}
