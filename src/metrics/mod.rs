mod types;

pub use types::{MetricsSnapshot, StepMetrics, SystemMetrics};

use std::collections::VecDeque;
use std::sync::Arc;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::sync::Mutex;

const MAX_RECENT_STEPS: usize = 20;

/// Rolling record of executor steps plus this process's CPU and memory.
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsState>>,
}

struct MetricsState {
    recent_steps: VecDeque<StepMetrics>,
    step_count: u64,
    failure_count: u64,
    system: System,
    pid: Pid,
}

impl MetricsState {
    fn sample(&mut self) -> SystemMetrics {
        let pid = self.pid;
        self.system.refresh_processes(ProcessesToUpdate::Some(&[pid]));
        match self.system.process(pid) {
            Some(process) => SystemMetrics {
                cpu_percent: process.cpu_usage(),
                memory_mb: process.memory() as f64 / 1024.0 / 1024.0,
            },
            None => SystemMetrics::default(),
        }
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        let mut system = System::new();
        let pid = Pid::from_u32(std::process::id());

        // CPU usage is a delta between refreshes; take the baseline now.
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]));

        Self {
            inner: Arc::new(Mutex::new(MetricsState {
                recent_steps: VecDeque::with_capacity(MAX_RECENT_STEPS),
                step_count: 0,
                failure_count: 0,
                system,
                pid,
            })),
        }
    }

    pub async fn sample_system_metrics(&self) -> SystemMetrics {
        self.inner.lock().await.sample()
    }

    pub async fn record_step(&self, metrics: StepMetrics) {
        let mut state = self.inner.lock().await;

        state.step_count += 1;
        if !metrics.success {
            state.failure_count += 1;
        }

        state.recent_steps.push_back(metrics);
        if state.recent_steps.len() > MAX_RECENT_STEPS {
            state.recent_steps.pop_front();
        }
    }

    pub async fn get_snapshot(&self) -> MetricsSnapshot {
        let mut state = self.inner.lock().await;
        let system = state.sample();

        MetricsSnapshot {
            system,
            recent_steps: state.recent_steps.iter().cloned().collect(),
            step_count: state.step_count,
            failure_count: state.failure_count,
        }
    }

    pub async fn reset(&self) {
        let mut state = self.inner.lock().await;
        state.recent_steps.clear();
        state.step_count = 0;
        state.failure_count = 0;
        state.sample();
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
