use anyhow::{bail, Context, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::loop_worker::{AgentLoop, RunOutcome};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Runs one agent loop at a time on a tokio task.
#[derive(Default)]
pub struct AgentController {
    handle: Option<JoinHandle<RunOutcome>>,
    cancel_token: Option<CancellationToken>,
}

impl AgentController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, mut agent: AgentLoop) -> Result<()> {
        if self.is_running() {
            bail!("agent run already active");
        }

        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();

        log_info!("starting agent run {}", agent.run_id());
        let handle = tokio::spawn(async move { agent.run(token_clone).await });

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Cancels the run and waits for it to wind down.
    pub async fn stop(&mut self) -> Result<Option<RunOutcome>> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        self.join().await
    }

    /// Waits for the run to end on its own.
    pub async fn wait(&mut self) -> Result<Option<RunOutcome>> {
        let outcome = self.join().await;
        self.cancel_token = None;
        outcome
    }

    async fn join(&mut self) -> Result<Option<RunOutcome>> {
        match self.handle.take() {
            Some(handle) => handle
                .await
                .map(Some)
                .context("agent loop task failed to join"),
            None => Ok(None),
        }
    }
}
