//! Mobile UI agent that perceives the screen, acts through touch and checks
//! its own predictions against what it sees next.

pub mod agent;
pub mod attention;
pub mod bridge;
pub mod db;
pub mod detection;
pub mod executor;
pub mod goals;
pub mod journal;
pub mod llm;
pub mod metrics;
pub mod perception;
pub mod prediction;
pub mod settings;
pub mod templates;
pub mod utils;

pub use agent::{AgentController, AgentLoop, AgentServices, RunOutcome, RunStatus};
pub use executor::{ActionResult, AgentAction, VisualActionExecutor};
pub use settings::{AgentSettings, SettingsStore};
pub use utils::init_logging;
