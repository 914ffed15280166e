pub mod manager;
pub mod state;

pub use manager::{GoalError, GoalManager};
pub use state::{Goal, GoalState};
