pub mod controller;
pub mod loop_worker;
pub mod observer;
pub mod planner;

pub use controller::AgentController;
pub use loop_worker::{AgentLoop, AgentServices, RunOutcome, RunStatus};
pub use observer::{Observation, ScreenObserver};
pub use planner::{LlmPlanner, PlannedStep, PlanningContext, ScriptedPlanner, StepPlanner};
