pub mod result;
pub mod visual;

pub use result::{ActionResult, AgentAction};
pub use visual::VisualActionExecutor;
