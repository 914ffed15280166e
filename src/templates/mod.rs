pub mod discovery;
pub mod filter;
pub mod library;
pub mod signature;
pub mod template;

pub use discovery::{Appearance, ElementHistory, RuntimeTemplateDiscovery, StabilityGate};
pub use filter::SemanticIconFilter;
pub use library::HybridTemplateManager;
pub use template::{ElementType, Template, TemplateSource};
