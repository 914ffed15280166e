pub mod element;
pub mod finder;
pub mod fusion;
pub mod pattern;
pub mod text;

pub use element::{DetectionMethod, ElementLocation, ElementMatch};
pub use finder::ElementFinder;
pub use fusion::{group_matches, integrate_matches, MatchGroup};
pub use pattern::PatternDetector;
pub use text::{TextDetector, TextTarget};
