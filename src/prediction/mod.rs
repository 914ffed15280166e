pub mod manager;
pub mod model;

pub use manager::PredictionManager;
pub use model::{Prediction, VerificationResult};
