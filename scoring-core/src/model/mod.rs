//! Model Module - Trained Artifact Scoring
//!
//! Separates inference back-ends from post-processing so the engine can
//! swap or stub the artifact.

pub mod inference;
pub mod scorer;

// Re-export common types
pub use inference::{InferenceError, ModelMetadata, OnnxRegressor, Regressor};
pub use scorer::ModelScorer;
