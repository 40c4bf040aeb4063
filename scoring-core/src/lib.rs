//! TAMS Scoring Core
//!
//! Turns free-text maintenance-anomaly reports into three bounded risk
//! scores (reliability/integrity, availability, process safety) and a
//! derived criticality index.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     ScoringEngine                        │
//! │   (path chosen once at start-up: Model or Fallback)      │
//! ├──────────────────────────────┬───────────────────────────┤
//! │  FeatureEncoder              │  fallback::score          │
//! │  (CRC-32 hashed slots)       │  (keyword tiers + system  │
//! │           │                  │   adjustment)             │
//! │           ▼                  │                           │
//! │  ModelScorer ─► Regressor    │                           │
//! │  (round, clamp [1,5])  (ONNX)│                           │
//! └──────────────────────────────┴───────────────────────────┘
//! ```

pub mod config;
pub mod constants;
pub mod engine;
pub mod fallback;
pub mod features;
pub mod model;
pub mod types;

pub use config::EngineConfig;
pub use engine::{BatchOutcome, DegradeReason, EngineStatus, ScoreOutcome, ScoringEngine};
pub use features::{FeatureEncoder, FeatureLayout, FeatureVector};
pub use model::{InferenceError, ModelMetadata, ModelScorer, OnnxRegressor, Regressor};
pub use types::{AnomalyRecord, ScoreTuple, ScoringPath};
