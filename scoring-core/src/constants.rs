//! Central Configuration Constants
//!
//! Single source of truth for scoring defaults.
//! Environment variables override the artifact location and feature layout.

/// Default location of the trained multi-output regression artifact
pub const DEFAULT_MODEL_PATH: &str = "ml_models/tams-prediction-model.onnx";

/// Default feature layout name (see `FeatureLayout`)
pub const DEFAULT_FEATURE_LAYOUT: &str = "category_text";

/// Crate version
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Get model artifact path from environment or use default
pub fn get_model_path() -> String {
    std::env::var("TAMS_MODEL_PATH")
        .unwrap_or_else(|_| DEFAULT_MODEL_PATH.to_string())
}

/// Get feature layout name from environment or use default
pub fn get_feature_layout() -> String {
    std::env::var("TAMS_FEATURE_LAYOUT")
        .unwrap_or_else(|_| DEFAULT_FEATURE_LAYOUT.to_string())
}
