//! Inference Engine - ONNX Runtime Integration
//!
//! Load and run the trained multi-output regression artifact.
//! Kept behind the `Regressor` trait so the engine never depends on the
//! runtime directly.

use std::path::Path;

use chrono::{DateTime, Utc};
use ndarray::{Array2, ArrayView2};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::features::layout::{compute_layout_hash, LayoutMismatchError, ENCODING_VERSION};
use crate::features::FeatureLayout;

/// Custom ONNX metadata keys an exporter may stamp on the artifact
pub const ENCODING_VERSION_KEY: &str = "tams_encoding_version";
pub const LAYOUT_HASH_KEY: &str = "tams_layout_hash";

// ============================================================================
// ERROR HANDLING
// ============================================================================

/// Anything that can go wrong between loading an artifact and reading its
/// predictions. Never surfaced to scoring callers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Failed to load model: {0}")]
    Load(String),

    #[error("Shape mismatch: {0}")]
    Shape(String),

    #[error("Inference failed: {0}")]
    Runtime(String),

    #[error("Unexpected model output: {0}")]
    Output(String),

    #[error("Model emitted non-finite value {0}")]
    NonFinite(f32),

    #[error(transparent)]
    Layout(#[from] LayoutMismatchError),
}

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Model metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_path: String,
    /// SHA-256 of the artifact bytes
    pub sha256: String,
    pub feature_layout: FeatureLayout,
    pub feature_width: usize,
    /// Encoding the artifact was trained against
    pub encoding_version: u8,
    pub layout_hash: u32,
    /// Last input dimension declared by the artifact, if fixed
    pub declared_width: Option<usize>,
    pub input_names: Vec<String>,
    pub loaded_at: DateTime<Utc>,
}

// ============================================================================
// REGRESSOR TRAIT
// ============================================================================

/// Trait for inference back-ends (ONNX, test stubs, ...)
///
/// Takes an `(n, width)` feature matrix and returns an `(n, k)` matrix of raw
/// continuous predictions.
pub trait Regressor: Send + Sync {
    fn predict(&self, features: ArrayView2<'_, f32>) -> Result<Array2<f32>, InferenceError>;
    fn metadata(&self) -> ModelMetadata;
}

// ============================================================================
// ONNX IMPLEMENTATION
// ============================================================================

/// ONNX Runtime session holding the loaded artifact
///
/// `Session::run` needs `&mut`, so the session sits behind a mutex. This is
/// the only lock on the scoring path and is never taken in fallback mode.
pub struct OnnxRegressor {
    session: Mutex<Session>,
    metadata: ModelMetadata,
}

impl OnnxRegressor {
    /// Load ONNX model from file
    pub fn load(model_path: impl AsRef<Path>, layout: FeatureLayout) -> Result<Self, InferenceError> {
        let model_path = model_path.as_ref();
        log::info!("Loading ONNX model from: {}", model_path.display());

        if !model_path.exists() {
            return Err(InferenceError::ModelNotFound(model_path.display().to_string()));
        }

        let model_bytes = std::fs::read(model_path)
            .map_err(|e| InferenceError::Load(format!("Failed to read {}: {}", model_path.display(), e)))?;

        Self::from_bytes(&model_bytes, model_path.display().to_string(), layout)
    }

    /// Load ONNX model from bytes
    pub fn from_bytes(
        model_bytes: &[u8],
        source: impl Into<String>,
        layout: FeatureLayout,
    ) -> Result<Self, InferenceError> {
        log::debug!("Building ONNX session ({} bytes)", model_bytes.len());

        let session = Session::builder()
            .map_err(|e| InferenceError::Load(format!("Session builder error: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| InferenceError::Load(format!("Optimization error: {}", e)))?
            .commit_from_memory(model_bytes)
            .map_err(|e| InferenceError::Load(format!("Load from memory error: {}", e)))?;

        if session.outputs.is_empty() {
            return Err(InferenceError::Load("Model defines no outputs".to_string()));
        }

        let declared_width = session.inputs.first()
            .and_then(|input| input.input_type.tensor_shape())
            .and_then(|shape| shape.last().copied())
            .filter(|&dim| dim > 0)
            .map(|dim| dim as usize);

        let (encoding_version, layout_hash) = read_fingerprint(&session, layout);

        let metadata = ModelMetadata {
            model_path: source.into(),
            sha256: hex::encode(Sha256::digest(model_bytes)),
            feature_layout: layout,
            feature_width: layout.width(),
            encoding_version,
            layout_hash,
            declared_width,
            input_names: session.inputs.iter().map(|i| i.name.clone()).collect(),
            loaded_at: Utc::now(),
        };

        check_compatible(&metadata)?;

        log::info!(
            "ONNX model loaded (sha256 {}, layout {}, width {})",
            &metadata.sha256[..12],
            metadata.feature_layout,
            metadata.feature_width
        );

        Ok(Self {
            session: Mutex::new(session),
            metadata,
        })
    }
}

/// Fingerprint stamped in the artifact's custom metadata
///
/// Artifacts exported without it are assumed to match the configured layout.
fn read_fingerprint(session: &Session, layout: FeatureLayout) -> (u8, u32) {
    let custom = |key: &str| -> Option<String> {
        session.metadata().ok().and_then(|meta| meta.custom(key).ok().flatten())
    };

    let version = custom(ENCODING_VERSION_KEY).and_then(|v| v.trim().parse().ok());
    let hash = custom(LAYOUT_HASH_KEY).and_then(|h| {
        u32::from_str_radix(h.trim().trim_start_matches("0x"), 16).ok()
    });

    if version.is_none() || hash.is_none() {
        log::debug!("Artifact carries no encoding fingerprint, assuming {}", layout);
    }

    (
        version.unwrap_or(ENCODING_VERSION),
        hash.unwrap_or_else(|| compute_layout_hash(layout)),
    )
}

/// Reject an artifact built for a different encoding than the one configured
pub fn check_compatible(metadata: &ModelMetadata) -> Result<(), InferenceError> {
    if let Some(declared) = metadata.declared_width {
        if declared != metadata.feature_width {
            return Err(InferenceError::Shape(format!(
                "artifact expects {} features, layout {} produces {}",
                declared,
                metadata.feature_layout,
                metadata.feature_width
            )));
        }
    }

    crate::features::layout::validate_layout(
        metadata.feature_layout,
        metadata.encoding_version,
        metadata.layout_hash,
    )?;

    Ok(())
}

impl Regressor for OnnxRegressor {
    fn predict(&self, features: ArrayView2<'_, f32>) -> Result<Array2<f32>, InferenceError> {
        let rows = features.nrows();
        if rows == 0 {
            return Ok(Array2::zeros((0, 0)));
        }

        let input_array = features.as_standard_layout().into_owned();

        let mut session = self.session.lock();

        let output_name = session.outputs.first()
            .map(|o| o.name.clone())
            .ok_or_else(|| InferenceError::Output("No output defined".to_string()))?;

        let input_tensor = Value::from_array(input_array)
            .map_err(|e| InferenceError::Runtime(format!("Tensor error: {}", e)))?;

        let outputs = session.run(ort::inputs![input_tensor])
            .map_err(|e| InferenceError::Runtime(e.to_string()))?;

        let output = outputs.get(&output_name)
            .ok_or_else(|| InferenceError::Output(format!("Missing output '{}'", output_name)))?;

        let (_, data) = output.try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::Output(format!("Extract error: {}", e)))?;

        if data.len() % rows != 0 {
            return Err(InferenceError::Shape(format!(
                "{} output values cannot be split into {} rows",
                data.len(),
                rows
            )));
        }

        let columns = data.len() / rows;
        Array2::from_shape_vec((rows, columns), data.to_vec())
            .map_err(|e| InferenceError::Shape(e.to_string()))
    }

    fn metadata(&self) -> ModelMetadata {
        self.metadata.clone()
    }
}

// ============================================================================
// TESTS
// ============================================================================
