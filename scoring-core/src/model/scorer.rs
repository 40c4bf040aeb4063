//! Model Scorer
//!
//! Applies a `Regressor` to encoded features and turns its raw continuous
//! output into bounded `ScoreTuple`s.

use std::path::Path;

use ndarray::{ArrayView1, ArrayView2};

use super::inference::{check_compatible, InferenceError, ModelMetadata, OnnxRegressor, Regressor};
use crate::features::FeatureLayout;
use crate::types::{ScoreTuple, MAX_SCORE, MIN_SCORE};

/// Number of leading output columns read as scores
pub const SCORE_OUTPUTS: usize = 3;

pub struct ModelScorer {
    regressor: Box<dyn Regressor>,
}

impl ModelScorer {
    /// Wrap a regressor, refusing one built for a different encoding
    pub fn new(regressor: impl Regressor + 'static) -> Result<Self, InferenceError> {
        check_compatible(&regressor.metadata())?;

        Ok(Self {
            regressor: Box::new(regressor),
        })
    }

    /// Load the ONNX artifact at `path`
    pub fn load(path: impl AsRef<Path>, layout: FeatureLayout) -> Result<Self, InferenceError> {
        Self::new(OnnxRegressor::load(path, layout)?)
    }

    pub fn metadata(&self) -> ModelMetadata {
        self.regressor.metadata()
    }

    /// Score every row of `features`, or fail for the whole matrix
    pub fn score(&self, features: ArrayView2<'_, f32>) -> Result<Vec<ScoreTuple>, InferenceError> {
        let expected_width = self.regressor.metadata().feature_width;
        if features.ncols() != expected_width {
            return Err(InferenceError::Shape(format!(
                "expected {} features, got {}",
                expected_width,
                features.ncols()
            )));
        }

        let raw = self.regressor.predict(features)?;

        if raw.nrows() != features.nrows() {
            return Err(InferenceError::Shape(format!(
                "{} inputs produced {} predictions",
                features.nrows(),
                raw.nrows()
            )));
        }
        if raw.nrows() > 0 && raw.ncols() < SCORE_OUTPUTS {
            return Err(InferenceError::Output(format!(
                "expected at least {} outputs per row, got {}",
                SCORE_OUTPUTS,
                raw.ncols()
            )));
        }

        raw.rows().into_iter().map(row_to_scores).collect()
    }
}

/// First three columns → clamped scores; extra columns (e.g. a predicted
/// criticality) are ignored and criticality is recomputed.
fn row_to_scores(row: ArrayView1<'_, f32>) -> Result<ScoreTuple, InferenceError> {
    Ok(ScoreTuple::new(
        to_score(row[0])?,
        to_score(row[1])?,
        to_score(row[2])?,
    ))
}

/// Round half-to-even, then clamp into `[1, 5]`
pub fn to_score(value: f32) -> Result<u8, InferenceError> {
    if !value.is_finite() {
        return Err(InferenceError::NonFinite(value));
    }

    Ok(value
        .round_ties_even()
        .clamp(MIN_SCORE as f32, MAX_SCORE as f32) as u8)
}

// ============================================================================
// TESTS
// ============================================================================
