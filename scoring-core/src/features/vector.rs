//! Feature Vector - Fixed-width model input
//!
//! **Versioned feature vector with layout validation**
//!
//! Every record encodes to exactly `layout.width()` values no matter which
//! optional fields are missing, so a fixed-shape artifact can be applied to
//! any batch.

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use super::layout::{
    compute_layout_hash, stable_hash, validate_layout, FeatureLayout, LayoutMismatchError,
    CATEGORY_BUCKETS, ENCODING_VERSION, MISSING_SENTINEL, TEXT_SLOTS, TOKEN_BUCKETS,
};
use crate::types::AnomalyRecord;

// ============================================================================
// VERSIONED FEATURE VECTOR
// ============================================================================

/// Versioned Feature Vector with layout metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Encoding version
    pub version: u8,
    /// CRC32 fingerprint of the encoding parameters
    pub layout_hash: u32,
    pub layout: FeatureLayout,
    /// Slot values in layout order
    pub values: Vec<f32>,
}

impl FeatureVector {
    /// Zeroed vector for the given layout
    pub fn zeroed(layout: FeatureLayout) -> Self {
        Self {
            version: ENCODING_VERSION,
            layout_hash: compute_layout_hash(layout),
            layout,
            values: vec![0.0; layout.width()],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Categorical slot, if the layout carries one
    pub fn category_slot(&self) -> Option<f32> {
        if self.layout.has_category_slot() {
            self.values.first().copied()
        } else {
            None
        }
    }

    /// The 100 positional text slots
    pub fn text_slots(&self) -> &[f32] {
        self.values.get(self.layout.text_offset()..).unwrap_or_default()
    }

    /// Validate that this vector was produced by the current encoding
    pub fn validate(&self) -> Result<(), LayoutMismatchError> {
        validate_layout(self.layout, self.version, self.layout_hash)
    }
}

// ============================================================================
// ENCODER
// ============================================================================

/// Maps anomaly records to fixed-width numeric vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureEncoder {
    layout: FeatureLayout,
}

impl FeatureEncoder {
    pub fn new(layout: FeatureLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> FeatureLayout {
        self.layout
    }

    pub fn width(&self) -> usize {
        self.layout.width()
    }

    /// Encode one record
    pub fn encode(&self, record: &AnomalyRecord) -> FeatureVector {
        let mut vector = FeatureVector::zeroed(self.layout);
        self.fill_row(record, &mut vector.values);
        vector
    }

    /// Encode records into an `(n, width)` matrix, rows in input order
    pub fn encode_batch(&self, records: &[AnomalyRecord]) -> Array2<f32> {
        let width = self.width();
        let mut matrix = Array2::<f32>::zeros((records.len(), width));

        // Rows are built by the single-record path so batch and single agree
        for (record, mut row) in records.iter().zip(matrix.rows_mut()) {
            let vector = self.encode(record);
            row.assign(&ArrayView1::from(vector.as_slice()));
        }

        matrix
    }

    fn fill_row(&self, record: &AnomalyRecord, slots: &mut [f32]) {
        if self.layout.has_category_slot() {
            slots[0] = encode_category(&record.system);
        }

        let offset = self.layout.text_offset();
        encode_text(&record.description, &mut slots[offset..offset + TEXT_SLOTS]);
    }
}

// ============================================================================
// FIELD ENCODERS
// ============================================================================

/// Substitute the sentinel for absent or blank values
pub fn normalize_field(value: &str) -> &str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        MISSING_SENTINEL
    } else {
        trimmed
    }
}

/// Hash bucket of the lowercased category name
///
/// Unseen categories still land in a valid bucket.
pub fn encode_category(system: &str) -> f32 {
    let normalized = normalize_field(system).to_lowercase();
    (stable_hash(&normalized) % CATEGORY_BUCKETS) as f32
}

/// Position-sensitive bag of hashed words
///
/// Slot `j` holds the bucket of the `j`-th whitespace token; slots past the
/// last token stay zero.
pub fn encode_text(description: &str, slots: &mut [f32]) {
    let lowered = normalize_field(description).to_lowercase();

    for (slot, token) in slots.iter_mut().zip(lowered.split_whitespace().take(TEXT_SLOTS)) {
        *slot = (stable_hash(token) % TOKEN_BUCKETS) as f32;
    }
}

// ============================================================================
// TESTS
// ============================================================================
