//! Features Module - Record Encoding
//!
//! Turns heterogeneous, partially-missing anomaly records into the
//! fixed-width numeric representation consumed by the model path.

pub mod layout;
pub mod vector;

#[cfg(test)]
mod tests;

// Re-export common types
pub use layout::{FeatureLayout, LayoutMismatchError, ENCODING_VERSION, TEXT_SLOTS};
pub use vector::{FeatureEncoder, FeatureVector};
