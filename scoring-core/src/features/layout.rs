//! Feature Layout - Centralized Encoding Definition
//!
//! **CRITICAL: This file controls the feature schema**
//!
//! A trained artifact is only valid for the exact encoding it was trained
//! against. Changing any of the following requires a new ENCODING_VERSION:
//! 1. The hash function
//! 2. A bucket count or the number of text slots
//! 3. The missing-value sentinel
//! 4. Slot order

use std::str::FromStr;

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// ENCODING VERSION
// ============================================================================

/// Current encoding version
/// MUST be incremented when any constant below changes
pub const ENCODING_VERSION: u8 = 1;

// ============================================================================
// ENCODING CONSTANTS
// ============================================================================

/// Buckets for the categorical (system name) slot
pub const CATEGORY_BUCKETS: u32 = 1000;

/// Number of positional text slots
pub const TEXT_SLOTS: usize = 100;

/// Buckets for a single description token
pub const TOKEN_BUCKETS: u32 = 100;

/// Substituted for absent or blank field values
pub const MISSING_SENTINEL: &str = "unknown";

// ============================================================================
// STABLE HASH
// ============================================================================

/// Restart-stable string hash (CRC-32/IEEE over UTF-8 bytes)
///
/// Unlike `std::collections::hash_map::DefaultHasher` this never depends on a
/// per-process seed, so the same string maps to the same bucket on every
/// deployment.
pub fn stable_hash(value: &str) -> u32 {
    crc32fast::hash(value.as_bytes())
}

// ============================================================================
// FEATURE LAYOUT
// ============================================================================

/// Slot arrangement expected by the loaded artifact
///
/// `CategoryText` is `[category] ++ [100 text slots]` (width 101),
/// `TextOnly` is just the 100 text slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureLayout {
    #[default]
    CategoryText,
    TextOnly,
}

impl FeatureLayout {
    pub fn width(&self) -> usize {
        match self {
            FeatureLayout::CategoryText => 1 + TEXT_SLOTS,
            FeatureLayout::TextOnly => TEXT_SLOTS,
        }
    }

    pub fn has_category_slot(&self) -> bool {
        matches!(self, FeatureLayout::CategoryText)
    }

    /// Index of the first text slot
    pub fn text_offset(&self) -> usize {
        if self.has_category_slot() { 1 } else { 0 }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureLayout::CategoryText => "category_text",
            FeatureLayout::TextOnly => "text_only",
        }
    }
}

impl std::fmt::Display for FeatureLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
#[error("Unknown feature layout '{0}' (expected 'category_text' or 'text_only')")]
pub struct LayoutParseError(pub String);

impl FromStr for FeatureLayout {
    type Err = LayoutParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "category_text" | "category+text" | "101" => Ok(FeatureLayout::CategoryText),
            "text_only" | "text" | "100" => Ok(FeatureLayout::TextOnly),
            other => Err(LayoutParseError(other.to_string())),
        }
    }
}

// ============================================================================
// LAYOUT HASH
// ============================================================================

/// Compute CRC32 fingerprint of every encoding parameter
/// Used to detect encoder/artifact mismatches at runtime
pub fn compute_layout_hash(layout: FeatureLayout) -> u32 {
    let mut hasher = Hasher::new();

    hasher.update(&[ENCODING_VERSION]);
    hasher.update(layout.as_str().as_bytes());
    hasher.update(&[0]);
    hasher.update(&CATEGORY_BUCKETS.to_le_bytes());
    hasher.update(&(TEXT_SLOTS as u32).to_le_bytes());
    hasher.update(&TOKEN_BUCKETS.to_le_bytes());
    hasher.update(MISSING_SENTINEL.as_bytes());

    hasher.finalize()
}

// ============================================================================
// LAYOUT VALIDATION
// ============================================================================

/// Error when a vector or artifact was produced by a different encoding
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "Feature layout mismatch: expected v{expected_version} (hash: {expected_hash:08x}), \
     got v{actual_version} (hash: {actual_hash:08x})"
)]
pub struct LayoutMismatchError {
    pub expected_version: u8,
    pub expected_hash: u32,
    pub actual_version: u8,
    pub actual_hash: u32,
}

/// Validate that incoming data matches the given layout
pub fn validate_layout(
    layout: FeatureLayout,
    incoming_version: u8,
    incoming_hash: u32,
) -> Result<(), LayoutMismatchError> {
    let current_hash = compute_layout_hash(layout);

    if incoming_version != ENCODING_VERSION || incoming_hash != current_hash {
        return Err(LayoutMismatchError {
            expected_version: ENCODING_VERSION,
            expected_hash: current_hash,
            actual_version: incoming_version,
            actual_hash: incoming_hash,
        });
    }

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_widths() {
        assert_eq!(FeatureLayout::CategoryText.width(), 101);
        assert_eq!(FeatureLayout::TextOnly.width(), 100);
        assert_eq!(FeatureLayout::default(), FeatureLayout::CategoryText);
    }

    #[test]
    fn test_stable_hash_is_fixed() {
        // CRC-32/IEEE check value
        assert_eq!(stable_hash("123456789"), 0xCBF4_3926);
        assert_eq!(stable_hash(""), 0);
    }

    #[test]
    fn test_layout_hash_differs_per_layout() {
        assert_eq!(
            compute_layout_hash(FeatureLayout::TextOnly),
            compute_layout_hash(FeatureLayout::TextOnly)
        );
        assert_ne!(
            compute_layout_hash(FeatureLayout::CategoryText),
            compute_layout_hash(FeatureLayout::TextOnly)
        );
    }

    #[test]
    fn test_validate_layout() {
        let layout = FeatureLayout::CategoryText;
        let hash = compute_layout_hash(layout);

        assert!(validate_layout(layout, ENCODING_VERSION, hash).is_ok());
        assert!(validate_layout(layout, ENCODING_VERSION + 1, hash).is_err());
        assert!(validate_layout(layout, ENCODING_VERSION, hash.wrapping_add(1)).is_err());
    }

    #[test]
    fn test_parse_layout() {
        assert_eq!("category_text".parse::<FeatureLayout>().unwrap(), FeatureLayout::CategoryText);
        assert_eq!(" TEXT_ONLY ".parse::<FeatureLayout>().unwrap(), FeatureLayout::TextOnly);
        assert!("tfidf".parse::<FeatureLayout>().is_err());
    }
}
