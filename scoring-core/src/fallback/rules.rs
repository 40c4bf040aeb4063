//! Fallback Keyword Rules
//!
//! Keyword tables and tier scores for the rule-based scorer.
//! No scoring logic here - only constants and tier lookup.

use serde::{Deserialize, Serialize};

// ============================================================================
// KEYWORD TABLES (checked in this order, first match wins)
// ============================================================================

/// Failure or hazard vocabulary
pub const CRITICAL_KEYWORDS: &[&str] = &[
    "failure", "broken", "leak", "fire", "explosion", "pressure", "overheat",
];

/// Degradation vocabulary
pub const MEDIUM_KEYWORDS: &[&str] = &["wear", "drift", "irregularities", "drop", "issue"];

/// Routine upkeep vocabulary
pub const LOW_KEYWORDS: &[&str] = &["calibration", "maintenance", "check"];

// ============================================================================
// SYSTEM ADJUSTMENTS
// ============================================================================

/// System names that raise process safety by one
pub const SAFETY_SYSTEMS: &[&str] = &["electrical"];

/// System names that raise availability by one
pub const AVAILABILITY_SYSTEMS: &[&str] = &["hydraulic", "pneumatic"];

// ============================================================================
// TIERS
// ============================================================================

/// Keyword tier matched by a description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeywordTier {
    Critical,
    Medium,
    Low,
    None,
}

impl KeywordTier {
    /// Base (reliability, availability, process safety) for this tier
    pub fn base_scores(&self) -> (u8, u8, u8) {
        match self {
            KeywordTier::Critical => (4, 4, 5),
            KeywordTier::Medium => (3, 3, 3),
            KeywordTier::Low => (2, 2, 2),
            KeywordTier::None => (3, 3, 3),
        }
    }
}

/// Classify an already lowercased description
pub fn classify_lowered(description: &str) -> KeywordTier {
    let contains_any = |keywords: &[&str]| keywords.iter().any(|k| description.contains(k));

    if contains_any(CRITICAL_KEYWORDS) {
        KeywordTier::Critical
    } else if contains_any(MEDIUM_KEYWORDS) {
        KeywordTier::Medium
    } else if contains_any(LOW_KEYWORDS) {
        KeywordTier::Low
    } else {
        KeywordTier::None
    }
}

/// Classify a free-text description
pub fn classify(description: &str) -> KeywordTier {
    classify_lowered(&description.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_priority() {
        // "pressure" (critical) wins over "drop" (medium)
        assert_eq!(classify("Pressure drop detected"), KeywordTier::Critical);
        // "issue" (medium) wins over "check" (low)
        assert_eq!(classify("Issue found during check"), KeywordTier::Medium);
        assert_eq!(classify("Routine calibration check"), KeywordTier::Low);
        assert_eq!(classify("Paint scratched"), KeywordTier::None);
    }

    #[test]
    fn test_substring_match() {
        assert_eq!(classify("Motor OVERHEATING"), KeywordTier::Critical);
        assert_eq!(classify("Leakage at flange"), KeywordTier::Critical);
    }

    #[test]
    fn test_empty_description() {
        assert_eq!(classify(""), KeywordTier::None);
    }
}
