//! Fallback Module - Rule-Based Scoring
//!
//! Produces scores straight from raw text fields, no artifact needed.

pub mod rules;
pub mod scorer;

pub use rules::{classify, KeywordTier};
pub use scorer::{score, score_record};
