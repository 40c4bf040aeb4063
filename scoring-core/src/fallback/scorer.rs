//! Rule-Based Fallback Scorer
//!
//! Deterministic keyword/heuristic scoring used when no artifact is loaded
//! or inference fails. Pure and total: any input yields a valid tuple.

use super::rules::{classify_lowered, KeywordTier, AVAILABILITY_SYSTEMS, SAFETY_SYSTEMS};
use crate::types::{AnomalyRecord, ScoreTuple, MAX_SCORE};

/// Score raw description and system name
pub fn score(description: &str, system: &str) -> ScoreTuple {
    let tier = classify_lowered(&description.to_lowercase());
    let (reliability, mut availability, mut process_safety) = tier.base_scores();

    // At most one adjustment applies
    let system = system.to_lowercase();
    if SAFETY_SYSTEMS.iter().any(|s| system.contains(s)) {
        process_safety = (process_safety + 1).min(MAX_SCORE);
    } else if AVAILABILITY_SYSTEMS.iter().any(|s| system.contains(s)) {
        availability = (availability + 1).min(MAX_SCORE);
    }

    ScoreTuple::new(reliability, availability, process_safety)
}

/// Score a whole record
pub fn score_record(record: &AnomalyRecord) -> ScoreTuple {
    score(&record.description, &record.system)
}

/// Tier matched for a record, for logging
pub fn tier_of(record: &AnomalyRecord) -> KeywordTier {
    classify_lowered(&record.description.to_lowercase())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MAX_CRITICALITY, MIN_CRITICALITY, MIN_SCORE};

    #[test]
    fn test_pressure_drop_hydraulic() {
        let scores = score("Pressure drop detected in main valve", "Hydraulic");
        assert_eq!(scores.as_array(), [4, 5, 5]);
        assert_eq!(scores.criticality(), 14);
    }

    #[test]
    fn test_routine_calibration_mechanical() {
        let scores = score("Routine calibration check", "Mechanical");
        assert_eq!(scores.as_array(), [2, 2, 2]);
        assert_eq!(scores.criticality(), 6);
    }

    #[test]
    fn test_overheating_electrical_capped() {
        let scores = score("Motor overheating issue", "Electrical");
        assert_eq!(scores.as_array(), [4, 4, 5]);
        assert_eq!(scores.criticality(), 13);
    }

    #[test]
    fn test_electrical_takes_precedence_over_hydraulic() {
        // Only the first matching branch applies
        let scores = score("Bearing wear", "Electro-hydraulic electrical panel");
        assert_eq!(scores.as_array(), [3, 3, 4]);
    }

    #[test]
    fn test_pneumatic_bonus_on_low_tier() {
        let scores = score("Scheduled maintenance", "Pneumatic");
        assert_eq!(scores.as_array(), [2, 3, 2]);
        assert_eq!(scores.criticality(), 7);
    }

    #[test]
    fn test_no_match_baseline() {
        let scores = score("Paint scratched on housing", "Structural");
        assert_eq!(scores.as_array(), [3, 3, 3]);
        assert_eq!(scores.criticality(), 9);
    }

    #[test]
    fn test_empty_inputs_total() {
        let scores = score("", "");
        assert_eq!(scores, ScoreTuple::default());
    }

    #[test]
    fn test_pure() {
        let record = AnomalyRecord::new("EQ010", "Hydraulic", "Oil leak near pump");
        assert_eq!(score_record(&record), score_record(&record));
        assert_eq!(tier_of(&record), KeywordTier::Critical);
    }

    #[test]
    fn test_bounds_hold_for_every_tier_and_system() {
        let descriptions = ["fire", "drift", "check", "nothing"];
        let systems = ["Electrical", "Hydraulic", "Pneumatic", "Other", ""];

        for d in descriptions {
            for s in systems {
                let scores = score(d, s);
                for v in scores.as_array() {
                    assert!((MIN_SCORE..=MAX_SCORE).contains(&v));
                }
                assert!((MIN_CRITICALITY..=MAX_CRITICALITY).contains(&scores.criticality()));
                assert_eq!(
                    scores.criticality(),
                    scores.reliability() + scores.availability() + scores.process_safety()
                );
            }
        }
    }
}
