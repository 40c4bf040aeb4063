//! Shared record and score types
//!
//! `AnomalyRecord` is what the ingestion layer hands to the engine,
//! `ScoreTuple` is what the engine hands back.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// SCORE BOUNDS
// ============================================================================

/// Lowest value of a single risk score
pub const MIN_SCORE: u8 = 1;

/// Highest value of a single risk score
pub const MAX_SCORE: u8 = 5;

/// Neutral starting value for every score
pub const MEDIUM_SCORE: u8 = 3;

/// Criticality bounds (sum of three scores)
pub const MIN_CRITICALITY: u8 = MIN_SCORE * 3;
pub const MAX_CRITICALITY: u8 = MAX_SCORE * 3;

// ============================================================================
// INPUT RECORD
// ============================================================================

/// One maintenance-anomaly report
///
/// Required fields are assumed present by contract. The original French
/// export names are accepted as aliases when deserializing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnomalyRecord {
    #[serde(alias = "num_equipement")]
    pub equipment_id: String,
    #[serde(alias = "systeme")]
    pub system: String,
    pub description: String,
    #[serde(default, alias = "date_detection")]
    pub detected_on: Option<NaiveDate>,
    #[serde(default, alias = "description_equipement")]
    pub equipment_description: Option<String>,
    #[serde(default, alias = "section_proprietaire")]
    pub owner_section: Option<String>,
}

impl AnomalyRecord {
    pub fn new(
        equipment_id: impl Into<String>,
        system: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            equipment_id: equipment_id.into(),
            system: system.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn detected_on(mut self, date: NaiveDate) -> Self {
        self.detected_on = Some(date);
        self
    }

    pub fn equipment_description(mut self, value: impl Into<String>) -> Self {
        self.equipment_description = Some(value.into());
        self
    }

    pub fn owner_section(mut self, value: impl Into<String>) -> Self {
        self.owner_section = Some(value.into());
        self
    }
}

// ============================================================================
// OUTPUT SCORES
// ============================================================================

/// Three bounded risk scores plus their derived criticality
///
/// Fields are private: the only way to build one is [`ScoreTuple::new`],
/// which clamps every component into `[1, 5]` and computes criticality as
/// their sum. Criticality is therefore always in `[3, 15]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ScoreTuple {
    #[serde(rename = "ai_fiabilite_integrite_score")]
    reliability: u8,
    #[serde(rename = "ai_disponibilite_score")]
    availability: u8,
    #[serde(rename = "ai_process_safety_score")]
    process_safety: u8,
    #[serde(rename = "ai_criticality_level")]
    criticality: u8,
}

impl ScoreTuple {
    pub fn new(reliability: u8, availability: u8, process_safety: u8) -> Self {
        let reliability = clamp_score(reliability);
        let availability = clamp_score(availability);
        let process_safety = clamp_score(process_safety);
        let criticality = reliability + availability + process_safety;
        debug_assert!((MIN_CRITICALITY..=MAX_CRITICALITY).contains(&criticality));

        Self {
            reliability,
            availability,
            process_safety,
            criticality,
        }
    }

    /// Reliability / integrity (fiabilité intégrité)
    pub fn reliability(&self) -> u8 {
        self.reliability
    }

    /// Availability (disponibilité)
    pub fn availability(&self) -> u8 {
        self.availability
    }

    pub fn process_safety(&self) -> u8 {
        self.process_safety
    }

    pub fn criticality(&self) -> u8 {
        self.criticality
    }

    pub fn as_array(&self) -> [u8; 3] {
        [self.reliability, self.availability, self.process_safety]
    }
}

impl Default for ScoreTuple {
    fn default() -> Self {
        Self::new(MEDIUM_SCORE, MEDIUM_SCORE, MEDIUM_SCORE)
    }
}

fn clamp_score(value: u8) -> u8 {
    value.clamp(MIN_SCORE, MAX_SCORE)
}

// ============================================================================
// SCORING PATH
// ============================================================================

/// Which scorer the engine routes every call through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringPath {
    Model,
    Fallback,
}

impl ScoringPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringPath::Model => "model",
            ScoringPath::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for ScoringPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// TESTS
// ============================================================================
