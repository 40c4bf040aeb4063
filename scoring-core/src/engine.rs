//! Scoring Engine - Model / Fallback Orchestration
//!
//! The scoring path is chosen once, when the engine is built, and never
//! changes afterwards. Every call produces scores: inference failures
//! degrade to the rule-based scorer instead of surfacing as errors.
//!
//! ```text
//! records ──► ScoringEngine ──┬─► FeatureEncoder ─► ModelScorer ──┐
//!                             │          (on error) ──────────────┤
//!                             └─► fallback::score_record ─────────┴─► ScoreTuple(s)
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::constants;
use crate::fallback;
use crate::features::{FeatureEncoder, FeatureLayout};
use crate::model::{InferenceError, ModelMetadata, ModelScorer};
use crate::types::{AnomalyRecord, ScoreTuple, ScoringPath};

// ============================================================================
// OUTCOMES
// ============================================================================

/// Why a call was answered by the fallback scorer
#[derive(Debug, Clone, PartialEq)]
pub enum DegradeReason {
    /// No artifact was loaded at start-up
    NoModel,
    /// The artifact was loaded but inference failed for this call
    Inference(InferenceError),
}

impl std::fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DegradeReason::NoModel => f.write_str("no model loaded"),
            DegradeReason::Inference(e) => write!(f, "{}", e),
        }
    }
}

/// Result of scoring one record
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreOutcome {
    Scored(ScoreTuple),
    Degraded { scores: ScoreTuple, reason: DegradeReason },
}

impl ScoreOutcome {
    pub fn scores(&self) -> ScoreTuple {
        match self {
            ScoreOutcome::Scored(scores) | ScoreOutcome::Degraded { scores, .. } => *scores,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, ScoreOutcome::Degraded { .. })
    }
}

/// Result of scoring a batch; degradation applies to the whole batch
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    Scored(Vec<ScoreTuple>),
    Degraded { scores: Vec<ScoreTuple>, reason: DegradeReason },
}

impl BatchOutcome {
    pub fn scores(&self) -> &[ScoreTuple] {
        match self {
            BatchOutcome::Scored(scores) | BatchOutcome::Degraded { scores, .. } => scores,
        }
    }

    pub fn into_scores(self) -> Vec<ScoreTuple> {
        match self {
            BatchOutcome::Scored(scores) | BatchOutcome::Degraded { scores, .. } => scores,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, BatchOutcome::Degraded { .. })
    }

    pub fn reason(&self) -> Option<&DegradeReason> {
        match self {
            BatchOutcome::Scored(_) => None,
            BatchOutcome::Degraded { reason, .. } => Some(reason),
        }
    }
}

// ============================================================================
// STATUS
// ============================================================================

/// Engine Status for health reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub engine_version: String,
    pub path: ScoringPath,
    pub model: Option<ModelMetadata>,
    pub feature_layout: FeatureLayout,
    pub feature_width: usize,
    /// Records answered by the model
    pub scored_count: u64,
    /// Records answered by the fallback scorer
    pub degraded_count: u64,
    pub avg_latency_us: f64,
}

#[derive(Debug, Default)]
struct EngineStats {
    scored: AtomicU64,
    degraded: AtomicU64,
    calls: AtomicU64,
    latency_sum_us: AtomicU64,
}

impl EngineStats {
    fn record(&self, outcome: &BatchOutcome, started: Instant) {
        let count = outcome.scores().len() as u64;
        if outcome.is_degraded() {
            self.degraded.fetch_add(count, Ordering::Relaxed);
        } else {
            self.scored.fetch_add(count, Ordering::Relaxed);
        }

        self.calls.fetch_add(1, Ordering::Relaxed);
        self.latency_sum_us
            .fetch_add(started.elapsed().as_micros() as u64, Ordering::Relaxed);
    }
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct ScoringEngine {
    encoder: FeatureEncoder,
    model: Option<ModelScorer>,
    stats: EngineStats,
}

impl ScoringEngine {
    /// Try to load the artifact once; fall back to rules if that fails
    pub fn initialize(config: &EngineConfig) -> Self {
        Self::from_loaded(
            ModelScorer::load(&config.model_path, config.feature_layout),
            config.feature_layout,
        )
    }

    fn from_loaded(loaded: Result<ModelScorer, InferenceError>, layout: FeatureLayout) -> Self {
        match loaded {
            Ok(model) => Self::with_model(model),
            Err(InferenceError::ModelNotFound(path)) => {
                log::warn!("Model file not found at {}, using fallback prediction logic", path);
                Self::fallback_only(layout)
            }
            Err(e) => {
                log::warn!("Error loading model: {}, using fallback prediction logic", e);
                Self::fallback_only(layout)
            }
        }
    }

    /// Rule-based scoring only
    pub fn fallback_only(layout: FeatureLayout) -> Self {
        Self {
            encoder: FeatureEncoder::new(layout),
            model: None,
            stats: EngineStats::default(),
        }
    }

    /// Model path; the encoder follows the layout the artifact declares
    pub fn with_model(model: ModelScorer) -> Self {
        let metadata = model.metadata();
        log::info!(
            "Scoring engine using model {} ({} features)",
            metadata.model_path,
            metadata.feature_width
        );

        Self {
            encoder: FeatureEncoder::new(metadata.feature_layout),
            model: Some(model),
            stats: EngineStats::default(),
        }
    }

    pub fn path(&self) -> ScoringPath {
        if self.model.is_some() {
            ScoringPath::Model
        } else {
            ScoringPath::Fallback
        }
    }

    pub fn is_model_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    /// Score a single record
    pub fn score_one(&self, record: &AnomalyRecord) -> ScoreTuple {
        self.evaluate_one(record).scores()
    }

    /// Score records, output in input order
    pub fn score_many(&self, records: &[AnomalyRecord]) -> Vec<ScoreTuple> {
        self.evaluate_many(records).into_scores()
    }

    /// Single-record scoring through the batch path, so both agree
    pub fn evaluate_one(&self, record: &AnomalyRecord) -> ScoreOutcome {
        let outcome = self.evaluate_many(std::slice::from_ref(record));
        let degraded_reason = outcome.reason().cloned();
        let scores = outcome
            .into_scores()
            .into_iter()
            .next()
            .unwrap_or_else(|| fallback::score_record(record));

        match degraded_reason {
            None => ScoreOutcome::Scored(scores),
            Some(reason) => ScoreOutcome::Degraded { scores, reason },
        }
    }

    /// Score a batch, reporting whether it degraded
    ///
    /// If inference fails anywhere in the batch, every record in it is
    /// scored by the fallback rules.
    pub fn evaluate_many(&self, records: &[AnomalyRecord]) -> BatchOutcome {
        let started = Instant::now();

        let outcome = match &self.model {
            None => BatchOutcome::Degraded {
                scores: score_with_rules(records),
                reason: DegradeReason::NoModel,
            },
            Some(_) if records.is_empty() => BatchOutcome::Scored(Vec::new()),
            Some(model) => {
                let features = self.encoder.encode_batch(records);
                match model.score(features.view()) {
                    Ok(scores) => BatchOutcome::Scored(scores),
                    Err(e) => {
                        log::warn!(
                            "Model inference failed for batch of {} ({}), using fallback",
                            records.len(),
                            e
                        );
                        BatchOutcome::Degraded {
                            scores: score_with_rules(records),
                            reason: DegradeReason::Inference(e),
                        }
                    }
                }
            }
        };

        self.stats.record(&outcome, started);
        outcome
    }

    pub fn status(&self) -> EngineStatus {
        let calls = self.stats.calls.load(Ordering::Relaxed);
        let latency = self.stats.latency_sum_us.load(Ordering::Relaxed);

        EngineStatus {
            engine_version: constants::ENGINE_VERSION.to_string(),
            path: self.path(),
            model: self.model.as_ref().map(ModelScorer::metadata),
            feature_layout: self.encoder.layout(),
            feature_width: self.encoder.width(),
            scored_count: self.stats.scored.load(Ordering::Relaxed),
            degraded_count: self.stats.degraded.load(Ordering::Relaxed),
            avg_latency_us: if calls > 0 { latency as f64 / calls as f64 } else { 0.0 },
        }
    }
}

fn score_with_rules(records: &[AnomalyRecord]) -> Vec<ScoreTuple> {
    records.iter().map(fallback::score_record).collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::layout::{compute_layout_hash, stable_hash, ENCODING_VERSION, TOKEN_BUCKETS};
    use crate::model::Regressor;
    use crate::types::{MAX_CRITICALITY, MAX_SCORE, MIN_CRITICALITY, MIN_SCORE};
    use chrono::Utc;
    use ndarray::{Array2, ArrayView2};

    /// Derives scores from the first text slot so rows differ
    struct SlotRegressor;

    /// Always fails
    struct BrokenRegressor;

    /// Emits NaN for any row whose first token is "poison"
    struct PoisonRegressor;

    /// Exported for the text-only layout but registered as category+text
    struct TextOnlyArtifact;

    fn stub_metadata() -> ModelMetadata {
        ModelMetadata {
            model_path: "<stub>".to_string(),
            sha256: "0".repeat(64),
            feature_layout: FeatureLayout::CategoryText,
            feature_width: FeatureLayout::CategoryText.width(),
            encoding_version: ENCODING_VERSION,
            layout_hash: compute_layout_hash(FeatureLayout::CategoryText),
            declared_width: Some(FeatureLayout::CategoryText.width()),
            input_names: vec!["float_input".to_string()],
            loaded_at: Utc::now(),
        }
    }

    impl Regressor for SlotRegressor {
        fn predict(&self, features: ArrayView2<'_, f32>) -> Result<Array2<f32>, InferenceError> {
            let mut out = Array2::zeros((features.nrows(), 4));
            for (i, row) in features.rows().into_iter().enumerate() {
                let v = row[1] % 7.0;
                out[[i, 0]] = v;
                out[[i, 1]] = v - 1.0;
                out[[i, 2]] = v + 1.0;
                out[[i, 3]] = 99.0;
            }
            Ok(out)
        }

        fn metadata(&self) -> ModelMetadata {
            stub_metadata()
        }
    }

    impl Regressor for BrokenRegressor {
        fn predict(&self, _features: ArrayView2<'_, f32>) -> Result<Array2<f32>, InferenceError> {
            Err(InferenceError::Runtime("artifact corrupted".to_string()))
        }

        fn metadata(&self) -> ModelMetadata {
            stub_metadata()
        }
    }

    impl Regressor for PoisonRegressor {
        fn predict(&self, features: ArrayView2<'_, f32>) -> Result<Array2<f32>, InferenceError> {
            let poison = (stable_hash("poison") % TOKEN_BUCKETS) as f32;
            let mut out = Array2::from_elem((features.nrows(), 3), 1.0f32);
            for (i, row) in features.rows().into_iter().enumerate() {
                if row[1] == poison {
                    out[[i, 0]] = f32::NAN;
                }
            }
            Ok(out)
        }

        fn metadata(&self) -> ModelMetadata {
            stub_metadata()
        }
    }

    impl Regressor for TextOnlyArtifact {
        fn predict(&self, features: ArrayView2<'_, f32>) -> Result<Array2<f32>, InferenceError> {
            Ok(Array2::from_elem((features.nrows(), 3), 3.0))
        }

        fn metadata(&self) -> ModelMetadata {
            ModelMetadata {
                declared_width: Some(FeatureLayout::TextOnly.width()),
                ..stub_metadata()
            }
        }
    }

    fn sample_records() -> Vec<AnomalyRecord> {
        vec![
            AnomalyRecord::new("EQ001", "Hydraulic", "Pressure drop detected in main valve"),
            AnomalyRecord::new("EQ002", "Electrical", "Motor overheating issue"),
            AnomalyRecord::new("EQ003", "Mechanical", "Routine calibration check"),
            AnomalyRecord::new("EQ004", "Pneumatic", ""),
            AnomalyRecord::new("EQ005", "", "Bearing wear on conveyor"),
        ]
    }

    fn assert_bounds(scores: &ScoreTuple) {
        for v in scores.as_array() {
            assert!((MIN_SCORE..=MAX_SCORE).contains(&v));
        }
        assert!((MIN_CRITICALITY..=MAX_CRITICALITY).contains(&scores.criticality()));
        assert_eq!(
            scores.criticality(),
            scores.reliability() + scores.availability() + scores.process_safety()
        );
    }

    #[test]
    fn test_fallback_examples() {
        let engine = ScoringEngine::fallback_only(FeatureLayout::CategoryText);
        let records = sample_records();

        assert_eq!(engine.score_one(&records[0]).as_array(), [4, 5, 5]);
        assert_eq!(engine.score_one(&records[0]).criticality(), 14);
        assert_eq!(engine.score_one(&records[1]).criticality(), 13);
        assert_eq!(engine.score_one(&records[2]).criticality(), 6);
    }

    #[test]
    fn test_fallback_batch_single_parity() {
        let engine = ScoringEngine::fallback_only(FeatureLayout::CategoryText);
        let records = sample_records();
        let batch = engine.score_many(&records);

        assert_eq!(batch.len(), records.len());
        for (record, scores) in records.iter().zip(&batch) {
            assert_eq!(engine.score_one(record), *scores);
            assert_bounds(scores);
        }
    }

    #[test]
    fn test_empty_batch() {
        let fallback = ScoringEngine::fallback_only(FeatureLayout::CategoryText);
        assert!(fallback.score_many(&[]).is_empty());

        let model = ScoringEngine::with_model(ModelScorer::new(BrokenRegressor).unwrap());
        assert!(model.score_many(&[]).is_empty());
        assert!(!model.evaluate_many(&[]).is_degraded());
    }

    #[test]
    fn test_missing_artifact_selects_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::new(dir.path().join("missing.onnx"), FeatureLayout::CategoryText);
        let engine = ScoringEngine::initialize(&config);

        assert_eq!(engine.path(), ScoringPath::Fallback);
        let record = AnomalyRecord::new("EQ001", "Hydraulic", "Pressure drop detected in main valve");
        assert_eq!(engine.score_one(&record).criticality(), 14);

        match engine.evaluate_one(&record) {
            ScoreOutcome::Degraded { reason, .. } => assert_eq!(reason, DegradeReason::NoModel),
            other => panic!("expected degraded outcome, got {other:?}"),
        }
    }

    #[test]
    fn test_corrupt_artifact_selects_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        std::fs::write(&path, b"\x00\x01garbage").unwrap();

        let engine = ScoringEngine::initialize(&EngineConfig::new(path, FeatureLayout::TextOnly));
        assert!(!engine.is_model_loaded());
        assert_eq!(engine.encoder().width(), 100);

        let record = AnomalyRecord::new("EQ003", "Mechanical", "Routine calibration check");
        assert_eq!(engine.score_one(&record).as_array(), [2, 2, 2]);
    }

    #[test]
    fn test_width_mismatch_selects_fallback() {
        let loaded = ModelScorer::new(TextOnlyArtifact);
        assert!(matches!(loaded, Err(InferenceError::Shape(_))));

        let engine = ScoringEngine::from_loaded(loaded, FeatureLayout::CategoryText);
        assert_eq!(engine.path(), ScoringPath::Fallback);
        assert!(engine.status().model.is_none());

        let record = AnomalyRecord::new("EQ001", "Hydraulic", "Pressure drop detected in main valve");
        assert_eq!(engine.score_one(&record), fallback::score_record(&record));
    }

    #[test]
    fn test_model_path_scores_and_parity() {
        let engine = ScoringEngine::with_model(ModelScorer::new(SlotRegressor).unwrap());
        assert_eq!(engine.path(), ScoringPath::Model);

        let records = sample_records();
        let outcome = engine.evaluate_many(&records);
        assert!(!outcome.is_degraded());

        let batch = outcome.into_scores();
        assert_eq!(batch.len(), records.len());
        for (record, scores) in records.iter().zip(&batch) {
            assert_bounds(scores);
            assert_eq!(engine.score_one(record), *scores);
        }
    }

    #[test]
    fn test_inference_failure_degrades_every_record() {
        let engine = ScoringEngine::with_model(ModelScorer::new(BrokenRegressor).unwrap());
        let records = sample_records();

        let outcome = engine.evaluate_many(&records);
        assert!(matches!(
            outcome.reason(),
            Some(DegradeReason::Inference(InferenceError::Runtime(_)))
        ));

        let expected: Vec<_> = records.iter().map(fallback::score_record).collect();
        assert_eq!(outcome.scores(), expected.as_slice());
    }

    #[test]
    fn test_one_bad_record_forces_batch_fallback() {
        let engine = ScoringEngine::with_model(ModelScorer::new(PoisonRegressor).unwrap());
        let good = AnomalyRecord::new("EQ001", "Hydraulic", "Pressure drop detected in main valve");
        let bad = AnomalyRecord::new("EQ666", "Electrical", "poison pill");

        // Alone, the good record goes through the model (all ones)
        assert_eq!(engine.score_one(&good).as_array(), [1, 1, 1]);

        // In a batch with the bad record, both come from the rules
        let outcome = engine.evaluate_many(&[good.clone(), bad.clone()]);
        assert!(outcome.is_degraded());
        assert_eq!(outcome.scores()[0], fallback::score_record(&good));
        assert_eq!(outcome.scores()[1], fallback::score_record(&bad));
    }

    #[test]
    fn test_status_counters() {
        let engine = ScoringEngine::with_model(ModelScorer::new(PoisonRegressor).unwrap());
        let good = AnomalyRecord::new("EQ001", "Hydraulic", "Pressure drop");
        let bad = AnomalyRecord::new("EQ666", "Hydraulic", "poison");

        engine.score_many(&[good.clone(), good]);
        engine.score_one(&bad);

        let status = engine.status();
        assert_eq!(status.path, ScoringPath::Model);
        assert_eq!(status.scored_count, 2);
        assert_eq!(status.degraded_count, 1);
        assert_eq!(status.feature_width, 101);
        assert_eq!(status.engine_version, constants::ENGINE_VERSION);
        assert!(status.model.is_some());
    }

    #[test]
    fn test_engine_shared_across_threads() {
        let engine = std::sync::Arc::new(ScoringEngine::fallback_only(FeatureLayout::CategoryText));
        let records = sample_records();
        let expected = engine.score_many(&records);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let engine = engine.clone();
                let records = records.clone();
                std::thread::spawn(move || engine.score_many(&records))
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    }
}
