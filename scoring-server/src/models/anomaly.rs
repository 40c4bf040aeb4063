//! Anomaly model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;
use validator::Validate;

use tams_scoring::{AnomalyRecord, ScoreTuple};

use super::import_batch::{BatchSource, ImportBatch};

/// Status given to every freshly scored anomaly
pub const INITIAL_STATUS: &str = "nouvelle";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Anomaly {
    pub id: Uuid,
    pub num_equipement: String,
    pub description: Option<String>,
    pub service: Option<String>,
    pub date_detection: Option<NaiveDate>,
    pub description_equipement: Option<String>,
    pub section_proprietaire: Option<String>,
    pub status: String,
    pub ai_fiabilite_integrite_score: i16,
    pub ai_disponibilite_score: i16,
    pub ai_process_safety_score: i16,
    pub ai_criticality_level: i16,
    pub import_batch_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Incoming anomaly as posted by clients
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AnomalyInput {
    #[validate(length(min = 1, message = "num_equipement is required"))]
    pub num_equipement: String,
    #[validate(length(min = 1, message = "systeme is required"))]
    pub systeme: String,
    #[validate(length(min = 1, message = "description is required"))]
    pub description: String,
    pub date_detection: Option<String>,
    pub description_equipement: Option<String>,
    pub section_proprietaire: Option<String>,
}

/// Anomaly as returned by the prediction and retrieval endpoints
#[derive(Debug, Clone, Serialize)]
pub struct AnomalyResponse {
    pub id: Uuid,
    pub num_equipement: String,
    pub description: Option<String>,
    pub service: Option<String>,
    pub status: String,
    pub ai_fiabilite_integrite_score: i16,
    pub ai_disponibilite_score: i16,
    pub ai_process_safety_score: i16,
    pub ai_criticality_level: i16,
    pub created_at: DateTime<Utc>,
}

impl From<Anomaly> for AnomalyResponse {
    fn from(a: Anomaly) -> Self {
        Self {
            id: a.id,
            num_equipement: a.num_equipement,
            description: a.description,
            service: a.service,
            status: a.status,
            ai_fiabilite_integrite_score: a.ai_fiabilite_integrite_score,
            ai_disponibilite_score: a.ai_disponibilite_score,
            ai_process_safety_score: a.ai_process_safety_score,
            ai_criticality_level: a.ai_criticality_level,
            created_at: a.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchPredictionResponse {
    pub predictions: Vec<AnomalyResponse>,
    pub total_processed: usize,
    pub import_batch_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct StoreSingleResponse {
    pub message: String,
    pub anomaly_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct StoreBatchResponse {
    pub message: String,
    pub total_stored: usize,
    pub import_batch_id: Uuid,
}

/// A scored record ready for insertion
#[derive(Debug, Clone, PartialEq)]
pub struct NewAnomaly {
    pub num_equipement: String,
    pub description: String,
    pub service: String,
    pub date_detection: Option<NaiveDate>,
    pub description_equipement: Option<String>,
    pub section_proprietaire: Option<String>,
    pub scores: ScoreTuple,
}

impl NewAnomaly {
    /// Pair the original record fields with their scores
    pub fn from_scored(record: AnomalyRecord, scores: ScoreTuple) -> Self {
        Self {
            num_equipement: record.equipment_id,
            description: record.description,
            service: record.system,
            date_detection: record.detected_on,
            description_equipement: record.equipment_description,
            section_proprietaire: record.owner_section,
            scores,
        }
    }
}

impl Anomaly {
    pub async fn insert<'e, E: PgExecutor<'e>>(
        executor: E,
        data: &NewAnomaly,
        import_batch_id: Option<Uuid>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Anomaly>(
            r#"
            INSERT INTO anomalies (
                num_equipement, description, service, date_detection,
                description_equipement, section_proprietaire, status,
                ai_fiabilite_integrite_score, ai_disponibilite_score,
                ai_process_safety_score, ai_criticality_level, import_batch_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#
        )
        .bind(&data.num_equipement)
        .bind(&data.description)
        .bind(&data.service)
        .bind(data.date_detection)
        .bind(&data.description_equipement)
        .bind(&data.section_proprietaire)
        .bind(INITIAL_STATUS)
        .bind(i16::from(data.scores.reliability()))
        .bind(i16::from(data.scores.availability()))
        .bind(i16::from(data.scores.process_safety()))
        .bind(i16::from(data.scores.criticality()))
        .bind(import_batch_id)
        .fetch_one(executor)
        .await
    }

    /// Record an import batch and all of its rows in one transaction
    ///
    /// Rows come back in input order. If any insert fails nothing is kept,
    /// including the batch row.
    pub async fn insert_batch(
        pool: &PgPool,
        source: BatchSource,
        filename: Option<&str>,
        items: &[NewAnomaly],
    ) -> Result<(ImportBatch, Vec<Self>), sqlx::Error> {
        let mut tx = pool.begin().await?;

        let import_batch = ImportBatch::create(&mut *tx, source, filename, items.len()).await?;

        let mut stored = Vec::with_capacity(items.len());
        for item in items {
            stored.push(Self::insert(&mut *tx, item, Some(import_batch.id)).await?);
        }

        tx.commit().await?;
        Ok((import_batch, stored))
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Anomaly>("SELECT * FROM anomalies WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Newest first
    pub async fn list_recent(pool: &PgPool, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Anomaly>(
            "SELECT * FROM anomalies ORDER BY created_at DESC LIMIT $1"
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_anomaly_maps_system_to_service() {
        let record = AnomalyRecord::new("EQ001", "Hydraulic", "Pressure drop detected in main valve")
            .owner_section("Maintenance");
        let new = NewAnomaly::from_scored(record, ScoreTuple::new(4, 5, 5));

        assert_eq!(new.service, "Hydraulic");
        assert_eq!(new.num_equipement, "EQ001");
        assert_eq!(new.section_proprietaire.as_deref(), Some("Maintenance"));
        assert_eq!(new.scores.criticality(), 14);
    }

    #[test]
    fn test_input_validation() {
        let input = AnomalyInput {
            num_equipement: "EQ001".into(),
            systeme: String::new(),
            description: "Leak".into(),
            date_detection: None,
            description_equipement: None,
            section_proprietaire: None,
        };

        let err = input.validate().unwrap_err();
        assert!(err.to_string().contains("systeme is required"));
    }

    /// Needs a scratch database; skipped unless TEST_DATABASE_URL is set
    async fn test_pool() -> Option<PgPool> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let pool = crate::db::create_pool(&url).await.ok()?;
        crate::db::run_migrations(&pool).await.ok()?;
        Some(pool)
    }

    #[tokio::test]
    async fn test_failed_batch_keeps_nothing() {
        let Some(pool) = test_pool().await else {
            return;
        };

        let filename = format!("rollback-{}.csv", Uuid::new_v4());
        let good = NewAnomaly::from_scored(
            AnomalyRecord::new("EQ001", "Hydraulic", "Pressure drop detected in main valve"),
            ScoreTuple::new(4, 5, 5),
        );
        // Longer than the num_equipement column allows
        let too_long = NewAnomaly::from_scored(
            AnomalyRecord::new("E".repeat(300), "Hydraulic", "Leak"),
            ScoreTuple::new(3, 3, 3),
        );

        let result = Anomaly::insert_batch(&pool, BatchSource::Csv, Some(&filename), &[good, too_long]).await;
        assert!(result.is_err());

        let batches: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM import_batches WHERE filename = $1")
            .bind(&filename)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(batches, 0);
    }

    #[tokio::test]
    async fn test_batch_rows_share_import_batch() {
        let Some(pool) = test_pool().await else {
            return;
        };

        let items: Vec<NewAnomaly> = ["EQ001", "EQ002"]
            .into_iter()
            .map(|id| {
                let record = AnomalyRecord::new(id, "Electrical", "Motor overheating issue");
                NewAnomaly::from_scored(record, ScoreTuple::new(4, 4, 5))
            })
            .collect();

        let (batch, stored) = Anomaly::insert_batch(&pool, BatchSource::Api, None, &items).await.unwrap();
        assert_eq!(batch.total_records, 2);
        assert_eq!(batch.source, "api");
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].num_equipement, "EQ001");
        assert!(stored.iter().all(|a| a.import_batch_id == Some(batch.id)));
    }
}
