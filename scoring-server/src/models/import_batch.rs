//! Import batch model

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

/// Where a batch came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchSource {
    Api,
    Csv,
    Excel,
}

impl BatchSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchSource::Api => "api",
            BatchSource::Csv => "csv",
            BatchSource::Excel => "excel",
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ImportBatch {
    pub id: Uuid,
    pub source: String,
    pub filename: Option<String>,
    pub total_records: i32,
    pub created_at: DateTime<Utc>,
}

impl ImportBatch {
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        source: BatchSource,
        filename: Option<&str>,
        total_records: usize,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, ImportBatch>(
            r#"
            INSERT INTO import_batches (source, filename, total_records)
            VALUES ($1, $2, $3)
            RETURNING *
            "#
        )
        .bind(source.as_str())
        .bind(filename)
        .bind(i32::try_from(total_records).unwrap_or(i32::MAX))
        .fetch_one(executor)
        .await
    }
}
