//! Storage handlers - score and store, return a confirmation only

use axum::{extract::State, Json};

use super::predictions::{score_and_store_batch, score_and_store_one};
use crate::ingest;
use crate::models::{AnomalyInput, BatchSource, StoreBatchResponse, StoreSingleResponse};
use crate::{AppError, AppResult, AppState};

pub async fn single(
    State(state): State<AppState>,
    Json(input): Json<AnomalyInput>,
) -> AppResult<Json<StoreSingleResponse>> {
    let record = ingest::to_record(input)?;
    let stored = score_and_store_one(&state, record).await?;

    Ok(Json(StoreSingleResponse {
        message: "Anomaly stored successfully".to_string(),
        anomaly_id: stored.id,
    }))
}

pub async fn batch(
    State(state): State<AppState>,
    Json(inputs): Json<Vec<AnomalyInput>>,
) -> AppResult<Json<StoreBatchResponse>> {
    if inputs.is_empty() {
        return Err(AppError::ValidationError("No anomalies provided".to_string()));
    }

    let records = ingest::to_records(inputs)?;
    let (batch_id, stored) = score_and_store_batch(&state, records, BatchSource::Api, None).await?;

    Ok(Json(StoreBatchResponse {
        message: format!("{} anomalies stored successfully", stored.len()),
        total_stored: stored.len(),
        import_batch_id: batch_id,
    }))
}
