//! Prediction handlers - score, store, return the stored rows

use axum::{
    extract::{Multipart, State},
    Json,
};
use uuid::Uuid;

use tams_scoring::AnomalyRecord;

use crate::ingest::{self, FileImport};
use crate::models::{
    Anomaly, AnomalyInput, AnomalyResponse, BatchPredictionResponse, BatchSource, NewAnomaly,
};
use crate::{AppError, AppResult, AppState};

/// Predict and store a single anomaly
pub async fn single(
    State(state): State<AppState>,
    Json(input): Json<AnomalyInput>,
) -> AppResult<Json<AnomalyResponse>> {
    let record = ingest::to_record(input)?;
    let stored = score_and_store_one(&state, record).await?;

    Ok(Json(stored.into()))
}

/// Predict and store a list of anomalies under one import batch
pub async fn batch(
    State(state): State<AppState>,
    Json(inputs): Json<Vec<AnomalyInput>>,
) -> AppResult<Json<Vec<AnomalyResponse>>> {
    if inputs.is_empty() {
        return Err(AppError::ValidationError("No anomalies provided".to_string()));
    }

    let records = ingest::to_records(inputs)?;
    let (_, stored) = score_and_store_batch(&state, records, BatchSource::Api, None).await?;

    Ok(Json(stored.into_iter().map(AnomalyResponse::from).collect()))
}

/// Predict and store every row of an uploaded CSV file
pub async fn csv_file(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<BatchPredictionResponse>> {
    let (filename, data) = read_upload(multipart).await?;

    if !filename.to_lowercase().ends_with(".csv") {
        return Err(AppError::ValidationError("File must be a CSV file".to_string()));
    }

    let import = ingest::parse_csv(&data)?;
    store_import(&state, import, BatchSource::Csv, &filename).await
}

/// Predict and store every row of the first sheet of an uploaded workbook
pub async fn excel_file(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<BatchPredictionResponse>> {
    let (filename, data) = read_upload(multipart).await?;

    let lowered = filename.to_lowercase();
    if !(lowered.ends_with(".xlsx") || lowered.ends_with(".xls")) {
        return Err(AppError::ValidationError(
            "File must be an Excel file (.xlsx or .xls)".to_string(),
        ));
    }

    // Workbook decoding is CPU-bound
    let import = tokio::task::spawn_blocking(move || ingest::parse_excel(&data)).await??;
    store_import(&state, import, BatchSource::Excel, &filename).await
}

async fn store_import(
    state: &AppState,
    import: FileImport,
    source: BatchSource,
    filename: &str,
) -> AppResult<Json<BatchPredictionResponse>> {
    if import.records.is_empty() {
        return Err(AppError::ValidationError("No valid anomaly data found in file".to_string()));
    }
    if import.skipped > 0 {
        tracing::warn!("{}: skipped {} invalid rows", filename, import.skipped);
    }

    let (batch_id, stored) =
        score_and_store_batch(state, import.records, source, Some(filename)).await?;

    Ok(Json(BatchPredictionResponse {
        total_processed: stored.len(),
        predictions: stored.into_iter().map(AnomalyResponse::from).collect(),
        import_batch_id: batch_id,
    }))
}

// ============================================================================
// SHARED
// ============================================================================

/// Pull the `file` field out of a multipart upload
pub(crate) async fn read_upload(mut multipart: Multipart) -> AppResult<(String, Vec<u8>)> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::ValidationError("Uploaded file has no name".to_string()))?;
        let data = field.bytes().await?;

        return Ok((filename, data.to_vec()));
    }

    Err(AppError::ValidationError("Missing 'file' field".to_string()))
}

pub(crate) async fn score_and_store_one(state: &AppState, record: AnomalyRecord) -> AppResult<Anomaly> {
    let engine = state.engine.clone();
    let (record, scores) = tokio::task::spawn_blocking(move || {
        let scores = engine.score_one(&record);
        (record, scores)
    })
    .await?;

    let stored = Anomaly::insert(&state.pool, &NewAnomaly::from_scored(record, scores), None).await?;
    tracing::info!(
        "Scored anomaly {} ({}): criticality {}",
        stored.id,
        stored.num_equipement,
        stored.ai_criticality_level
    );

    Ok(stored)
}

pub(crate) async fn score_and_store_batch(
    state: &AppState,
    records: Vec<AnomalyRecord>,
    source: BatchSource,
    filename: Option<&str>,
) -> AppResult<(Uuid, Vec<Anomaly>)> {
    let engine = state.engine.clone();
    let (records, scores) = tokio::task::spawn_blocking(move || {
        let scores = engine.score_many(&records);
        (records, scores)
    })
    .await?;

    let items: Vec<NewAnomaly> = records
        .into_iter()
        .zip(scores)
        .map(|(record, scores)| NewAnomaly::from_scored(record, scores))
        .collect();

    let (import_batch, stored) = Anomaly::insert_batch(&state.pool, source, filename, &items).await?;

    tracing::info!(
        "Stored {} anomalies in batch {} ({})",
        stored.len(),
        import_batch.id,
        source.as_str()
    );

    Ok((import_batch.id, stored))
}
