//! Anomaly retrieval handlers

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::models::{Anomaly, AnomalyResponse};
use crate::{AppError, AppResult, AppState};

/// Most recent anomalies, newest first
pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<AnomalyResponse>>> {
    let anomalies = Anomaly::list_recent(&state.pool, state.config.list_limit).await?;
    Ok(Json(anomalies.into_iter().map(AnomalyResponse::from).collect()))
}

/// Get single anomaly
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<AnomalyResponse>> {
    let anomaly = Anomaly::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Anomaly not found".to_string()))?;

    Ok(Json(anomaly.into()))
}
