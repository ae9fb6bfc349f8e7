use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    middleware::RequestId,
    models::{
        HyperparameterOverrides, Item, ItemId, Rating, RatingChange, RatingChanged,
        RecalculationReport, ScoredItem, UserId,
    },
    services::ratings,
};

use super::AppState;

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct SaveRatingRequest {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub rating: f64,
}

#[derive(Debug, Serialize)]
pub struct SaveRatingResponse {
    pub change: RatingChange,
    pub report: RecalculationReport,
}

#[derive(Debug, Deserialize)]
pub struct SaveItemRequest {
    pub id: ItemId,
    pub name: String,
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Current top-N list for one user
///
/// Users without stored recommendations get an empty list.
pub async fn get_recommendations(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(user_id): Path<UserId>,
) -> AppResult<Json<Vec<ScoredItem>>> {
    let recommendations = state.recommendations.for_user(user_id).await?;

    tracing::info!(
        request_id = %request_id,
        user_id,
        count = recommendations.len(),
        "Served recommendations"
    );

    Ok(Json(recommendations))
}

/// Runs the full pipeline and answers once the store has been replaced
///
/// An optional JSON body overrides hyperparameters for this run only.
pub async fn trigger_recalculation(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    body: Bytes,
) -> AppResult<Json<RecalculationReport>> {
    let overrides: HyperparameterOverrides = if body.iter().all(u8::is_ascii_whitespace) {
        HyperparameterOverrides::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::InvalidInput(format!("Invalid overrides: {}", e)))?
    };

    tracing::info!(request_id = %request_id, overrides = ?overrides, "Recalculation requested");

    let report = state.recalculator.recalculate(&overrides).await?;
    Ok(Json(report))
}

/// Synchronous notification that a rating was created or updated
pub async fn rating_changed(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(event): Json<RatingChanged>,
) -> AppResult<Json<RecalculationReport>> {
    tracing::info!(
        request_id = %request_id,
        user_id = event.user_id,
        item_id = event.item_id,
        "Rating change event received"
    );

    let report = state.recalculator.on_rating_changed(&event).await?;
    Ok(Json(report))
}

/// Stores a rating, then recalculates before acknowledging the write
pub async fn save_rating(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<SaveRatingRequest>,
) -> AppResult<(StatusCode, Json<SaveRatingResponse>)> {
    let rating = Rating::new(request.user_id, request.item_id, request.rating);
    let (change, report) =
        ratings::save_rating(state.rating_writer.as_ref(), &state.recalculator, rating).await?;

    tracing::info!(
        request_id = %request_id,
        user_id = request.user_id,
        item_id = request.item_id,
        change = ?change,
        "Rating saved"
    );

    let status = match change {
        RatingChange::Created => StatusCode::CREATED,
        RatingChange::Updated => StatusCode::OK,
    };
    Ok((status, Json(SaveRatingResponse { change, report })))
}

/// Creates or renames an item in the catalog
pub async fn save_item(
    State(state): State<AppState>,
    Json(request): Json<SaveItemRequest>,
) -> AppResult<StatusCode> {
    if request.name.trim().is_empty() {
        return Err(AppError::InvalidInput("item name must not be empty".to_string()));
    }
    state
        .catalog
        .upsert_item(Item::new(request.id, request.name))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
