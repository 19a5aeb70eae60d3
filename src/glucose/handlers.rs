use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::jwt::AuthUser,
    error::{ApiError, ApiResult},
    glucose::dto::{
        compute_stats, CreateReadingRequest, GlucoseStats, ListQuery, ReadingResponse,
        UpdateReadingRequest,
    },
    glucose::repo::GlucoseReading,
    state::AppState,
    users::repo::User,
};

async fn target_for(state: &AppState, user_id: Uuid) -> ApiResult<Option<(f64, f64)>> {
    let user = User::find_by_id(&state.db, user_id).await?;
    Ok(user.map(|u| (u.min_target_glucose, u.max_target_glucose)))
}

#[instrument(skip(state))]
pub async fn list_readings(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<ReadingResponse>>> {
    let readings = GlucoseReading::list(
        &state.db,
        user_id,
        query.start_date,
        query.end_date,
        query.limit,
    )
    .await?;
    Ok(Json(readings.into_iter().map(ReadingResponse::plain).collect()))
}

#[instrument(skip(state))]
pub async fn get_reading(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ReadingResponse>> {
    let reading = GlucoseReading::find(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("glucose reading not found"))?;
    let target = target_for(&state, user_id).await?;
    Ok(Json(ReadingResponse::with_status(reading, target)))
}

#[instrument(skip(state, payload))]
pub async fn create_reading(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateReadingRequest>,
) -> ApiResult<(StatusCode, Json<ReadingResponse>)> {
    let Some(value) = payload.value else {
        return Err(ApiError::validation("missing required fields: value"));
    };

    let target = target_for(&state, user_id).await?;
    let reading =
        GlucoseReading::create(&state.db, user_id, value, payload.notes, payload.timestamp)
            .await?;

    info!(user_id = %user_id, reading_id = %reading.id, value, "glucose reading created");
    Ok((
        StatusCode::CREATED,
        Json(ReadingResponse::with_status(reading, target)),
    ))
}

#[instrument(skip(state, payload))]
pub async fn update_reading(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateReadingRequest>,
) -> ApiResult<Json<ReadingResponse>> {
    let updated = GlucoseReading::update(&state.db, user_id, id, payload)
        .await?
        .ok_or_else(|| ApiError::not_found("glucose reading not found"))?;
    Ok(Json(ReadingResponse::plain(updated)))
}

#[instrument(skip(state))]
pub async fn delete_reading(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    if !GlucoseReading::delete(&state.db, user_id, id).await? {
        return Err(ApiError::not_found("glucose reading not found"));
    }
    info!(user_id = %user_id, reading_id = %id, "glucose reading deleted");
    Ok(Json(json!({ "success": true, "message": "glucose reading deleted" })))
}

#[instrument(skip(state))]
pub async fn get_stats(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<GlucoseStats>> {
    let readings = GlucoseReading::list(
        &state.db,
        user_id,
        query.start_date,
        query.end_date,
        query.limit,
    )
    .await?;
    let target = target_for(&state, user_id).await?;
    let values: Vec<f64> = readings.iter().map(|r| r.value).collect();
    Ok(Json(compute_stats(&values, target)))
}
