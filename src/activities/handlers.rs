use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    activities::dto::{
        ActivityResponse, CreateActivityRequest, ListQuery, UpdateActivityRequest,
    },
    activities::repo::Activity,
    auth::jwt::AuthUser,
    error::{ApiError, ApiResult},
    state::AppState,
};

#[instrument(skip(state))]
pub async fn list_activities(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<ActivityResponse>>> {
    let activities = Activity::list(
        &state.db,
        user_id,
        query.kind.as_deref(),
        query.start_date,
        query.end_date,
        query.limit,
    )
    .await?;
    Ok(Json(
        activities.into_iter().map(ActivityResponse::from).collect(),
    ))
}

#[instrument(skip(state))]
pub async fn get_activity(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ActivityResponse>> {
    let activity = Activity::find(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("activity not found"))?;
    Ok(Json(ActivityResponse::from(activity)))
}

#[instrument(skip(state, payload))]
pub async fn create_activity(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateActivityRequest>,
) -> ApiResult<(StatusCode, Json<ActivityResponse>)> {
    let kind = payload.validate()?.to_string();

    let activity = Activity::create(&state.db, user_id, &kind, payload).await?;
    info!(user_id = %user_id, activity_id = %activity.id, kind = %kind, "activity created");
    Ok((StatusCode::CREATED, Json(ActivityResponse::from(activity))))
}

#[instrument(skip(state, payload))]
pub async fn update_activity(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateActivityRequest>,
) -> ApiResult<Json<ActivityResponse>> {
    let updated = Activity::update(&state.db, user_id, id, payload)
        .await?
        .ok_or_else(|| ApiError::not_found("activity not found"))?;
    Ok(Json(ActivityResponse::from(updated)))
}

#[instrument(skip(state))]
pub async fn delete_activity(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    if !Activity::delete(&state.db, user_id, id).await? {
        return Err(ApiError::not_found("activity not found"));
    }
    info!(user_id = %user_id, activity_id = %id, "activity deleted");
    Ok(Json(json!({ "success": true, "message": "activity deleted" })))
}
