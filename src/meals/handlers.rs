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
    meals::dto::{CreateMealRequest, ListQuery, MealResponse, UpdateMealRequest},
    meals::repo::Meal,
    state::AppState,
};

#[instrument(skip(state))]
pub async fn list_meals(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let meals = Meal::list(
        &state.db,
        user_id,
        query.start_date,
        query.end_date,
        query.limit,
    )
    .await?;
    let data: Vec<MealResponse> = meals.into_iter().map(MealResponse::from).collect();
    Ok(Json(json!({ "success": true, "data": data })))
}

#[instrument(skip(state))]
pub async fn get_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MealResponse>> {
    let meal = Meal::find(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("meal not found"))?;
    Ok(Json(MealResponse::from(meal)))
}

#[instrument(skip(state, payload))]
pub async fn create_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateMealRequest>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    payload.validate()?;

    let meal = Meal::create(&state.db, user_id, payload).await?;
    info!(user_id = %user_id, meal_id = %meal.id, "meal created");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": MealResponse::from(meal) })),
    ))
}

#[instrument(skip(state, payload))]
pub async fn update_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateMealRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let updated = Meal::update(&state.db, user_id, id, payload)
        .await?
        .ok_or_else(|| ApiError::not_found("meal not found"))?;
    Ok(Json(json!({ "success": true, "data": MealResponse::from(updated) })))
}

#[instrument(skip(state))]
pub async fn delete_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    if !Meal::delete(&state.db, user_id, id).await? {
        return Err(ApiError::not_found("meal not found"));
    }
    info!(user_id = %user_id, meal_id = %id, "meal deleted");
    Ok(Json(json!({ "success": true, "message": "meal deleted" })))
}
