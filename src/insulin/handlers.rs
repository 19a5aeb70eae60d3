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
    insulin::dto::{
        ApplyPredictionRequest, CreateDoseRequest, DoseResponse, ListQuery, PredictionRequest,
        PredictionResponse, UpdateDoseRequest,
    },
    insulin::repo::{InsulinDose, InsulinPrediction},
    predict::DoseFeatures,
    state::AppState,
};

#[instrument(skip(state))]
pub async fn list_doses(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<DoseResponse>>> {
    let doses = InsulinDose::list(
        &state.db,
        user_id,
        query.start_date,
        query.end_date,
        query.limit,
    )
    .await?;
    Ok(Json(doses.into_iter().map(DoseResponse::from).collect()))
}

#[instrument(skip(state))]
pub async fn get_dose(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DoseResponse>> {
    let dose = InsulinDose::find(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("insulin dose not found"))?;
    Ok(Json(DoseResponse::from(dose)))
}

#[instrument(skip(state, payload))]
pub async fn create_dose(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateDoseRequest>,
) -> ApiResult<(StatusCode, Json<DoseResponse>)> {
    let units = payload
        .units
        .ok_or_else(|| ApiError::validation("missing required fields: units"))?;
    if units <= 0.0 {
        return Err(ApiError::validation("units must be positive"));
    }

    let dose = InsulinDose::create(&state.db, user_id, units, payload).await?;
    info!(user_id = %user_id, dose_id = %dose.id, "insulin dose created");
    Ok((StatusCode::CREATED, Json(DoseResponse::from(dose))))
}

#[instrument(skip(state, payload))]
pub async fn update_dose(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDoseRequest>,
) -> ApiResult<Json<DoseResponse>> {
    if let Some(units) = payload.units.set_value() {
        if *units <= 0.0 {
            return Err(ApiError::validation("units must be positive"));
        }
    }

    let updated = InsulinDose::update(&state.db, user_id, id, payload)
        .await?
        .ok_or_else(|| ApiError::not_found("insulin dose not found"))?;
    Ok(Json(DoseResponse::from(updated)))
}

#[instrument(skip(state))]
pub async fn delete_dose(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    if !InsulinDose::delete(&state.db, user_id, id).await? {
        return Err(ApiError::not_found("insulin dose not found"));
    }
    info!(user_id = %user_id, dose_id = %id, "insulin dose deleted");
    Ok(Json(json!({ "success": true, "message": "insulin dose deleted" })))
}

/// Calls the external dose model, then persists the prediction together
/// with its feed mirror.
#[instrument(skip(state, payload))]
pub async fn predict_dose(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<PredictionRequest>,
) -> ApiResult<(StatusCode, Json<PredictionResponse>)> {
    payload.validate()?;
    let date = payload.date.unwrap_or_else(time::OffsetDateTime::now_utc);
    let carbs = payload.carbs.unwrap_or_default();

    let features = DoseFeatures {
        date,
        cgm_prev: payload.cgm_prev.clone(),
        carbs,
        insulin_on_board: payload.insulin_on_board,
    };
    let recommendation = state.predictor.predict(&features).await?;

    let prediction =
        InsulinPrediction::create(&state.db, user_id, payload, date, carbs, &recommendation)
            .await?;
    info!(
        user_id = %user_id,
        prediction_id = %prediction.id,
        recommended = prediction.recommended_dose,
        "dose prediction stored"
    );
    Ok((
        StatusCode::CREATED,
        Json(PredictionResponse::from(prediction)),
    ))
}

#[instrument(skip(state))]
pub async fn list_predictions(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<Vec<PredictionResponse>>> {
    let predictions = InsulinPrediction::list(&state.db, user_id).await?;
    Ok(Json(
        predictions
            .into_iter()
            .map(PredictionResponse::from)
            .collect(),
    ))
}

/// Records the dose the user actually took and, optionally, the CGM trace
/// observed afterwards.
#[instrument(skip(state, payload))]
pub async fn apply_prediction(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ApplyPredictionRequest>,
) -> ApiResult<Json<PredictionResponse>> {
    if payload.apply_dose.is_none() && payload.cgm_post.is_empty() {
        return Err(ApiError::validation(
            "at least one of applyDose or cgmPost is required",
        ));
    }

    let prediction =
        InsulinPrediction::set_result(&state.db, user_id, id, payload.apply_dose, payload.cgm_post)
            .await?
            .ok_or_else(|| ApiError::not_found("prediction not found"))?;
    Ok(Json(PredictionResponse::from(prediction)))
}

#[instrument(skip(state))]
pub async fn delete_prediction(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    if !InsulinPrediction::delete(&state.db, user_id, id).await? {
        return Err(ApiError::not_found("prediction not found"));
    }
    info!(user_id = %user_id, prediction_id = %id, "prediction deleted");
    Ok(Json(json!({ "success": true, "message": "prediction deleted" })))
}
