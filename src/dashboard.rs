//! Single aggregated read for the home screen: profile, recent readings,
//! recent feed entries and the prediction history in one response.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::instrument;

use crate::{
    activities::repo::Activity,
    activities::ActivityResponse,
    auth::jwt::AuthUser,
    error::{ApiError, ApiResult},
    glucose::repo::GlucoseReading,
    glucose::ReadingResponse,
    insulin::repo::InsulinPrediction,
    insulin::PredictionResponse,
    state::AppState,
    users::repo::User,
    users::UserProfile,
};

const DASHBOARD_LIMIT: i64 = 100;

pub fn router() -> Router<AppState> {
    Router::new().route("/dashboard", get(get_dashboard))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardQuery {
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub start_date: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_date: Option<OffsetDateTime>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub user: UserProfile,
    pub glucose_readings: Vec<ReadingResponse>,
    pub activities: Vec<ActivityResponse>,
    pub predictions: Vec<PredictionResponse>,
}

#[instrument(skip(state))]
async fn get_dashboard(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<DashboardQuery>,
) -> ApiResult<Json<DashboardResponse>> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("user not found"))?;
    let target = Some((user.min_target_glucose, user.max_target_glucose));

    let readings = GlucoseReading::list(
        &state.db,
        user_id,
        query.start_date,
        query.end_date,
        DASHBOARD_LIMIT,
    )
    .await?;
    let activities = Activity::list(
        &state.db,
        user_id,
        None,
        query.start_date,
        query.end_date,
        DASHBOARD_LIMIT,
    )
    .await?;
    let predictions = InsulinPrediction::list(&state.db, user_id).await?;

    Ok(Json(DashboardResponse {
        user: UserProfile::from(user),
        glucose_readings: readings
            .into_iter()
            .map(|r| ReadingResponse::with_status(r, target))
            .collect(),
        activities: activities.into_iter().map(ActivityResponse::from).collect(),
        predictions: predictions
            .into_iter()
            .map(PredictionResponse::from)
            .collect(),
    }))
}
