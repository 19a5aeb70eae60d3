mod dto;
pub mod handlers;
pub mod repo;

pub use dto::PredictionResponse;

use std::sync::Arc;
use std::time::Duration;

use crate::ratelimit::{limit_requests, RateLimiter};
use crate::state::AppState;
use axum::{middleware, routing::get, routing::post, Router};

const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
const RATE_LIMIT_MAX_REQUESTS: u32 = 30;

pub fn router() -> Router<AppState> {
    let limiter = Arc::new(RateLimiter::new(RATE_LIMIT_WINDOW, RATE_LIMIT_MAX_REQUESTS));

    Router::new()
        .route("/insulin", get(handlers::list_doses).post(handlers::create_dose))
        .route(
            "/insulin/predictions",
            get(handlers::list_predictions),
        )
        .route(
            "/insulin/predictions/:id",
            axum::routing::put(handlers::apply_prediction).delete(handlers::delete_prediction),
        )
        .route("/insulin/predict", post(handlers::predict_dose))
        .route(
            "/insulin/:id",
            get(handlers::get_dose)
                .put(handlers::update_dose)
                .delete(handlers::delete_dose),
        )
        .layer(middleware::from_fn_with_state(limiter, limit_requests))
}
