mod dto;
pub mod handlers;
pub mod repo;

pub use dto::ReadingResponse;

use crate::state::AppState;
use axum::{routing::get, Router};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/glucose", get(handlers::list_readings).post(handlers::create_reading))
        .route("/glucose/stats", get(handlers::get_stats))
        .route(
            "/glucose/:id",
            get(handlers::get_reading)
                .put(handlers::update_reading)
                .delete(handlers::delete_reading),
        )
}
