mod dto;
pub mod handlers;
pub mod repo;

pub use dto::ActivityResponse;

use crate::state::AppState;
use axum::{routing::get, Router};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/activities",
            get(handlers::list_activities).post(handlers::create_activity),
        )
        .route(
            "/activities/:id",
            get(handlers::get_activity)
                .put(handlers::update_activity)
                .delete(handlers::delete_activity),
        )
}
