mod dto;
pub mod handlers;
pub mod repo;

pub use dto::UserProfile;

use crate::state::AppState;
use axum::{
    routing::{delete, get, post, put},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/register", post(handlers::register))
        .route("/users/login", post(handlers::login))
        .route(
            "/users/profile",
            get(handlers::get_profile).put(handlers::update_profile),
        )
        .route("/users/glucose-target", put(handlers::update_glucose_target))
        .route("/users", delete(handlers::delete_user))
}
