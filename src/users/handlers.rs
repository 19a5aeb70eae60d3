use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    Json,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        jwt::{AuthUser, JwtKeys},
        password::{hash_password, verify_password},
    },
    error::{ApiError, ApiResult},
    state::AppState,
    users::dto::{
        AuthResponse, GlucoseProfile, LoginRequest, RegisterRequest, UpdateGlucoseTargetRequest,
        UpdateProfileRequest, UserProfile,
    },
    users::repo::{NewUser, User},
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Collects every missing registration field into one error message.
fn validate_registration(payload: &RegisterRequest) -> Result<(), ApiError> {
    let mut missing = Vec::new();
    if payload.email.is_none() {
        missing.push("email");
    }
    if payload.password.is_none() {
        missing.push("password");
    }
    if payload.first_name.is_none() {
        missing.push("firstName");
    }
    if payload.last_name.is_none() {
        missing.push("lastName");
    }
    if payload.birth_day.is_none() {
        missing.push("birthDay");
    }
    if payload.birth_month.is_none() {
        missing.push("birthMonth");
    }
    if payload.birth_year.is_none() {
        missing.push("birthYear");
    }
    if payload.weight.is_none() {
        missing.push("weight");
    }
    if payload.height.is_none() {
        missing.push("height");
    }
    if !missing.is_empty() {
        return Err(ApiError::validation(format!(
            "missing required fields: {}",
            missing.join(", ")
        )));
    }
    Ok(())
}

/// Target band rules: min below max, min at least 50 mg/dL, max within
/// [0, 300] mg/dL.
pub(crate) fn validate_target_range(min_target: f64, max_target: f64) -> Result<(), ApiError> {
    if min_target >= max_target || min_target < 50.0 || max_target < 0.0 || max_target > 300.0 {
        return Err(ApiError::validation(
            "min target must be less than max target and within valid ranges (min: 50, max: 300)",
        ));
    }
    Ok(())
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    validate_registration(&payload)?;

    let email = payload.email.unwrap_or_default().trim().to_lowercase();
    let password = payload.password.unwrap_or_default();

    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(ApiError::validation("invalid email"));
    }
    if password.len() < 8 {
        return Err(ApiError::validation("password too short"));
    }

    if User::find_by_email(&state.db, &email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(ApiError::conflict("email already registered"));
    }

    let hash = hash_password(&password)?;
    let profile = payload.glucose_profile.unwrap_or(GlucoseProfile::Normal);
    let (min_target, max_target) = profile.target_range();

    let user = User::create(
        &state.db,
        NewUser {
            email: &email,
            password_hash: &hash,
            first_name: payload.first_name.as_deref().unwrap_or_default(),
            last_name: payload.last_name.as_deref().unwrap_or_default(),
            birth_day: payload.birth_day.unwrap_or_default(),
            birth_month: payload.birth_month.unwrap_or_default(),
            birth_year: payload.birth_year.unwrap_or_default(),
            weight: payload.weight.unwrap_or_default(),
            height: payload.height.unwrap_or_default(),
            glucose_profile: profile.as_str(),
            min_target_glucose: min_target,
            max_target_glucose: max_target,
        },
    )
    .await?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id)?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: UserProfile::from(user),
            token,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    payload.email = payload.email.trim().to_lowercase();

    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or_else(|| {
            warn!(email = %payload.email, "login unknown email");
            ApiError::Auth("invalid credentials".into())
        })?;

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(ApiError::Auth("invalid credentials".into()));
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(AuthResponse {
        user: UserProfile::from(user),
        token,
    }))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<UserProfile>> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("user not found"))?;
    Ok(Json(UserProfile::from(user)))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> ApiResult<Json<UserProfile>> {
    let mut user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("user not found"))?;

    if let Some(email) = payload.email.set_value() {
        let email = email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(ApiError::validation("invalid email"));
        }
        user.email = email;
    }
    if let Some(password) = payload.password.set_value() {
        if password.len() < 8 {
            return Err(ApiError::validation("password too short"));
        }
        user.password_hash = hash_password(password)?;
    }
    user.first_name = payload.first_name.value_or(user.first_name);
    user.last_name = payload.last_name.value_or(user.last_name);
    user.birth_day = payload.birth_day.value_or(user.birth_day);
    user.birth_month = payload.birth_month.value_or(user.birth_month);
    user.birth_year = payload.birth_year.value_or(user.birth_year);
    user.weight = payload.weight.value_or(user.weight);
    user.height = payload.height.value_or(user.height);
    if let Some(profile) = payload.glucose_profile.set_value() {
        user.glucose_profile = profile.as_str().to_string();
    }
    user.profile_image = payload.profile_image.resolve(user.profile_image);

    let updated = user.update_profile(&state.db).await?;
    info!(user_id = %updated.id, "profile updated");
    Ok(Json(UserProfile::from(updated)))
}

#[instrument(skip(state, payload))]
pub async fn update_glucose_target(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateGlucoseTargetRequest>,
) -> ApiResult<Json<UserProfile>> {
    let (Some(min_target), Some(max_target)) = (payload.min_target, payload.max_target) else {
        return Err(ApiError::validation(
            "missing required fields: minTarget, maxTarget",
        ));
    };
    validate_target_range(min_target, max_target)?;

    let user = User::update_target_range(&state.db, user_id, min_target, max_target)
        .await?
        .ok_or_else(|| ApiError::not_found("user not found"))?;

    info!(user_id = %user.id, min_target, max_target, "glucose target updated");
    Ok(Json(UserProfile::from(user)))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<serde_json::Value>> {
    User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("user not found"))?;

    User::delete_cascade(&state.db, user_id).await?;
    info!(user_id = %user_id, "user deleted");
    Ok(Json(json!({ "success": true, "message": "user deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("user@example.com"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("two words@example.com"));
    }

    #[test]
    fn registration_lists_every_missing_field() {
        let payload: RegisterRequest = serde_json::from_str(r#"{ "email": "a@b.c" }"#).unwrap();
        let err = validate_registration(&payload).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("password"));
        assert!(msg.contains("firstName"));
        assert!(msg.contains("weight"));
        assert!(!msg.contains("email,"));
    }

    #[test]
    fn inverted_target_range_is_rejected() {
        assert!(validate_target_range(150.0, 100.0).is_err());
    }

    #[test]
    fn target_min_below_fifty_is_rejected() {
        assert!(validate_target_range(49.0, 200.0).is_err());
    }

    #[test]
    fn target_max_above_three_hundred_is_rejected() {
        assert!(validate_target_range(70.0, 301.0).is_err());
    }

    #[test]
    fn sane_target_range_is_accepted() {
        assert!(validate_target_range(70.0, 180.0).is_ok());
        assert!(validate_target_range(50.0, 300.0).is_ok());
    }
}
