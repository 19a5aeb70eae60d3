use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::patch::Patch;
use crate::users::repo::User;

/// Glucose tendency declared at registration; fixes the initial target band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlucoseProfile {
    Hypo,
    Normal,
    Hyper,
}

impl GlucoseProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            GlucoseProfile::Hypo => "hypo",
            GlucoseProfile::Normal => "normal",
            GlucoseProfile::Hyper => "hyper",
        }
    }

    /// Initial `[min, max]` target range in mg/dL.
    pub fn target_range(&self) -> (f64, f64) {
        match self {
            GlucoseProfile::Hypo => (80.0, 160.0),
            GlucoseProfile::Hyper => (100.0, 200.0),
            GlucoseProfile::Normal => (70.0, 180.0),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub birth_day: Option<i32>,
    pub birth_month: Option<i32>,
    pub birth_year: Option<i32>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub glucose_profile: Option<GlucoseProfile>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub email: Patch<String>,
    #[serde(default)]
    pub password: Patch<String>,
    #[serde(default)]
    pub first_name: Patch<String>,
    #[serde(default)]
    pub last_name: Patch<String>,
    #[serde(default)]
    pub birth_day: Patch<i32>,
    #[serde(default)]
    pub birth_month: Patch<i32>,
    #[serde(default)]
    pub birth_year: Patch<i32>,
    #[serde(default)]
    pub weight: Patch<f64>,
    #[serde(default)]
    pub height: Patch<f64>,
    #[serde(default)]
    pub glucose_profile: Patch<GlucoseProfile>,
    #[serde(default)]
    pub profile_image: Patch<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGlucoseTargetRequest {
    pub min_target: Option<f64>,
    pub max_target: Option<f64>,
}

/// Public user shape; never carries the password hash.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub name: String,
    pub birth_day: i32,
    pub birth_month: i32,
    pub birth_year: i32,
    pub weight: f64,
    pub height: f64,
    pub glucose_profile: String,
    pub min_target_glucose: f64,
    pub max_target_glucose: f64,
    pub profile_image: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<User> for UserProfile {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: format!("{} {}", u.first_name, u.last_name),
            email: u.email,
            first_name: u.first_name,
            last_name: u.last_name,
            birth_day: u.birth_day,
            birth_month: u.birth_month,
            birth_year: u.birth_year,
            weight: u.weight,
            height: u.height,
            glucose_profile: u.glucose_profile,
            min_target_glucose: u.min_target_glucose,
            max_target_glucose: u.max_target_glucose,
            profile_image: u.profile_image,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    #[serde(flatten)]
    pub user: UserProfile,
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_determines_initial_target_range() {
        assert_eq!(GlucoseProfile::Hypo.target_range(), (80.0, 160.0));
        assert_eq!(GlucoseProfile::Hyper.target_range(), (100.0, 200.0));
        assert_eq!(GlucoseProfile::Normal.target_range(), (70.0, 180.0));
    }

    #[test]
    fn glucose_profile_parses_lowercase() {
        let p: GlucoseProfile = serde_json::from_str(r#""hypo""#).unwrap();
        assert_eq!(p, GlucoseProfile::Hypo);
        assert!(serde_json::from_str::<GlucoseProfile>(r#""extreme""#).is_err());
    }
}
