use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::activities::repo::Activity;
use crate::error::ApiError;
use crate::patch::Patch;

/// Feed entry kinds; the first three mirror specialized records, the rest
/// are free-standing exercise entries.
pub const ACTIVITY_TYPES: [&str; 9] = [
    "glucose", "meal", "insulin", "exercise", "walk", "run", "bike", "swim", "other",
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub start_date: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_date: Option<OffsetDateTime>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateActivityRequest {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub value: Option<f64>,
    pub meal_type: Option<String>,
    pub carbs: Option<f64>,
    pub units: Option<f64>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub timestamp: Option<OffsetDateTime>,
}

impl CreateActivityRequest {
    pub fn validate(&self) -> Result<&str, ApiError> {
        let Some(kind) = self.kind.as_deref() else {
            return Err(ApiError::validation("missing required fields: type"));
        };
        if !ACTIVITY_TYPES.contains(&kind) {
            return Err(ApiError::validation(format!(
                "unknown activity type: {kind}"
            )));
        }
        Ok(kind)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateActivityRequest {
    #[serde(default)]
    pub value: Patch<f64>,
    #[serde(default)]
    pub meal_type: Patch<String>,
    #[serde(default)]
    pub carbs: Patch<f64>,
    #[serde(default)]
    pub units: Patch<f64>,
    #[serde(default, deserialize_with = "crate::patch::rfc3339_patch")]
    pub timestamp: Patch<OffsetDateTime>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: Option<f64>,
    pub meal_type: Option<String>,
    pub carbs: Option<f64>,
    pub units: Option<f64>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl From<Activity> for ActivityResponse {
    fn from(a: Activity) -> Self {
        Self {
            id: a.id,
            user_id: a.user_id,
            kind: a.kind,
            value: a.value,
            meal_type: a.meal_type,
            carbs: a.carbs,
            units: a.units,
            timestamp: a.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_requires_known_type() {
        let req: CreateActivityRequest = serde_json::from_str(r#"{ "type": "run" }"#).unwrap();
        assert_eq!(req.validate().unwrap(), "run");

        let req: CreateActivityRequest =
            serde_json::from_str(r#"{ "type": "skydiving" }"#).unwrap();
        assert!(req.validate().is_err());

        let req: CreateActivityRequest = serde_json::from_str(r#"{ "value": 3 }"#).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn kind_deserializes_from_type_key() {
        let req: CreateActivityRequest =
            serde_json::from_str(r#"{ "type": "insulin", "units": 4.0 }"#).unwrap();
        assert_eq!(req.kind.as_deref(), Some("insulin"));
        assert_eq!(req.units, Some(4.0));
    }
}
