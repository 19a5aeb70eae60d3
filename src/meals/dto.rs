use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ApiError;
use crate::meals::repo::Meal;
use crate::patch::Patch;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub start_date: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_date: Option<OffsetDateTime>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMealRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub carbs: Option<f64>,
    pub protein: Option<f64>,
    pub fat: Option<f64>,
    pub calories: Option<f64>,
    pub quantity: Option<f64>,
    pub photo: Option<String>,
    pub meal_type: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub timestamp: Option<OffsetDateTime>,
}

impl CreateMealRequest {
    /// Lists every missing required field, not just the first.
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut missing = Vec::new();
        if self.name.as_deref().map_or(true, str::is_empty) {
            missing.push("name");
        }
        if self.carbs.is_none() {
            missing.push("carbs");
        }
        if self.protein.is_none() {
            missing.push("protein");
        }
        if self.fat.is_none() {
            missing.push("fat");
        }
        if self.calories.is_none() {
            missing.push("calories");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ApiError::validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )))
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMealRequest {
    #[serde(default)]
    pub name: Patch<String>,
    #[serde(default)]
    pub description: Patch<String>,
    #[serde(default)]
    pub carbs: Patch<f64>,
    #[serde(default)]
    pub protein: Patch<f64>,
    #[serde(default)]
    pub fat: Patch<f64>,
    #[serde(default)]
    pub calories: Patch<f64>,
    #[serde(default)]
    pub quantity: Patch<f64>,
    #[serde(default)]
    pub photo: Patch<String>,
    #[serde(default, deserialize_with = "crate::patch::rfc3339_patch")]
    pub timestamp: Patch<OffsetDateTime>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub carbs: f64,
    pub protein: f64,
    pub fat: f64,
    pub calories: f64,
    pub quantity: f64,
    pub photo: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl From<Meal> for MealResponse {
    fn from(m: Meal) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            name: m.name,
            description: m.description,
            carbs: m.carbs,
            protein: m.protein,
            fat: m.fat,
            calories: m.calories,
            quantity: m.quantity,
            photo: m.photo,
            timestamp: m.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_meal_lists_all_missing_fields() {
        let req: CreateMealRequest =
            serde_json::from_str(r#"{ "name": "toast", "carbs": 30 }"#).unwrap();
        let err = req.validate().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("protein"));
        assert!(msg.contains("fat"));
        assert!(msg.contains("calories"));
        assert!(!msg.contains("name"));
        assert!(!msg.contains("carbs"));
    }

    #[test]
    fn create_meal_rejects_empty_name() {
        let req: CreateMealRequest = serde_json::from_str(
            r#"{ "name": "", "carbs": 1, "protein": 1, "fat": 1, "calories": 1 }"#,
        )
        .unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn create_meal_accepts_complete_payload() {
        let req: CreateMealRequest = serde_json::from_str(
            r#"{ "name": "toast", "carbs": 30, "protein": 5, "fat": 2, "calories": 160 }"#,
        )
        .unwrap();
        assert!(req.validate().is_ok());
    }
}
