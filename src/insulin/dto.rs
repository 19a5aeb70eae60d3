use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ApiError;
use crate::insulin::repo::{InsulinDose, InsulinPrediction};
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
pub struct CreateDoseRequest {
    pub units: Option<f64>,
    pub glucose_level: Option<f64>,
    pub carb_intake: Option<f64>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub timestamp: Option<OffsetDateTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDoseRequest {
    #[serde(default)]
    pub units: Patch<f64>,
    #[serde(default)]
    pub glucose_level: Patch<f64>,
    #[serde(default)]
    pub carb_intake: Patch<f64>,
    #[serde(default, deserialize_with = "crate::patch::rfc3339_patch")]
    pub timestamp: Patch<OffsetDateTime>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoseResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub units: f64,
    pub glucose_level: Option<f64>,
    pub carb_intake: Option<f64>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl From<InsulinDose> for DoseResponse {
    fn from(d: InsulinDose) -> Self {
        Self {
            id: d.id,
            user_id: d.user_id,
            units: d.units,
            glucose_level: d.glucose_level,
            carb_intake: d.carb_intake,
            timestamp: d.timestamp,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRequest {
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date: Option<OffsetDateTime>,
    #[serde(default)]
    pub cgm_prev: Vec<f64>,
    pub glucose_objective: Option<f64>,
    pub carbs: Option<f64>,
    pub insulin_on_board: Option<f64>,
    pub sleep_level: Option<f64>,
    pub work_level: Option<f64>,
    pub activity_level: Option<f64>,
}

impl PredictionRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut missing = Vec::new();
        if self.date.is_none() {
            missing.push("date");
        }
        if self.cgm_prev.is_empty() {
            missing.push("cgmPrev");
        }
        if self.carbs.is_none() {
            missing.push("carbs");
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
pub struct ApplyPredictionRequest {
    pub apply_dose: Option<f64>,
    #[serde(default)]
    pub cgm_post: Vec<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    pub cgm_prev: Vec<f64>,
    pub glucose_objective: Option<f64>,
    pub carbs: f64,
    pub insulin_on_board: Option<f64>,
    pub sleep_level: Option<f64>,
    pub work_level: Option<f64>,
    pub activity_level: Option<f64>,
    pub recommended_dose: f64,
    pub correction_dose: f64,
    pub meal_dose: f64,
    pub activity_adjustment: f64,
    pub time_adjustment: f64,
    pub apply_dose: Option<f64>,
    pub cgm_post: Vec<f64>,
}

impl From<InsulinPrediction> for PredictionResponse {
    fn from(p: InsulinPrediction) -> Self {
        Self {
            id: p.id,
            user_id: p.user_id,
            date: p.date,
            cgm_prev: p.cgm_prev,
            glucose_objective: p.glucose_objective,
            carbs: p.carbs,
            insulin_on_board: p.insulin_on_board,
            sleep_level: p.sleep_level,
            work_level: p.work_level,
            activity_level: p.activity_level,
            recommended_dose: p.recommended_dose,
            correction_dose: p.correction_dose,
            meal_dose: p.meal_dose,
            activity_adjustment: p.activity_adjustment,
            time_adjustment: p.time_adjustment,
            apply_dose: p.apply_dose,
            cgm_post: p.cgm_post,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prediction_request_lists_all_missing_fields() {
        let req: PredictionRequest = serde_json::from_str("{}").unwrap();
        let msg = req.validate().unwrap_err().to_string();
        assert!(msg.contains("date"));
        assert!(msg.contains("cgmPrev"));
        assert!(msg.contains("carbs"));
    }

    #[test]
    fn prediction_request_accepts_complete_payload() {
        let req: PredictionRequest = serde_json::from_str(
            r#"{ "date": "2024-05-01T08:00:00Z", "cgmPrev": [140.0, 135.0], "carbs": 45 }"#,
        )
        .unwrap();
        assert!(req.validate().is_ok());
    }
}
