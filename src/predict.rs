use axum::async_trait;
use serde::{Deserialize, Serialize};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::debug;

use crate::error::ApiError;

/// Features handed to the dose model. `cgm_prev` is most-recent-first, the
/// way clients submit it.
#[derive(Debug, Clone)]
pub struct DoseFeatures {
    pub date: OffsetDateTime,
    pub cgm_prev: Vec<f64>,
    pub carbs: f64,
    pub insulin_on_board: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoseBreakdown {
    pub correction_dose: f64,
    pub meal_dose: f64,
    pub activity_adjustment: f64,
    pub time_adjustment: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DoseRecommendation {
    pub total: f64,
    pub breakdown: DoseBreakdown,
}

/// Single seam to the external insulin-dose model.
#[async_trait]
pub trait DosePredictor: Send + Sync {
    async fn predict(&self, features: &DoseFeatures) -> Result<DoseRecommendation, ApiError>;
}

/// Talks to the model-serving endpoint over HTTP (`POST {base}/predict`).
pub struct HttpPredictor {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPredictor {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

/// The model service expects the current CGM value separately and the
/// history in chronological order, so the most-recent-first input is
/// reversed here.
pub fn request_payload(features: &DoseFeatures) -> serde_json::Value {
    let mut history = features.cgm_prev.clone();
    history.reverse();

    let date = features
        .date
        .format(&Rfc3339)
        .unwrap_or_else(|_| features.date.to_string());

    let mut payload = serde_json::json!({
        "date": date,
        "cgm": features.cgm_prev.first().copied().unwrap_or_default(),
        "carbs": features.carbs,
        "cgm_history": history,
    });
    if let Some(iob) = features.insulin_on_board {
        payload["insulinOnBoard"] = serde_json::json!(iob);
    }
    payload
}

#[async_trait]
impl DosePredictor for HttpPredictor {
    async fn predict(&self, features: &DoseFeatures) -> Result<DoseRecommendation, ApiError> {
        let url = format!("{}/predict", self.base_url);
        let payload = request_payload(features);
        debug!(%url, "calling dose model");

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("model request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Upstream(format!(
                "model api responded with {status}"
            )));
        }

        response
            .json::<DoseRecommendation>()
            .await
            .map_err(|e| ApiError::Upstream(format!("invalid model response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn features() -> DoseFeatures {
        DoseFeatures {
            date: datetime!(2024-05-01 08:00 UTC),
            cgm_prev: vec![140.0, 135.0, 130.0],
            carbs: 45.0,
            insulin_on_board: None,
        }
    }

    #[test]
    fn payload_uses_latest_cgm_and_chronological_history() {
        let payload = request_payload(&features());
        assert_eq!(payload["cgm"], 140.0);
        assert_eq!(
            payload["cgm_history"],
            serde_json::json!([130.0, 135.0, 140.0])
        );
        assert_eq!(payload["carbs"], 45.0);
        assert_eq!(payload["date"], "2024-05-01T08:00:00Z");
        assert!(payload.get("insulinOnBoard").is_none());
    }

    #[test]
    fn payload_includes_insulin_on_board_when_supplied() {
        let mut f = features();
        f.insulin_on_board = Some(1.5);
        let payload = request_payload(&f);
        assert_eq!(payload["insulinOnBoard"], 1.5);
    }

    #[test]
    fn recommendation_parses_model_response() {
        let raw = r#"{
            "total": 4.2,
            "breakdown": {
                "correctionDose": 1.2,
                "mealDose": 3.0,
                "activityAdjustment": -0.1,
                "timeAdjustment": 0.1
            }
        }"#;
        let rec: DoseRecommendation = serde_json::from_str(raw).unwrap();
        assert_eq!(rec.total, 4.2);
        assert_eq!(rec.breakdown.meal_dose, 3.0);
    }
}
