//! Proxies to the food-recognition and nutrition-lookup services. Both
//! endpoints are thin: forward the query, reshape the upstream response.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

const CLARIFAI_MODEL_URL: &str =
    "https://api.clarifai.com/v2/users/clarifai/apps/main/models/food-item-v1-recognition/outputs";
const NUTRITION_URL: &str = "https://api.calorieninjas.com/v1/nutrition";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/food/process-image", post(process_image))
        .route("/food/process-food-name", post(process_food_name))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessImageRequest {
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FoodPrediction {
    pub name: String,
    pub probability: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessImageResponse {
    pub success: bool,
    pub food_name: String,
    pub predictions: Vec<FoodPrediction>,
}

#[derive(Debug, Deserialize)]
struct ClarifaiResponse {
    #[serde(default)]
    outputs: Vec<ClarifaiOutput>,
}

#[derive(Debug, Deserialize)]
struct ClarifaiOutput {
    data: ClarifaiData,
}

#[derive(Debug, Deserialize)]
struct ClarifaiData {
    #[serde(default)]
    concepts: Vec<ClarifaiConcept>,
}

#[derive(Debug, Deserialize)]
struct ClarifaiConcept {
    name: String,
    value: f64,
}

/// Flattens the recognition output into ranked (name, probability) pairs.
fn extract_predictions(response: ClarifaiResponse) -> Vec<FoodPrediction> {
    response
        .outputs
        .into_iter()
        .next()
        .map(|output| {
            output
                .data
                .concepts
                .into_iter()
                .map(|c| FoodPrediction {
                    name: c.name,
                    probability: c.value,
                })
                .collect()
        })
        .unwrap_or_default()
}

#[instrument(skip(state, payload))]
async fn process_image(
    State(state): State<AppState>,
    Json(payload): Json<ProcessImageRequest>,
) -> ApiResult<Json<ProcessImageResponse>> {
    let Some(image_url) = payload.image_url.filter(|u| !u.is_empty()) else {
        return Err(ApiError::validation("missing required fields: imageUrl"));
    };
    let pat = state
        .config
        .clarifai_pat
        .as_deref()
        .ok_or_else(|| ApiError::Upstream("food recognition is not configured".into()))?;

    let body = serde_json::json!({
        "inputs": [{ "data": { "image": { "url": image_url } } }]
    });
    let response = state
        .http
        .post(CLARIFAI_MODEL_URL)
        .header("Authorization", format!("Key {pat}"))
        .json(&body)
        .send()
        .await
        .map_err(|e| ApiError::Upstream(format!("clarifai request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ApiError::Upstream(format!(
            "clarifai responded with {status}"
        )));
    }
    let parsed: ClarifaiResponse = response
        .json()
        .await
        .map_err(|e| ApiError::Upstream(format!("invalid clarifai response: {e}")))?;

    let predictions = extract_predictions(parsed);
    let Some(best) = predictions.first() else {
        return Err(ApiError::not_found("no food detected in the image"));
    };

    Ok(Json(ProcessImageResponse {
        success: true,
        food_name: best.name.clone(),
        predictions,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ProcessFoodNameRequest {
    pub query: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NutritionItem {
    pub name: String,
    pub calories: f64,
    pub carbs_g: f64,
    pub protein_g: f64,
    pub fat_g: f64,
    pub serving_size_g: f64,
}

#[derive(Debug, Serialize)]
pub struct ProcessFoodNameResponse {
    pub success: bool,
    pub items: Vec<NutritionItem>,
}

#[derive(Debug, Deserialize)]
struct NinjaResponse {
    #[serde(default)]
    items: Vec<NinjaItem>,
}

#[derive(Debug, Deserialize)]
struct NinjaItem {
    name: String,
    calories: f64,
    carbohydrates_total_g: f64,
    protein_g: f64,
    fat_total_g: f64,
    serving_size_g: f64,
}

impl From<NinjaItem> for NutritionItem {
    fn from(item: NinjaItem) -> Self {
        Self {
            name: item.name,
            calories: item.calories,
            carbs_g: item.carbohydrates_total_g,
            protein_g: item.protein_g,
            fat_g: item.fat_total_g,
            serving_size_g: item.serving_size_g,
        }
    }
}

#[instrument(skip(state, payload))]
async fn process_food_name(
    State(state): State<AppState>,
    Json(payload): Json<ProcessFoodNameRequest>,
) -> ApiResult<Json<ProcessFoodNameResponse>> {
    let Some(query) = payload.query.filter(|q| !q.is_empty()) else {
        return Err(ApiError::validation("missing required fields: query"));
    };
    let api_key = state
        .config
        .nutrition_api_key
        .as_deref()
        .ok_or_else(|| ApiError::Upstream("nutrition lookup is not configured".into()))?;

    let response = state
        .http
        .get(NUTRITION_URL)
        .query(&[("query", query.as_str())])
        .header("X-Api-Key", api_key)
        .send()
        .await
        .map_err(|e| ApiError::Upstream(format!("nutrition request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ApiError::Upstream(format!(
            "nutrition api responded with {status}"
        )));
    }
    let parsed: NinjaResponse = response
        .json()
        .await
        .map_err(|e| ApiError::Upstream(format!("invalid nutrition response: {e}")))?;

    Ok(Json(ProcessFoodNameResponse {
        success: true,
        items: parsed.items.into_iter().map(NutritionItem::from).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predictions_come_from_the_first_output_in_order() {
        let raw = r#"{
            "outputs": [{
                "data": {
                    "concepts": [
                        { "name": "pizza", "value": 0.98 },
                        { "name": "flatbread", "value": 0.42 }
                    ]
                }
            }]
        }"#;
        let parsed: ClarifaiResponse = serde_json::from_str(raw).unwrap();
        let predictions = extract_predictions(parsed);
        assert_eq!(predictions.len(), 2);
        assert_eq!(predictions[0].name, "pizza");
        assert_eq!(predictions[0].probability, 0.98);
    }

    #[test]
    fn empty_outputs_yield_no_predictions() {
        let parsed: ClarifaiResponse = serde_json::from_str(r#"{ "outputs": [] }"#).unwrap();
        assert!(extract_predictions(parsed).is_empty());
    }

    #[test]
    fn nutrition_items_map_upstream_field_names() {
        let raw = r#"{
            "items": [{
                "name": "rice",
                "calories": 127.4,
                "carbohydrates_total_g": 28.2,
                "protein_g": 2.7,
                "fat_total_g": 0.3,
                "serving_size_g": 100.0
            }]
        }"#;
        let parsed: NinjaResponse = serde_json::from_str(raw).unwrap();
        let item = NutritionItem::from(parsed.items.into_iter().next().unwrap());
        assert_eq!(item.name, "rice");
        assert_eq!(item.carbs_g, 28.2);
        assert_eq!(item.fat_g, 0.3);
    }
}
