use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::utils::json_body;
use crate::core::errors::ApiError;
use crate::predict::risk::{predict_hba1c, RiskRecord};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub features: Vec<f64>,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub prediction: f64,
}

#[derive(Debug, Serialize)]
pub struct RiskResponse {
    pub predicted_hba1c: f64,
}

/// Raw-feature HbA1c regression. The vector must match the model's arity.
pub async fn predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let request = json_body(payload)?;
    let model = state.models.hba1c()?;

    tracing::debug!(features = ?request.features, "Received /predict");
    let prediction = model.predict(&request.features)?;

    Ok(Json(PredictResponse { prediction }))
}

pub async fn predict_risk(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RiskRecord>, JsonRejection>,
) -> Result<Json<RiskResponse>, ApiError> {
    let patient = json_body(payload)?;
    let model = state.models.risk()?;

    let predicted_hba1c = predict_hba1c(model, &patient)?;
    tracing::info!(predicted_hba1c, "Risk prediction complete");

    Ok(Json(RiskResponse { predicted_hba1c }))
}
