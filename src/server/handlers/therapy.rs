use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::utils::json_body;
use crate::core::errors::ApiError;
use crate::llm::{ChatMessage, ChatRequest};
use crate::predict::therapy::{self, TherapyAssessment, TherapyRecord, TopFactor};
use crate::rag::prompt::{therapy_insight_prompt, MEDICAL_ASSISTANT_SYSTEM};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PathlineResponse {
    pub probabilities: [f64; 3],
    pub insight: String,
    pub top_factors: Vec<TopFactor>,
}

pub async fn predict_therapy(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TherapyRecord>, JsonRejection>,
) -> Result<Json<TherapyAssessment>, ApiError> {
    let patient = json_body(payload)?;
    let model = state.models.therapy()?;

    let assessment = therapy::assess(model, &patient)?;
    tracing::info!(
        probability = assessment.probability,
        status = ?assessment.status,
        "Therapy assessment complete"
    );
    Ok(Json(assessment))
}

/// Per-visit probabilities, an LLM narrative over them, and the model's top
/// global factors. Input and model errors are reported before any LLM call.
pub async fn predict_therapy_pathline(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TherapyRecord>, JsonRejection>,
) -> Result<Json<PathlineResponse>, ApiError> {
    let patient = json_body(payload)?;
    let model = state.models.therapy()?;

    let probabilities = therapy::pathline(model, &patient)?;
    let top_factors = therapy::top_factors(model);

    let llm = state.llm.as_ref().ok_or_else(|| {
        ApiError::ServiceUnavailable("LLM backend is not configured".to_string())
    })?;

    let request = ChatRequest::new(vec![
        ChatMessage::system(MEDICAL_ASSISTANT_SYSTEM),
        ChatMessage::user(therapy_insight_prompt(&patient, &probabilities)),
    ]);
    let insight = llm.chat(request).await.map_err(|err| {
        tracing::error!(error = %err, "Pathline insight generation failed");
        ApiError::Upstream(err.to_string())
    })?;

    Ok(Json(PathlineResponse {
        probabilities,
        insight,
        top_factors,
    }))
}
