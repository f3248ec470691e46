use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::utils::{json_body, require_text};
use crate::core::errors::ApiError;
use crate::llm::ChatOutcome;
use crate::rag::prompt::{patient_chat_prompt, treatment_query};
use crate::rag::{RagAnswer, RagPipeline};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RagRequest {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct TreatmentRequest {
    pub patient: Map<String, Value>,
    pub question: String,
}

#[derive(Debug, Deserialize)]
pub struct PatientChatRequest {
    pub patient: Map<String, Value>,
    pub query: String,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    context_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn pipeline(state: &AppState) -> Result<&RagPipeline, ApiError> {
    state
        .rag
        .as_ref()
        .ok_or_else(|| ApiError::ServiceUnavailable("RAG pipeline is not configured".to_string()))
}

/// 200 with the answer, or 502 carrying the marker-prefixed text plus the
/// bare error message.
fn respond(answer: RagAnswer, with_context: bool) -> Response {
    let response = answer.outcome.text();
    match answer.outcome {
        ChatOutcome::Answer(_) => {
            let context_used = (with_context && !answer.context.is_empty()).then_some(answer.context);
            Json(ChatResponse {
                response,
                context_used,
                error: None,
            })
            .into_response()
        }
        ChatOutcome::BackendError(message) => (
            StatusCode::BAD_GATEWAY,
            Json(ChatResponse {
                response,
                context_used: None,
                error: Some(message),
            }),
        )
            .into_response(),
    }
}

pub async fn rag(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RagRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = json_body(payload)?;
    let query = require_text("query", &request.query)?;
    let rag = pipeline(&state)?;

    Ok(respond(rag.answer(query).await, false))
}

pub async fn treatment_recommendation(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TreatmentRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = json_body(payload)?;
    let question = require_text("question", &request.question)?;
    let rag = pipeline(&state)?;

    let query = treatment_query(&request.patient, question);
    Ok(respond(rag.answer(&query).await, true))
}

pub async fn chatbot_patient_query(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PatientChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = json_body(payload)?;
    let query = require_text("query", &request.query)?;
    let rag = pipeline(&state)?;

    let prompt = patient_chat_prompt(&request.patient, query);
    Ok(respond(rag.answer(&prompt).await, false))
}
