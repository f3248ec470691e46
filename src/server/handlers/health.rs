use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Map, Value};

use crate::state::AppState;

pub async fn root() -> impl IntoResponse {
    Json(json!({ "message": "DiaCare backend is running" }))
}

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let models = state
        .models
        .summaries()
        .into_iter()
        .map(|(key, summary)| {
            let value = summary
                .and_then(|s| serde_json::to_value(s).ok())
                .unwrap_or(Value::Null);
            (key.to_string(), value)
        })
        .collect::<Map<String, Value>>();

    Json(json!({
        "status": "ok",
        "models": models,
        "rag_enabled": state.rag.is_some(),
        "started_at": state.started_at.to_rfc3339(),
    }))
}
