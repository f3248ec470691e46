#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::body::{to_bytes, Body};
use axum::extract::State;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::ServiceExt;

use diacare_backend::core::config::settings::ModelEntry;
use diacare_backend::core::config::{AppPaths, Settings};
use diacare_backend::server::router::router;
use diacare_backend::state::AppState;

pub fn artifact(name: &str) -> ModelEntry {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("models").join(name);
    ModelEntry {
        path: path.to_string_lossy().to_string(),
        sha256: None,
    }
}

pub fn settings_with_models() -> Settings {
    let mut settings = Settings::default();
    settings.models.hba1c = Some(artifact("hba1c_ridge.json"));
    settings.models.risk = Some(artifact("hba1c_risk.json"));
    settings.models.therapy = Some(artifact("therapy_pathline.json"));
    settings
}

pub struct TestApp {
    pub app: Router,
    _dir: tempfile::TempDir,
}

impl TestApp {
    pub fn new(settings: Settings) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::from_root(dir.path());
        let state = AppState::from_settings(&paths, settings).expect("state builds");
        Self {
            app: router(Arc::new(state)),
            _dir: dir,
        }
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request");
        self.send(request).await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.post_raw(uri, body.to_string()).await
    }

    pub async fn post_raw(&self, uri: &str, body: String) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .expect("request");
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }
}

pub fn therapy_patient() -> Value {
    json!({
        "insulin_regimen": "Basal",
        "hba1c1": 9.2, "hba1c2": 8.0, "hba1c3": 7.1,
        "hba1c_delta_1_2": -1.2,
        "gap_initial_visit": 90, "gap_first_clinical": 30,
        "egfr": 85, "reduction_percent": 13.0,
        "fvg1": 180, "fvg2": 150, "fvg3": 130,
        "fvg_delta_1_2": -30,
        "dds1": 3.2, "dds3": 2.1, "dds_trend_1_3": -1.1
    })
}

/// What the fake upstreams saw, plus how the LLM should reply.
pub struct Upstreams {
    pub embed_calls: Mutex<Vec<Value>>,
    pub index_calls: Mutex<Vec<(Option<String>, Value)>>,
    pub llm_calls: Mutex<Vec<(Option<String>, Value)>>,
    pub llm_reply: Result<String, StatusCode>,
    pub index_status: StatusCode,
    pub snippets: Vec<(&'static str, f32)>,
}

impl Upstreams {
    pub fn answering(reply: &str) -> Self {
        Self {
            embed_calls: Mutex::new(Vec::new()),
            index_calls: Mutex::new(Vec::new()),
            llm_calls: Mutex::new(Vec::new()),
            llm_reply: Ok(reply.to_string()),
            index_status: StatusCode::OK,
            snippets: vec![
                ("Metformin is first-line therapy.", 0.71),
                ("Target HbA1c is below 7%.", 0.92),
            ],
        }
    }

    pub fn failing(status: StatusCode) -> Self {
        Self {
            llm_reply: Err(status),
            ..Self::answering("")
        }
    }

    pub fn index_failing(status: StatusCode) -> Self {
        Self {
            index_status: status,
            ..Self::answering("unused")
        }
    }

    pub fn llm_call_count(&self) -> usize {
        self.llm_calls.lock().expect("lock").len()
    }

    pub fn last_llm_body(&self) -> Value {
        self.llm_calls
            .lock()
            .expect("lock")
            .last()
            .map(|(_, body)| body.clone())
            .expect("llm was called")
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn fake_embeddings(State(up): State<Arc<Upstreams>>, Json(body): Json<Value>) -> Json<Value> {
    up.embed_calls.lock().expect("lock").push(body);
    Json(json!({ "data": [{ "index": 0, "embedding": [0.1, 0.2, 0.3] }] }))
}

async fn fake_query(
    State(up): State<Arc<Upstreams>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    up.index_calls
        .lock()
        .expect("lock")
        .push((header(&headers, "api-key"), body));
    if up.index_status != StatusCode::OK {
        return (up.index_status, Json(json!({ "code": 13, "message": "index unavailable" })));
    }
    let matches: Vec<Value> = up
        .snippets
        .iter()
        .enumerate()
        .map(|(i, (text, score))| json!({ "id": format!("doc-{}", i), "score": score, "metadata": { "text": text } }))
        .collect();
    (StatusCode::OK, Json(json!({ "matches": matches, "namespace": "" })))
}

async fn fake_completions(
    State(up): State<Arc<Upstreams>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    up.llm_calls
        .lock()
        .expect("lock")
        .push((header(&headers, "authorization"), body));
    match &up.llm_reply {
        Ok(reply) => (
            StatusCode::OK,
            Json(json!({
                "choices": [{ "index": 0, "message": { "role": "assistant", "content": reply } }]
            })),
        ),
        Err(status) => (*status, Json(json!({ "error": { "message": "upstream exploded" } }))),
    }
}

/// Serves embeddings, index queries and chat completions from one local
/// listener and returns its base URL.
pub async fn spawn_upstreams(upstreams: Arc<Upstreams>) -> String {
    let app = Router::new()
        .route("/v1/embeddings", post(fake_embeddings))
        .route("/query", post(fake_query))
        .route("/chat/completions", post(fake_completions))
        .with_state(upstreams);

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}", addr)
}

/// Full settings pointing every upstream at `base`.
pub fn settings_with_upstreams(base: &str) -> Settings {
    let mut settings = settings_with_models();
    settings.embedding.base_url = base.to_string();
    settings.vector_index.host = Some(base.to_string());
    settings.vector_index.api_key = Some("index-secret".to_string());
    settings.vector_index.top_k = 2;
    settings.llm.base_url = base.to_string();
    settings.llm.api_key = Some("llm-secret".to_string());
    settings.llm.timeout_secs = 5;
    settings
}
