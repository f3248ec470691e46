mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::json;

use common::{
    settings_with_models, settings_with_upstreams, spawn_upstreams, therapy_patient, TestApp,
    Upstreams,
};
use diacare_backend::llm::BACKEND_ERROR_MARKER;

async fn app_with(upstreams: Arc<Upstreams>) -> TestApp {
    let base = spawn_upstreams(upstreams).await;
    TestApp::new(settings_with_upstreams(&base))
}

#[tokio::test]
async fn rag_answers_from_retrieved_context() {
    let upstreams = Arc::new(Upstreams::answering(
        "<think>Check guidelines first.</think>\n\nKeep HbA1c below 7%.",
    ));
    let app = app_with(upstreams.clone()).await;

    let (status, body) = app
        .post_json("/rag", json!({ "query": "What HbA1c should I aim for?" }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "response": "Keep HbA1c below 7%." }));

    let embed = upstreams.embed_calls.lock().expect("lock");
    assert_eq!(embed[0]["input"], json!(["What HbA1c should I aim for?"]));

    let index = upstreams.index_calls.lock().expect("lock");
    assert_eq!(index[0].0.as_deref(), Some("index-secret"));
    assert_eq!(index[0].1["topK"], 2);
    assert_eq!(index[0].1["includeMetadata"], true);

    let (auth, llm_body) = upstreams.llm_calls.lock().expect("lock")[0].clone();
    assert_eq!(auth.as_deref(), Some("Bearer llm-secret"));
    assert_eq!(llm_body["temperature"], 0.7);
    assert_eq!(
        llm_body["messages"][0]["content"],
        "Context:\nTarget HbA1c is below 7%.\nMetformin is first-line therapy.\n\n\
         User Question: What HbA1c should I aim for?\n\nAnswer:"
    );
}

#[tokio::test]
async fn treatment_recommendation_reports_context_used() {
    let upstreams = Arc::new(Upstreams::answering("Consider adding a GLP-1 agonist."));
    let app = app_with(upstreams.clone()).await;

    let (status, body) = app
        .post_json(
            "/treatment-recommendation",
            json!({
                "patient": { "name": "Ravi", "age": 61, "hba1c": 8.9 },
                "question": "Next step?"
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "Consider adding a GLP-1 agonist.");
    assert_eq!(
        body["context_used"],
        "Target HbA1c is below 7%.\nMetformin is first-line therapy."
    );

    let embed = upstreams.embed_calls.lock().expect("lock");
    assert_eq!(
        embed[0]["input"][0],
        "Patient data:\nname: Ravi\nage: 61\nhba1c: 8.9\n\nQuestion: Next step?"
    );
}

#[tokio::test]
async fn patient_chat_wraps_instructions_into_rag_prompt() {
    let upstreams = Arc::new(Upstreams::answering("## Monitoring Tips\nCheck fasting glucose daily."));
    let app = app_with(upstreams.clone()).await;

    let (status, body) = app
        .post_json(
            "/chatbot-patient-query",
            json!({ "patient": { "name": "Mei" }, "query": "How often should I test?" }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["response"]
        .as_str()
        .is_some_and(|r| r.starts_with("## Monitoring Tips")));

    let prompt = upstreams.last_llm_body()["messages"][0]["content"]
        .as_str()
        .expect("prompt")
        .to_string();
    assert!(prompt.starts_with("Context:\n"));
    assert!(prompt.contains("Patient Info:\nname: Mei"));
    assert!(prompt.contains("User Question: How often should I test?"));
}

#[tokio::test]
async fn llm_failure_is_bad_gateway_with_marked_response() {
    let upstreams = Arc::new(Upstreams::failing(StatusCode::INTERNAL_SERVER_ERROR));
    let app = app_with(upstreams.clone()).await;

    let (status, body) = app.post_json("/rag", json!({ "query": "hello" })).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let response = body["response"].as_str().expect("response text");
    assert!(response.starts_with(BACKEND_ERROR_MARKER));
    assert!(response.contains("upstream exploded"));
    assert!(body["error"].as_str().is_some_and(|e| e.contains("500")));
    assert!(body.get("context_used").is_none());
}

#[tokio::test]
async fn index_failure_is_bad_gateway_without_llm_call() {
    let upstreams = Arc::new(Upstreams::index_failing(StatusCode::INTERNAL_SERVER_ERROR));
    let app = app_with(upstreams.clone()).await;

    let (status, body) = app.post_json("/rag", json!({ "query": "hello" })).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let response = body["response"].as_str().expect("response text");
    assert!(response.starts_with(BACKEND_ERROR_MARKER));
    assert!(body["error"].as_str().is_some_and(|e| e.contains("500")));
    assert_eq!(upstreams.index_calls.lock().expect("lock").len(), 1);
    assert_eq!(upstreams.llm_call_count(), 0);
}

#[tokio::test]
async fn chat_endpoints_validate_before_calling_upstreams() {
    let upstreams = Arc::new(Upstreams::answering("unused"));
    let app = app_with(upstreams.clone()).await;

    let (status, _) = app.post_json("/rag", json!({ "query": "   " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post_json("/treatment-recommendation", json!({ "patient": "not an object", "question": "x" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post_json("/chatbot-patient-query", json!({ "patient": {} }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(upstreams.embed_calls.lock().expect("lock").is_empty());
    assert_eq!(upstreams.llm_call_count(), 0);
}

#[tokio::test]
async fn chat_without_rag_configuration_is_unavailable() {
    let app = TestApp::new(settings_with_models());

    let (status, body) = app.post_json("/rag", json!({ "query": "hello" })).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn pathline_combines_probabilities_insight_and_factors() {
    let upstreams = Arc::new(Upstreams::answering(
        "<think>trend analysis</think>HbA1c is falling steadily; keep the basal dose.",
    ));
    let app = app_with(upstreams.clone()).await;

    let (status, body) = app
        .post_json("/predict-therapy-pathline", therapy_patient())
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["probabilities"], json!([0.375, 0.625, 0.625]));
    assert_eq!(body["insight"], "HbA1c is falling steadily; keep the basal dose.");
    assert_eq!(body["top_factors"].as_array().map(Vec::len), Some(5));
    assert_eq!(
        body["top_factors"][0],
        json!({ "feature": "num__HbA1c1", "importance": 0.31 })
    );

    let llm_body = upstreams.last_llm_body();
    assert_eq!(llm_body["messages"][0]["role"], "system");
    let prompt = llm_body["messages"][1]["content"].as_str().expect("prompt");
    assert!(prompt.contains("Visit 1: 37.5%\nVisit 2: 62.5%\nVisit 3: 62.5%"));
}

#[tokio::test]
async fn malformed_pathline_request_never_reaches_llm() {
    let upstreams = Arc::new(Upstreams::answering("unused"));
    let app = app_with(upstreams.clone()).await;
    let mut patient = therapy_patient();
    patient
        .as_object_mut()
        .expect("object")
        .remove("hba1c2");

    let (status, body) = app.post_json("/predict-therapy-pathline", patient).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().is_some_and(|e| e.contains("hba1c2")));
    assert_eq!(upstreams.llm_call_count(), 0);
}

#[tokio::test]
async fn pathline_llm_failure_is_bad_gateway() {
    let upstreams = Arc::new(Upstreams::failing(StatusCode::TOO_MANY_REQUESTS));
    let app = app_with(upstreams.clone()).await;

    let (status, body) = app
        .post_json("/predict-therapy-pathline", therapy_patient())
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().is_some_and(|e| e.contains("429")));
    assert_eq!(upstreams.llm_call_count(), 1);
}
