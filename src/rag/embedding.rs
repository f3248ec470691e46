//! Sentence embeddings from an OpenAI-compatible `/v1/embeddings` server
//! (text-embeddings-inference, llama.cpp server, ...).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::core::config::settings::EmbeddingSettings;
use crate::core::upstream::{build_client, check_status, UpstreamError};

const SERVICE: &str = "embedding server";

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Fixed-length vector for `text`.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, UpstreamError>;
}

#[derive(Clone)]
pub struct HttpEmbedder {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: Client,
}

impl HttpEmbedder {
    pub fn new(base_url: &str, model: &str, api_key: Option<String>, client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            client,
        }
    }

    pub fn from_settings(settings: &EmbeddingSettings) -> Result<Self, reqwest::Error> {
        let client = build_client(settings.timeout_secs)?;
        Ok(Self::new(
            &settings.base_url,
            &settings.model,
            settings.api_key.clone(),
            client,
        ))
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, UpstreamError> {
        let url = format!("{}/v1/embeddings", self.base_url);

        let body = json!({
            "model": self.model,
            "input": [text],
        });

        let mut builder = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let res = builder.send().await.map_err(UpstreamError::transport(SERVICE))?;
        let res = check_status(SERVICE, res).await?;

        let payload: EmbeddingResponse = res
            .json()
            .await
            .map_err(|e| UpstreamError::malformed(SERVICE, e.to_string()))?;

        let embedding = payload
            .data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .ok_or_else(|| UpstreamError::malformed(SERVICE, "no embedding returned"))?;

        if embedding.is_empty() {
            return Err(UpstreamError::malformed(SERVICE, "embedding is empty"));
        }
        Ok(embedding)
    }
}
