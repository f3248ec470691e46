//! Nearest-neighbour lookup against a managed Pinecone index.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::config::settings::VectorIndexSettings;
use crate::core::upstream::{build_client, check_status, UpstreamError};

const SERVICE: &str = "vector index";

/// A retrieved text chunk. The score stays internal to the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snippet {
    pub text: String,
    pub score: f32,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Up to `top_k` snippets, most similar first.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<Snippet>, UpstreamError>;
}

#[derive(Clone)]
pub struct PineconeIndex {
    host: String,
    api_key: String,
    namespace: Option<String>,
    text_field: String,
    client: Client,
}

impl PineconeIndex {
    pub fn new(
        host: &str,
        api_key: String,
        namespace: Option<String>,
        text_field: &str,
        client: Client,
    ) -> Self {
        let host = host.trim_end_matches('/');
        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{}", host)
        };
        Self {
            host,
            api_key,
            namespace: namespace.filter(|ns| !ns.is_empty()),
            text_field: text_field.to_string(),
            client,
        }
    }

    /// `None` when host or key are missing.
    pub fn from_settings(settings: &VectorIndexSettings) -> Result<Option<Self>, reqwest::Error> {
        let (Some(host), Some(api_key)) = (&settings.host, &settings.api_key) else {
            return Ok(None);
        };
        let client = build_client(settings.timeout_secs)?;
        Ok(Some(Self::new(
            host,
            api_key.clone(),
            settings.namespace.clone(),
            &settings.text_field,
            client,
        )))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<Snippet>, UpstreamError> {
        let url = format!("{}/query", self.host);
        let body = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            namespace: self.namespace.as_deref(),
        };

        let res = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(UpstreamError::transport(SERVICE))?;
        let res = check_status(SERVICE, res).await?;

        let payload: QueryResponse = res
            .json()
            .await
            .map_err(|e| UpstreamError::malformed(SERVICE, e.to_string()))?;

        Ok(collect_snippets(payload.matches, &self.text_field, top_k))
    }
}

/// Keeps matches that carry text, most similar first, at most `top_k`.
fn collect_snippets(matches: Vec<QueryMatch>, text_field: &str, top_k: usize) -> Vec<Snippet> {
    let mut snippets: Vec<Snippet> = matches
        .into_iter()
        .filter_map(|m| {
            let text = m
                .metadata
                .as_ref()
                .and_then(|meta| meta.get(text_field))
                .and_then(Value::as_str)?
                .to_string();
            Some(Snippet {
                text,
                score: m.score,
            })
        })
        .collect();

    // Stable, so equal scores keep the index's order.
    snippets.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    snippets.truncate(top_k);
    snippets
}
