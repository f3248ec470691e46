use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::core::config::service::settings_from_value;
use crate::core::config::{AppPaths, ConfigService, Settings};
use crate::core::logging;
use crate::llm::{LlmService, OpenAiCompatProvider};
use crate::predict::ModelRegistry;
use crate::rag::{HttpEmbedder, PineconeIndex, RagPipeline};

pub mod error;

use error::InitializationError;

/// Global application state shared across all routes.
///
/// Contains:
/// - The typed settings the process started with
/// - Loaded prediction models
/// - The RAG pipeline and LLM client, when credentials are configured
#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub models: ModelRegistry,
    pub rag: Option<RagPipeline>,
    pub llm: Option<LlmService>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Initializes the application state.
    ///
    /// This process includes:
    /// 1. Loading and validating configuration (files, then environment)
    /// 2. Installing logging as configured
    /// 3. Loading model artifacts, checking digests where configured
    /// 4. Building upstream clients for the LLM and the RAG pipeline
    pub fn initialize(paths: Arc<AppPaths>) -> Result<Arc<Self>, InitializationError> {
        let config = ConfigService::new(paths.clone());
        let raw = config.load_config()?;
        let redacted = config.redact_sensitive_values(&raw);
        let settings = settings_from_value(raw)?;

        logging::init(&paths, &settings.logging);
        tracing::info!(
            config = %redacted,
            "Configuration loaded from {}",
            config.config_path().display()
        );

        Self::from_settings(&paths, settings).map(Arc::new)
    }

    /// Builds state from already-resolved settings.
    pub fn from_settings(paths: &AppPaths, settings: Settings) -> Result<Self, InitializationError> {
        let models = ModelRegistry::load(&settings.models, paths)?;

        let llm = if settings.llm_configured() {
            let provider = OpenAiCompatProvider::from_settings(&settings.llm)
                .map_err(InitializationError::http_client("chat completion API"))?;
            tracing::info!("LLM backend: {} ({})", settings.llm.base_url, settings.llm.model);
            Some(LlmService::new(Arc::new(provider), settings.llm.clone()))
        } else {
            tracing::warn!("No LLM API key configured; chat endpoints are disabled");
            None
        };

        let rag = match (&llm, settings.rag_configured()) {
            (Some(llm), true) => build_rag(&settings, llm.clone())?,
            _ => {
                tracing::warn!("Vector index not configured; RAG endpoints are disabled");
                None
            }
        };

        Ok(Self {
            settings,
            models,
            rag,
            llm,
            started_at: Utc::now(),
        })
    }
}

fn build_rag(settings: &Settings, llm: LlmService) -> Result<Option<RagPipeline>, InitializationError> {
    let embedder = HttpEmbedder::from_settings(&settings.embedding)
        .map_err(InitializationError::http_client("embedding server"))?;
    let Some(index) = PineconeIndex::from_settings(&settings.vector_index)
        .map_err(InitializationError::http_client("vector index"))?
    else {
        return Ok(None);
    };

    tracing::info!(
        top_k = settings.vector_index.top_k,
        "RAG enabled (embeddings: {}, model: {})",
        settings.embedding.base_url,
        settings.embedding.model
    );
    Ok(Some(RagPipeline::new(
        Arc::new(embedder),
        Arc::new(index),
        llm,
        settings.vector_index.top_k,
    )))
}
