//! Typed view over the merged configuration document.

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub models: ModelSettings,
    pub embedding: EmbeddingSettings,
    pub vector_index: VectorIndexSettings,
    pub llm: LlmSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_allowed_origins: Vec::new(),
        }
    }
}

/// Artifacts served by the prediction endpoints. A missing entry disables
/// the matching endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub hba1c: Option<ModelEntry>,
    pub risk: Option<ModelEntry>,
    pub therapy: Option<ModelEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelEntry {
    pub path: String,
    #[serde(default)]
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            model: "BAAI/bge-large-en".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VectorIndexSettings {
    /// Data-plane host of the index, e.g. `https://medicalbooks-xxxx.svc.pinecone.io`.
    pub host: Option<String>,
    pub api_key: Option<String>,
    pub namespace: Option<String>,
    pub top_k: usize,
    pub text_field: String,
    pub timeout_secs: u64,
}

impl Default for VectorIndexSettings {
    fn default() -> Self {
        Self {
            host: None,
            api_key: None,
            namespace: None,
            top_k: 3,
            text_field: "text".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            api_key: None,
            model: "deepseek-r1-distill-llama-70b".to_string(),
            temperature: Some(0.7),
            max_tokens: None,
            timeout_secs: 120,
        }
    }
}

/// `RUST_LOG` takes precedence over `level` when set.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub file_name: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_name: "diacare.log".to_string(),
        }
    }
}

impl Settings {
    /// RAG endpoints need an index host plus credentials for the index and
    /// the LLM.
    pub fn rag_configured(&self) -> bool {
        let filled = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        filled(&self.vector_index.host)
            && filled(&self.vector_index.api_key)
            && filled(&self.llm.api_key)
    }

    pub fn llm_configured(&self) -> bool {
        self.llm
            .api_key
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty())
    }
}
