use std::sync::Arc;

use super::provider::LlmProvider;
use super::reasoning::strip_reasoning;
use super::types::ChatRequest;
use crate::core::config::settings::LlmSettings;
use crate::core::upstream::UpstreamError;

/// Prefix carried by answers that stand in for a failed backend call.
pub const BACKEND_ERROR_MARKER: &str = "❌ AI backend error: ";

/// Result of a chat turn. Failures are values, not errors, so the caller
/// decides how to surface them.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatOutcome {
    Answer(String),
    BackendError(String),
}

impl ChatOutcome {
    pub fn is_answer(&self) -> bool {
        matches!(self, ChatOutcome::Answer(_))
    }

    /// Text shown to the user: the answer, or the marker-prefixed error.
    pub fn text(&self) -> String {
        match self {
            ChatOutcome::Answer(text) => text.clone(),
            ChatOutcome::BackendError(message) => format!("{}{}", BACKEND_ERROR_MARKER, message),
        }
    }
}

#[derive(Clone)]
pub struct LlmService {
    provider: Arc<dyn LlmProvider>,
    settings: LlmSettings,
}

impl LlmService {
    pub fn new(provider: Arc<dyn LlmProvider>, settings: LlmSettings) -> Self {
        Self { provider, settings }
    }

    /// Sends the request and returns the answer with any reasoning preamble
    /// removed.
    pub async fn chat(&self, request: ChatRequest) -> Result<String, UpstreamError> {
        let request = request.with_defaults(&self.settings);
        tracing::debug!(
            provider = self.provider.name(),
            model = self.provider.model(),
            messages = request.messages.len(),
            "Sending chat completion"
        );
        let raw = self.provider.chat(request).await?;
        Ok(strip_reasoning(&raw).to_string())
    }

    /// Like [`Self::chat`], but folds failures into [`ChatOutcome::BackendError`].
    pub async fn complete(&self, request: ChatRequest) -> ChatOutcome {
        match self.chat(request).await {
            Ok(answer) => ChatOutcome::Answer(answer),
            Err(err) => {
                tracing::error!(error = %err, "LLM call failed");
                ChatOutcome::BackendError(err.to_string())
            }
        }
    }
}
