use async_trait::async_trait;

use super::types::ChatRequest;
use crate::core::upstream::UpstreamError;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// provider name used in logs (e.g. "groq")
    fn name(&self) -> &str;

    /// model identifier sent with each request
    fn model(&self) -> &str;

    /// chat completion (non-streaming); returns the first choice's raw text
    async fn chat(&self, request: ChatRequest) -> Result<String, UpstreamError>;
}
