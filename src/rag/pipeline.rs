use std::sync::Arc;

use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use super::embedding::Embedder;
use super::index::{Snippet, VectorIndex};
use super::prompt::{join_context, rag_prompt};
use crate::core::upstream::UpstreamError;
use crate::llm::{ChatMessage, ChatOutcome, ChatRequest, LlmService};

const RAG_TEMPERATURE: f64 = 0.7;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("retrieval failed: {0}")]
    Retrieval(#[source] UpstreamError),
}

/// Outcome of one retrieve-then-generate turn.
#[derive(Debug, Clone)]
pub struct RagAnswer {
    pub outcome: ChatOutcome,
    /// Newline-joined snippets handed to the model; empty when nothing was
    /// retrieved or retrieval failed.
    pub context: String,
}

/// Embed → search → prompt → generate. Holds only shared, read-only
/// clients, so one instance serves every request.
#[derive(Clone)]
pub struct RagPipeline {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    llm: LlmService,
    top_k: usize,
}

impl RagPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        llm: LlmService,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            llm,
            top_k: top_k.max(1),
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Snippets most similar to `query`. Embedding failures surface as
    /// retrieval failures.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<Snippet>, RagError> {
        let vector = self.embedder.embed(query).await.map_err(RagError::Retrieval)?;
        let snippets = self
            .index
            .query(&vector, self.top_k)
            .await
            .map_err(RagError::Retrieval)?;
        tracing::debug!(count = snippets.len(), "Retrieved context");
        Ok(snippets)
    }

    /// Answers `query` from retrieved context. Never fails: upstream
    /// problems come back as [`ChatOutcome::BackendError`].
    pub async fn answer(&self, query: &str) -> RagAnswer {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("rag", %request_id);
        self.answer_inner(query).instrument(span).await
    }

    async fn answer_inner(&self, query: &str) -> RagAnswer {
        tracing::info!(query_chars = query.chars().count(), "Received RAG query");

        let snippets = match self.retrieve(query).await {
            Ok(snippets) => snippets,
            Err(err) => {
                tracing::error!(error = %err, "RAG retrieval failed");
                return RagAnswer {
                    outcome: ChatOutcome::BackendError(err.to_string()),
                    context: String::new(),
                };
            }
        };

        let context = join_context(&snippets);
        let prompt = rag_prompt(&context, query);
        let request = ChatRequest::new(vec![ChatMessage::user(prompt)]).temperature(RAG_TEMPERATURE);
        let outcome = self.llm.complete(request).await;

        if outcome.is_answer() {
            tracing::info!("RAG response received");
        }
        RagAnswer { outcome, context }
    }
}
