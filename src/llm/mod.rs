pub mod openai;
pub mod provider;
pub mod reasoning;
pub mod service;
pub mod types;

pub use openai::OpenAiCompatProvider;
pub use provider::LlmProvider;
pub use service::{ChatOutcome, LlmService, BACKEND_ERROR_MARKER};
pub use types::{ChatMessage, ChatRequest};
