//! RAG (Retrieval-Augmented Generation) module.
//!
//! This module provides:
//! - `Embedder` / `HttpEmbedder`: query text to vector
//! - `VectorIndex` / `PineconeIndex`: top-k snippet lookup
//! - `prompt`: the fixed prompt templates
//! - `RagPipeline`: the retrieve-then-generate flow shared by chat endpoints

pub mod embedding;
pub mod index;
pub mod pipeline;
pub mod prompt;

pub use embedding::{Embedder, HttpEmbedder};
pub use index::{PineconeIndex, Snippet, VectorIndex};
pub use pipeline::{RagAnswer, RagError, RagPipeline};
