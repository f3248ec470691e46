pub mod core;
pub mod llm;
pub mod predict;
pub mod rag;
pub mod server;
pub mod state;
