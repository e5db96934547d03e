pub mod chunking;
pub mod config;
pub mod document;
pub mod embeddings;
pub mod error;
pub mod generation;
pub mod ids;
pub mod migrate;
pub mod openai;
pub mod prompt;
pub mod rag;
pub mod session;
pub mod store;
