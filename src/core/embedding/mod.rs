pub mod embedding_service;

pub use embedding_service::{BatchLimits, Embedder, EmbeddingProvider};
