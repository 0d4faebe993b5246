// The core module contains all business logic.
// Each feature gets its own submodule; nothing here performs I/O directly,
// it goes through the traits that `infra` implements.

#[path = "errors/rag_error.rs"]
pub mod errors;

#[path = "retry/retry_policy.rs"]
pub mod retry;

#[path = "chunking/text_chunker.rs"]
pub mod chunking;

#[path = "documents/mod.rs"]
pub mod documents;

#[path = "embedding/mod.rs"]
pub mod embedding;

#[path = "vector_store/mod.rs"]
pub mod vector_store;

#[path = "ai/mod.rs"]
pub mod ai;

#[path = "ingestion/ingestion_service.rs"]
pub mod ingestion;
