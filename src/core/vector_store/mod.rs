pub mod correlator;
pub mod vector_models;
pub mod store;

pub use correlator::correlate;
pub use vector_models::{
    cosine_distance, top_k_by_distance, ChunkMetadata, ChunkRecord, CollectionInfo, ScoredRecord,
};
pub use store::{validate_upsert, EmbeddingDb, VectorStore, DEFAULT_TOP_K};
