// The vector store port and the service that sits on top of it.
//
// `VectorStore` is the storage abstraction (SQLite in production, in-memory in
// tests). `EmbeddingDb` binds a store to one named collection and runs the
// correlator before every upsert, so callers hand it chunks + vectors and never
// build ids themselves.

use super::correlator::correlate;
use super::vector_models::{ChunkMetadata, ChunkRecord, CollectionInfo, ScoredRecord};
use crate::core::documents::DocumentMetadata;
use crate::core::errors::RagError;
use async_trait::async_trait;

pub const DEFAULT_TOP_K: usize = 4;

/// Persistent, named collections of (id, vector, text, metadata) records.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Loads the collection, creating it when it does not exist yet.
    async fn create_or_load_collection(&self, name: &str) -> Result<CollectionInfo, RagError>;

    /// Drops the collection and all of its records. Missing collections are ignored.
    async fn delete_collection(&self, name: &str) -> Result<(), RagError>;

    async fn collection_exists(&self, name: &str) -> Result<bool, RagError>;

    /// Inserts or overwrites records by id. The four slices must be the same
    /// length, and every vector must match the collection's dimension.
    async fn upsert(
        &self,
        collection: &str,
        ids: &[String],
        vectors: &[Vec<f32>],
        texts: &[String],
        metadatas: &[ChunkMetadata],
    ) -> Result<usize, RagError>;

    /// All chunks of one document, ordered by chunk sequence number.
    async fn get_by_document_id(
        &self,
        collection: &str,
        document_id: &str,
    ) -> Result<Vec<ChunkRecord>, RagError>;

    /// The `k` records closest to `vector` by cosine distance, closest first.
    async fn nearest(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredRecord>, RagError>;

    async fn count(&self, collection: &str) -> Result<usize, RagError>;
}

/// Checks the shared preconditions of `VectorStore::upsert` and returns the
/// batch dimension (`None` for an empty batch).
pub fn validate_upsert(
    collection: &str,
    ids: &[String],
    vectors: &[Vec<f32>],
    texts: &[String],
    metadatas: &[ChunkMetadata],
    stored_dimension: Option<usize>,
) -> Result<Option<usize>, RagError> {
    for (name, len) in [
        ("vectors", vectors.len()),
        ("texts", texts.len()),
        ("metadatas", metadatas.len()),
    ] {
        if len != ids.len() {
            return Err(RagError::LengthMismatch {
                left_name: "ids",
                left: ids.len(),
                right_name: name,
                right: len,
            });
        }
    }

    let Some(first) = vectors.first() else {
        return Ok(None);
    };
    let expected = stored_dimension.unwrap_or(first.len());

    if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
        return Err(RagError::SchemaMismatch {
            collection: collection.to_string(),
            expected,
            actual: bad.len(),
        });
    }

    Ok(Some(expected))
}

// ============================================================================
// EMBEDDING DB SERVICE
// ============================================================================

pub struct EmbeddingDb<S: VectorStore> {
    store: S,
    collection: String,
}

impl<S: VectorStore> EmbeddingDb<S> {
    /// Opens `collection`, wiping it first when `reset` is set.
    pub async fn open(store: S, collection: &str, reset: bool) -> Result<Self, RagError> {
        if reset && store.collection_exists(collection).await? {
            tracing::info!(collection, "Resetting collection");
            store.delete_collection(collection).await?;
        }

        let info = store.create_or_load_collection(collection).await?;
        tracing::info!(
            collection = %info.name,
            records = info.record_count,
            dimension = ?info.dimension,
            "Loaded collection"
        );

        Ok(Self {
            store,
            collection: collection.to_string(),
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Correlates chunks with their documents and upserts them. Returns the number of records written.
    pub async fn insert_documents(
        &self,
        document_chunks: &[String],
        embeddings: &[Vec<f32>],
        doc_metadatas: &[DocumentMetadata],
        origin_indexes: &[usize],
        chunk_seq_numbers: &[usize],
    ) -> Result<usize, RagError> {
        let (ids, metadatas) = correlate(doc_metadatas, origin_indexes, chunk_seq_numbers)?;
        if ids.is_empty() {
            return Ok(0);
        }

        self.store
            .upsert(&self.collection, &ids, embeddings, document_chunks, &metadatas)
            .await
    }

    #[cfg(test)]
    pub async fn get_items_by_document_id(
        &self,
        document_id: &str,
    ) -> Result<Vec<ChunkRecord>, RagError> {
        self.store
            .get_by_document_id(&self.collection, document_id)
            .await
    }

    pub async fn nearest(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredRecord>, RagError> {
        self.store.nearest(&self.collection, vector, k).await
    }

    pub async fn count(&self) -> Result<usize, RagError> {
        self.store.count(&self.collection).await
    }
}
