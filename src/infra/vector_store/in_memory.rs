// In-memory implementation of VectorStore.
// Used by tests and handy for dry runs; nothing survives the process.

use crate::core::errors::RagError;
use crate::core::vector_store::{
    cosine_distance, top_k_by_distance, validate_upsert, ChunkMetadata, ChunkRecord,
    CollectionInfo, ScoredRecord, VectorStore,
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
struct StoredCollection {
    dimension: Option<usize>,
    records: HashMap<String, ChunkRecord>,
}

/// Cloning shares the underlying collections, which lets tests "reopen" a store.
#[derive(Clone, Default)]
pub struct InMemoryVectorStore {
    collections: Arc<DashMap<String, StoredCollection>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn create_or_load_collection(&self, name: &str) -> Result<CollectionInfo, RagError> {
        let entry = self.collections.entry(name.to_string()).or_default();
        Ok(CollectionInfo {
            name: name.to_string(),
            dimension: entry.dimension,
            record_count: entry.records.len(),
        })
    }

    async fn delete_collection(&self, name: &str) -> Result<(), RagError> {
        self.collections.remove(name);
        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool, RagError> {
        Ok(self.collections.contains_key(name))
    }

    async fn upsert(
        &self,
        collection: &str,
        ids: &[String],
        vectors: &[Vec<f32>],
        texts: &[String],
        metadatas: &[ChunkMetadata],
    ) -> Result<usize, RagError> {
        let mut stored = self
            .collections
            .get_mut(collection)
            .ok_or_else(|| RagError::CollectionNotFound(collection.to_string()))?;

        let dimension =
            validate_upsert(collection, ids, vectors, texts, metadatas, stored.dimension)?;
        if dimension.is_none() {
            return Ok(0);
        }
        stored.dimension = dimension;

        for (((id, vector), text), metadata) in ids.iter().zip(vectors).zip(texts).zip(metadatas) {
            stored.records.insert(
                id.clone(),
                ChunkRecord {
                    id: id.clone(),
                    vector: vector.clone(),
                    text: text.clone(),
                    metadata: metadata.clone(),
                },
            );
        }

        Ok(ids.len())
    }

    async fn get_by_document_id(
        &self,
        collection: &str,
        document_id: &str,
    ) -> Result<Vec<ChunkRecord>, RagError> {
        let Some(stored) = self.collections.get(collection) else {
            return Err(RagError::CollectionNotFound(collection.to_string()));
        };

        let mut records: Vec<ChunkRecord> = stored
            .records
            .values()
            .filter(|r| r.metadata.document_id == document_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.metadata.chunk_seq_number);
        Ok(records)
    }

    async fn nearest(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredRecord>, RagError> {
        let Some(stored) = self.collections.get(collection) else {
            return Err(RagError::CollectionNotFound(collection.to_string()));
        };

        let hits = stored
            .records
            .values()
            .map(|record| ScoredRecord {
                distance: cosine_distance(vector, &record.vector),
                record: record.clone(),
            })
            .collect();

        Ok(top_k_by_distance(hits, k))
    }

    async fn count(&self, collection: &str) -> Result<usize, RagError> {
        self.collections
            .get(collection)
            .map(|c| c.records.len())
            .ok_or_else(|| RagError::CollectionNotFound(collection.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(document_id: &str, seq: usize) -> ChunkMetadata {
        ChunkMetadata {
            document_id: document_id.to_string(),
            title: "T".to_string(),
            chunk_seq_number: seq,
        }
    }

    #[tokio::test]
    async fn test_nearest_orders_by_ascending_distance() {
        let store = InMemoryVectorStore::new();
        store.create_or_load_collection("c").await.unwrap();
        store
            .upsert(
                "c",
                &["far".to_string(), "near".to_string(), "mid".to_string()],
                &[vec![-1.0, 0.0], vec![1.0, 0.1], vec![0.5, 0.5]],
                &["far".to_string(), "near".to_string(), "mid".to_string()],
                &[metadata("d", 0), metadata("d", 1), metadata("d", 2)],
            )
            .await
            .unwrap();

        let hits = store.nearest("c", &[1.0, 0.0], 2).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record.id, "near");
        assert_eq!(hits[1].record.id, "mid");
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[tokio::test]
    async fn test_upsert_into_missing_collection_fails() {
        let store = InMemoryVectorStore::new();
        let result = store
            .upsert("nope", &["a".to_string()], &[vec![1.0]], &["a".to_string()], &[metadata("d", 0)])
            .await;
        assert!(matches!(result, Err(RagError::CollectionNotFound(_))));
    }

    #[tokio::test]
    async fn test_reads_from_missing_collection_fail() {
        let store = InMemoryVectorStore::new();

        assert!(matches!(
            store.get_by_document_id("absent", "d1").await,
            Err(RagError::CollectionNotFound(_))
        ));
        assert!(matches!(
            store.nearest("absent", &[1.0], 4).await,
            Err(RagError::CollectionNotFound(_))
        ));
        assert!(matches!(
            store.count("absent").await,
            Err(RagError::CollectionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_dimension_is_fixed_by_first_upsert() {
        let store = InMemoryVectorStore::new();
        store.create_or_load_collection("c").await.unwrap();
        store
            .upsert("c", &["a".to_string()], &[vec![1.0, 2.0]], &["a".to_string()], &[metadata("d", 0)])
            .await
            .unwrap();

        let result = store
            .upsert("c", &["b".to_string()], &[vec![1.0, 2.0, 3.0]], &["b".to_string()], &[metadata("d", 1)])
            .await;

        assert!(matches!(result, Err(RagError::SchemaMismatch { expected: 2, actual: 3, .. })));
        let info = store.create_or_load_collection("c").await.unwrap();
        assert_eq!(info.dimension, Some(2));
        assert_eq!(info.record_count, 1);
    }
}
