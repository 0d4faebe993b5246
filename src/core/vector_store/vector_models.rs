use serde::{Deserialize, Serialize};

/// Metadata stored next to every chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub document_id: String,
    pub title: String,
    pub chunk_seq_number: usize,
}

/// The persisted unit of the vector store.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A search hit: the record plus its cosine distance to the query vector (lower is closer).
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: ChunkRecord,
    pub distance: f32,
}

/// Summary of a loaded collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    pub name: String,
    /// Fixed by the first upsert; `None` while the collection is empty of vectors.
    pub dimension: Option<usize>,
    pub record_count: usize,
}

/// Stable, deterministic id for a chunk: re-ingesting the same chunk overwrites it.
pub fn chunk_record_id(document_id: &str, chunk_seq_number: usize) -> String {
    format!("{}__chunk_id={}", document_id, chunk_seq_number)
}

/// Cosine distance (`1 - cosine similarity`). Vectors of different length or
/// with zero norm are treated as unrelated (distance 1.0).
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 1.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }

    1.0 - dot / (norm_a * norm_b)
}

/// Orders hits by ascending distance and keeps the first `k`.
pub fn top_k_by_distance(mut hits: Vec<ScoredRecord>, k: usize) -> Vec<ScoredRecord> {
    hits.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.record.id.cmp(&b.record.id))
    });
    hits.truncate(k);
    hits
}
