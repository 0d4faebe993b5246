// SQLite-backed VectorStore.
//
// Every collection lives in one database file under the store directory, so
// collections survive process restarts. Vectors are stored as JSON arrays and
// nearest-neighbour search is a brute-force cosine scan over one collection,
// which is plenty for a few thousand documents.

use crate::core::errors::RagError;
use crate::core::vector_store::{
    cosine_distance, top_k_by_distance, validate_upsert, ChunkMetadata, ChunkRecord,
    CollectionInfo, ScoredRecord, VectorStore,
};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;

pub const DATABASE_FILE: &str = "vector_store.db";

impl From<sqlx::Error> for RagError {
    fn from(err: sqlx::Error) -> Self {
        RagError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for RagError {
    fn from(err: serde_json::Error) -> Self {
        RagError::Storage(format!("vector (de)serialization failed: {}", err))
    }
}

pub struct SqliteVectorStore {
    pool: Pool<Sqlite>,
}

impl SqliteVectorStore {
    /// Opens (or creates) the store inside `directory`.
    pub async fn open(directory: impl AsRef<Path>) -> Result<Self, RagError> {
        let directory = directory.as_ref();
        std::fs::create_dir_all(directory).map_err(|e| {
            RagError::Storage(format!(
                "failed to create vector store directory {}: {}",
                directory.display(),
                e
            ))
        })?;

        let options = SqliteConnectOptions::new()
            .filename(directory.join(DATABASE_FILE))
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        let store = Self::new(pool);
        store.migrate().await?;
        tracing::debug!(directory = %directory.display(), "Opened SQLite vector store");
        Ok(store)
    }

    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), RagError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                dimension INTEGER,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunk_records (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                document_id TEXT NOT NULL,
                title TEXT NOT NULL,
                chunk_seq_number INTEGER NOT NULL,
                text TEXT NOT NULL,
                embedding TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (collection, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_chunk_records_document
            ON chunk_records(collection, document_id)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn stored_dimension(&self, collection: &str) -> Result<Option<usize>, RagError> {
        let row = sqlx::query("SELECT dimension FROM collections WHERE name = ?")
            .bind(collection)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RagError::CollectionNotFound(collection.to_string()))?;

        Ok(row
            .get::<Option<i64>, _>("dimension")
            .map(|d| d as usize))
    }

    /// Reads against a missing collection fail the same way upserts do.
    async fn ensure_collection(&self, collection: &str) -> Result<(), RagError> {
        self.stored_dimension(collection).await.map(|_| ())
    }

    fn record_from_row(row: &SqliteRow) -> Result<ChunkRecord, RagError> {
        let embedding: String = row.get("embedding");
        Ok(ChunkRecord {
            id: row.get("id"),
            vector: serde_json::from_str(&embedding)?,
            text: row.get("text"),
            metadata: ChunkMetadata {
                document_id: row.get("document_id"),
                title: row.get("title"),
                chunk_seq_number: row.get::<i64, _>("chunk_seq_number") as usize,
            },
        })
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn create_or_load_collection(&self, name: &str) -> Result<CollectionInfo, RagError> {
        sqlx::query(
            r#"
            INSERT INTO collections (name, dimension, created_at)
            VALUES (?, NULL, ?)
            ON CONFLICT(name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        let dimension = self.stored_dimension(name).await?;
        let record_count = self.count(name).await?;

        Ok(CollectionInfo {
            name: name.to_string(),
            dimension,
            record_count,
        })
    }

    async fn delete_collection(&self, name: &str) -> Result<(), RagError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunk_records WHERE collection = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM collections WHERE name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool, RagError> {
        let row = sqlx::query("SELECT 1 FROM collections WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn upsert(
        &self,
        collection: &str,
        ids: &[String],
        vectors: &[Vec<f32>],
        texts: &[String],
        metadatas: &[ChunkMetadata],
    ) -> Result<usize, RagError> {
        let stored = self.stored_dimension(collection).await?;
        let Some(dimension) = validate_upsert(collection, ids, vectors, texts, metadatas, stored)?
        else {
            return Ok(0);
        };

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        if stored.is_none() {
            sqlx::query("UPDATE collections SET dimension = ? WHERE name = ?")
                .bind(dimension as i64)
                .bind(collection)
                .execute(&mut *tx)
                .await?;
        }

        for (((id, vector), text), metadata) in ids.iter().zip(vectors).zip(texts).zip(metadatas) {
            let embedding = serde_json::to_string(vector)?;
            sqlx::query(
                r#"
                INSERT INTO chunk_records
                    (collection, id, document_id, title, chunk_seq_number, text, embedding, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    document_id = excluded.document_id,
                    title = excluded.title,
                    chunk_seq_number = excluded.chunk_seq_number,
                    text = excluded.text,
                    embedding = excluded.embedding,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(collection)
            .bind(id)
            .bind(&metadata.document_id)
            .bind(&metadata.title)
            .bind(metadata.chunk_seq_number as i64)
            .bind(text)
            .bind(embedding)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::debug!(collection, records = ids.len(), "Upserted chunk records");
        Ok(ids.len())
    }

    async fn get_by_document_id(
        &self,
        collection: &str,
        document_id: &str,
    ) -> Result<Vec<ChunkRecord>, RagError> {
        self.ensure_collection(collection).await?;

        let rows = sqlx::query(
            r#"
            SELECT id, document_id, title, chunk_seq_number, text, embedding
            FROM chunk_records
            WHERE collection = ? AND document_id = ?
            ORDER BY chunk_seq_number ASC
            "#,
        )
        .bind(collection)
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::record_from_row).collect()
    }

    async fn nearest(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredRecord>, RagError> {
        self.ensure_collection(collection).await?;

        let rows = sqlx::query(
            r#"
            SELECT id, document_id, title, chunk_seq_number, text, embedding
            FROM chunk_records
            WHERE collection = ?
            "#,
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let record = Self::record_from_row(row)?;
            hits.push(ScoredRecord {
                distance: cosine_distance(vector, &record.vector),
                record,
            });
        }

        Ok(top_k_by_distance(hits, k))
    }

    async fn count(&self, collection: &str) -> Result<usize, RagError> {
        self.ensure_collection(collection).await?;

        let count: i64 = sqlx::query("SELECT COUNT(*) FROM chunk_records WHERE collection = ?")
            .bind(collection)
            .fetch_one(&self.pool)
            .await?
            .get(0);
        Ok(count as usize)
    }
}
