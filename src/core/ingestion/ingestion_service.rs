// Page-by-page ingestion: list → fetch → flatten → chunk/embed → correlate/upsert.
//
// Each page is fully written before the next listing request goes out. Upserts
// are idempotent, so an interrupted run can simply be started again: pages that
// were already committed are overwritten with identical records.

use crate::core::documents::{Document, DocumentMetadata, DocumentSource};
use crate::core::embedding::{Embedder, EmbeddingProvider};
use crate::core::errors::RagError;
use crate::core::retry::RetryPolicy;
use crate::core::vector_store::{EmbeddingDb, VectorStore};

/// Documents requested per listing call.
pub const PAGE_SIZE: usize = 50;

/// Running totals for an ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestionReport {
    pub documents: usize,
    pub chunks: usize,
    pub pages: usize,
}

/// Result of ingesting a single page.
#[derive(Debug, Clone, Default)]
pub struct PageOutcome {
    pub documents: usize,
    pub chunks: usize,
    pub next_page_token: Option<String>,
}

pub struct IngestionService<D: DocumentSource, E: EmbeddingProvider, S: VectorStore> {
    source: D,
    embedder: Embedder<E>,
    db: EmbeddingDb<S>,
    retry: RetryPolicy,
    page_size: usize,
}

impl<D: DocumentSource, E: EmbeddingProvider, S: VectorStore> IngestionService<D, E, S> {
    pub fn new(source: D, embedder: Embedder<E>, db: EmbeddingDb<S>, retry: RetryPolicy) -> Self {
        Self {
            source,
            embedder,
            db,
            retry,
            page_size: PAGE_SIZE,
        }
    }

    #[cfg(test)]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn db(&self) -> &EmbeddingDb<S> {
        &self.db
    }

    /// Ingests pages until `maximum_items` documents are stored or the source runs out.
    /// `on_page` is called with the running totals after every committed page.
    pub async fn run<F>(
        &self,
        maximum_items: usize,
        mut on_page: F,
    ) -> Result<IngestionReport, RagError>
    where
        F: FnMut(&IngestionReport),
    {
        let mut report = IngestionReport::default();
        let mut page_token: Option<String> = None;

        while report.documents < maximum_items {
            let limit = self.page_size.min(maximum_items - report.documents);
            let outcome = self.ingest_page(page_token.as_deref(), limit).await?;

            report.pages += 1;
            report.documents += outcome.documents;
            report.chunks += outcome.chunks;
            on_page(&report);

            match outcome.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        tracing::info!(
            documents = report.documents,
            chunks = report.chunks,
            pages = report.pages,
            "Ingestion finished"
        );

        Ok(report)
    }

    /// Lists up to `limit` documents after `page_token`, then fetches, embeds and stores them.
    pub async fn ingest_page(
        &self,
        page_token: Option<&str>,
        limit: usize,
    ) -> Result<PageOutcome, RagError> {
        let source = &self.source;
        let page = self
            .retry
            .run("list documents", move || source.list_documents(limit, page_token))
            .await?;

        tracing::debug!(
            listed = page.documents.len(),
            has_more = page.next_page_token.is_some(),
            "Listed documents"
        );

        let mut documents: Vec<Document> = Vec::with_capacity(page.documents.len());
        for listing in &page.documents {
            let id = listing.id.as_str();
            let source_doc = self
                .retry
                .run("fetch document", move || source.fetch_document(id))
                .await?;
            let document = Document::from(source_doc);
            tracing::debug!(
                document_id = %document.id,
                title = %document.title,
                chars = document.text.len(),
                "Fetched document"
            );
            documents.push(document);
        }

        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let doc_metadatas: Vec<DocumentMetadata> = documents.iter().map(Document::metadata).collect();

        let batch = self.embedder.embed_documents(&texts).await?;
        let written = self
            .db
            .insert_documents(
                &batch.chunks,
                &batch.vectors,
                &doc_metadatas,
                &batch.origin_indexes,
                &batch.chunk_seq_numbers,
            )
            .await?;

        tracing::info!(
            documents = documents.len(),
            chunks = written,
            "Stored page"
        );

        Ok(PageOutcome {
            documents: documents.len(),
            chunks: written,
            next_page_token: page.next_page_token,
        })
    }
}
