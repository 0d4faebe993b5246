use super::document_models::{DocumentPage, SourceDocument};
use crate::core::errors::RagError;
use async_trait::async_trait;

/// Where documents come from.
///
/// Authentication and session lifetime are the implementation's business;
/// the ingestion pipeline only pages through listings and fetches bodies.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Lists up to `page_size` documents, continuing from `page_token` when given.
    async fn list_documents(
        &self,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<DocumentPage, RagError>;

    /// Fetches the structured body of a single document.
    async fn fetch_document(&self, document_id: &str) -> Result<SourceDocument, RagError>;
}
