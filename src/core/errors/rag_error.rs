// Error taxonomy shared by every part of the pipeline.
// The core layer only speaks in these variants; the infra layer translates
// HTTP/SQL failures into them so callers never see reqwest or sqlx types.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    /// Query text is over the embedding length ceiling. Raised before any network call.
    #[error("Input too large: {length} characters (limit is below {limit})")]
    InputTooLarge { length: usize, limit: usize },

    /// Vector dimension differs from the vectors already stored in the collection.
    #[error("Schema mismatch in collection '{collection}': expected dimension {expected}, got {actual}")]
    SchemaMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },

    /// Any failure talking to the document source, embedding provider or language model.
    #[error("{service} request failed: {message}")]
    RemoteService {
        service: String,
        message: String,
        /// Timeouts, connection resets, HTTP 429 and 5xx. Only these are retried.
        transient: bool,
    },

    /// Nearest-neighbour search found nothing. Non-fatal for the answerer.
    #[error("No stored chunks matched the query")]
    RetrievalEmpty,

    #[error("Length mismatch: {left_name} has {left} entries but {right_name} has {right}")]
    LengthMismatch {
        left_name: &'static str,
        left: usize,
        right_name: &'static str,
        right: usize,
    },

    #[error("Chunk {position} points at document index {origin}, but only {documents} documents were supplied")]
    InvalidOrigin {
        position: usize,
        origin: usize,
        documents: usize,
    },

    #[error("Collection '{0}' does not exist")]
    CollectionNotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{operation} did not complete within {deadline:?}")]
    DeadlineExceeded {
        operation: String,
        deadline: Duration,
    },
}

impl RagError {
    /// A remote failure that is worth retrying.
    pub fn transient(service: impl Into<String>, message: impl Into<String>) -> Self {
        RagError::RemoteService {
            service: service.into(),
            message: message.into(),
            transient: true,
        }
    }

    /// A remote failure that will not get better on its own (bad credentials, bad request).
    pub fn permanent(service: impl Into<String>, message: impl Into<String>) -> Self {
        RagError::RemoteService {
            service: service.into(),
            message: message.into(),
            transient: false,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RagError::RemoteService {
                transient: true,
                ..
            }
        )
    }
}
