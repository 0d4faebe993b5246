// Chunking + embedding of whole documents.
//
// `Embedder::embed_documents` is where the three aligned lists are born:
// the flat chunk list, the index of the document each chunk came from, and
// the chunk's sequence number inside that document. Everything downstream
// (correlation, upsert) relies on them staying the same length and order.

use crate::core::chunking::TextChunker;
use crate::core::errors::RagError;
use crate::core::retry::RetryPolicy;
use async_trait::async_trait;

/// Queries must be strictly shorter than this many characters.
pub const MAX_QUERY_CHARS: usize = 5000;

/// An embedding model behind some API.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns one vector per input, in input order. One call is one request.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError>;

    /// Embeds a single piece of text (used for queries).
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, RagError>;
}

/// Output of embedding a batch of documents. All four vectors are positionally aligned.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedBatch {
    pub chunks: Vec<String>,
    pub vectors: Vec<Vec<f32>>,
    /// `origin_indexes[i]` is the index (into the input documents) that `chunks[i]` came from.
    pub origin_indexes: Vec<usize>,
    /// `chunk_seq_numbers[i]` is the zero-based position of `chunks[i]` within its document.
    pub chunk_seq_numbers: Vec<usize>,
}

/// How many chunks go into one embeddings request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_inputs: usize,
    /// Summed tokens of all inputs in one request. A single input larger
    /// than this is still sent, alone.
    pub max_tokens: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        // OpenAI caps a request at 2048 inputs and 300k tokens.
        Self {
            max_inputs: 512,
            max_tokens: 250_000,
        }
    }
}

pub struct Embedder<P: EmbeddingProvider> {
    provider: P,
    chunker: TextChunker,
    retry: RetryPolicy,
    limits: BatchLimits,
}

impl<P: EmbeddingProvider> Embedder<P> {
    pub fn new(provider: P, chunker: TextChunker, retry: RetryPolicy) -> Self {
        Self {
            provider,
            chunker,
            retry,
            limits: BatchLimits::default(),
        }
    }

    pub fn with_batch_limits(mut self, limits: BatchLimits) -> Self {
        self.limits = BatchLimits {
            max_inputs: limits.max_inputs.max(1),
            max_tokens: limits.max_tokens.max(1),
        };
        self
    }

    /// Chunks every document and embeds all chunks.
    pub async fn embed_documents(&self, documents: &[String]) -> Result<EmbeddedBatch, RagError> {
        let mut batch = EmbeddedBatch::default();

        for (index, document) in documents.iter().enumerate() {
            let chunks = self.chunker.split(document);
            let count = chunks.len();
            batch.chunks.extend(chunks);
            batch.origin_indexes.extend(std::iter::repeat(index).take(count));
            batch.chunk_seq_numbers.extend(0..count);
        }

        tracing::debug!(
            documents = documents.len(),
            chunks = batch.chunks.len(),
            "Split documents into chunks"
        );

        batch.vectors = self.embed(&batch.chunks).await?;
        Ok(batch)
    }

    /// Embeds texts one-to-one. An empty input makes no remote call.
    ///
    /// Texts are sent in batches bounded by `BatchLimits`, and each batch is
    /// retried on its own, so a failure late in the list never re-sends
    /// batches that already succeeded.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let mut vectors = Vec::with_capacity(texts.len());

        for (batch_number, batch) in self.batches(texts).into_iter().enumerate() {
            tracing::debug!(
                batch = batch_number,
                inputs = batch.len(),
                "Embedding batch"
            );

            let provider = &self.provider;
            let embedded = self
                .retry
                .run("embed documents", move || provider.embed(batch))
                .await?;

            if embedded.len() != batch.len() {
                return Err(RagError::permanent(
                    "embeddings",
                    format!(
                        "provider returned {} vectors for {} inputs",
                        embedded.len(),
                        batch.len()
                    ),
                ));
            }
            vectors.extend(embedded);
        }

        Ok(vectors)
    }

    /// Cuts `texts` into consecutive runs that respect both batch limits.
    fn batches<'a>(&self, texts: &'a [String]) -> Vec<&'a [String]> {
        let mut batches = Vec::new();
        let mut start = 0;
        let mut tokens = 0;

        for (i, text) in texts.iter().enumerate() {
            let size = self.chunker.count_tokens(text);
            let full = i - start == self.limits.max_inputs;
            if i > start && (full || tokens + size > self.limits.max_tokens) {
                batches.push(&texts[start..i]);
                start = i;
                tokens = 0;
            }
            tokens += size;
        }

        if start < texts.len() {
            batches.push(&texts[start..]);
        }
        batches
    }

    /// Embeds a query. Text of `MAX_QUERY_CHARS` characters or more is rejected up front.
    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>, RagError> {
        let length = query.chars().count();
        if length >= MAX_QUERY_CHARS {
            return Err(RagError::InputTooLarge {
                length,
                limit: MAX_QUERY_CHARS,
            });
        }

        let provider = &self.provider;
        self.retry
            .run("embed query", move || provider.embed_one(query))
            .await
    }
}
