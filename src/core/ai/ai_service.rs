use super::models::{AiConfig, AiMessage};
use crate::core::embedding::{Embedder, EmbeddingProvider};
use crate::core::errors::RagError;
use crate::core::retry::RetryPolicy;
use crate::core::vector_store::{EmbeddingDb, ScoredRecord, VectorStore};
use async_trait::async_trait;

/// Returned when the model produced nothing usable.
pub const FALLBACK_ANSWER: &str = "I don't know.";

const SYSTEM_PROMPT: &str = "Use the following pieces of context to answer the user's question.\n\
If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\
----------------";

#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Sends a chat completion request and returns the assistant's reply text.
    async fn chat_complete(
        &self,
        messages: &[AiMessage],
        config: &AiConfig,
    ) -> Result<String, RagError>;
}

/// Question answering over the stored chunks: embed the query, pull the
/// nearest chunks, stuff them into one prompt, ask the model.
pub struct QaService<E: EmbeddingProvider, S: VectorStore, P: AiProvider> {
    embedder: Embedder<E>,
    db: EmbeddingDb<S>,
    provider: P,
    config: AiConfig,
    top_k: usize,
    retry: RetryPolicy,
}

impl<E: EmbeddingProvider, S: VectorStore, P: AiProvider> QaService<E, S, P> {
    pub fn new(
        embedder: Embedder<E>,
        db: EmbeddingDb<S>,
        provider: P,
        config: AiConfig,
        top_k: usize,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            embedder,
            db,
            provider,
            config,
            top_k,
            retry,
        }
    }

    /// Nearest chunks for `query`. An empty result is reported as `RetrievalEmpty`.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredRecord>, RagError> {
        let vector = self.embedder.embed_query(query).await?;
        let hits = self.db.nearest(&vector, self.top_k).await?;
        if hits.is_empty() {
            return Err(RagError::RetrievalEmpty);
        }
        Ok(hits)
    }

    pub async fn ask(&self, query: &str) -> Result<String, RagError> {
        let hits = match self.retrieve(query).await {
            Ok(hits) => hits,
            Err(RagError::RetrievalEmpty) => {
                tracing::warn!("{}; answering without context", RagError::RetrievalEmpty);
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        tracing::debug!(
            hits = hits.len(),
            closest = ?hits.first().map(|h| h.distance),
            "Retrieved context"
        );

        let contexts: Vec<&str> = hits.iter().map(|h| h.record.text.as_str()).collect();
        let messages = build_messages(query, &contexts);

        let provider = &self.provider;
        let config = &self.config;
        let messages = &messages;
        let answer = self
            .retry
            .run("chat completion", move || {
                provider.chat_complete(messages, config)
            })
            .await?;

        let answer = answer.trim();
        if answer.is_empty() {
            Ok(FALLBACK_ANSWER.to_string())
        } else {
            Ok(answer.to_string())
        }
    }
}

/// System prompt carrying every retrieved chunk, followed by the question.
pub fn build_messages(query: &str, contexts: &[&str]) -> Vec<AiMessage> {
    let system = format!("{}\n{}", SYSTEM_PROMPT, contexts.join("\n\n"));
    vec![AiMessage::system(system), AiMessage::user(query)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::documents::DocumentMetadata;
    use crate::core::embedding::embedding_service::tests::{char_chunker, FakeEmbeddings};
    use crate::infra::vector_store::InMemoryVectorStore;
    use std::sync::Mutex;

    /// Records the prompt it was given and replies with a canned answer.
    struct EchoProvider {
        reply: String,
        seen: Mutex<Vec<Vec<AiMessage>>>,
    }

    impl EchoProvider {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AiProvider for EchoProvider {
        async fn chat_complete(
            &self,
            messages: &[AiMessage],
            _config: &AiConfig,
        ) -> Result<String, RagError> {
            self.seen.lock().unwrap().push(messages.to_vec());
            Ok(self.reply.clone())
        }
    }

    async fn service(
        reply: &str,
    ) -> QaService<FakeEmbeddings, InMemoryVectorStore, EchoProvider> {
        let embedder = Embedder::new(
            FakeEmbeddings::default(),
            char_chunker(100),
            RetryPolicy::no_retry(),
        );
        let db = EmbeddingDb::open(InMemoryVectorStore::new(), "docs", false)
            .await
            .unwrap();
        QaService::new(
            embedder,
            db,
            EchoProvider::new(reply),
            AiConfig::default(),
            2,
            RetryPolicy::no_retry(),
        )
    }

    #[tokio::test]
    async fn test_empty_collection_still_answers() {
        let qa = service("  ").await;

        assert!(matches!(
            qa.retrieve("anything").await,
            Err(RagError::RetrievalEmpty)
        ));
        let answer = qa.ask("anything").await.unwrap();

        assert_eq!(answer, FALLBACK_ANSWER);
        let seen = qa.provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0][1], AiMessage::user("anything"));
    }

    #[tokio::test]
    async fn test_retrieved_chunks_are_stuffed_into_prompt() {
        let qa = service("The launch is in May.").await;
        let chunks = vec![
            "launch date: May".to_string(),
            "budget: small".to_string(),
            "zzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz".to_string(),
        ];
        let vectors = qa.embedder.embed(&chunks).await.unwrap();
        let doc = DocumentMetadata {
            document_id: "d1".to_string(),
            title: "Plan".to_string(),
        };
        qa.db
            .insert_documents(&chunks, &vectors, &[doc], &[0, 0, 0], &[0, 1, 2])
            .await
            .unwrap();

        let answer = qa.ask("when is launch").await.unwrap();

        assert_eq!(answer, "The launch is in May.");
        let seen = qa.provider.seen.lock().unwrap();
        let system = &seen[0][0];
        assert_eq!(system.role, "system");
        // top_k = 2, so exactly two of the three chunks are in the context.
        let included = chunks.iter().filter(|c| system.content.contains(c.as_str())).count();
        assert_eq!(included, 2);
    }

    #[tokio::test]
    async fn test_oversized_query_is_rejected_before_retrieval() {
        let qa = service("unused").await;

        let result = qa.ask(&"q".repeat(6000)).await;

        assert!(matches!(result, Err(RagError::InputTooLarge { .. })));
        assert!(qa.provider.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_build_messages_joins_contexts() {
        let messages = build_messages("why?", &["one", "two"]);
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.ends_with("----------------\none\n\ntwo"));
        assert_eq!(messages[1].content, "why?");
    }

    /// Fails its first call with a rate limit, then answers.
    #[derive(Default)]
    struct RateLimitedOnce {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl AiProvider for RateLimitedOnce {
        async fn chat_complete(
            &self,
            _messages: &[AiMessage],
            _config: &AiConfig,
        ) -> Result<String, RagError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls == 1 {
                Err(RagError::transient("chat", "429 Too Many Requests"))
            } else {
                Ok("Second time lucky.".to_string())
            }
        }
    }

    #[tokio::test]
    async fn test_transient_chat_failure_is_retried() {
        let embedder = Embedder::new(
            FakeEmbeddings::default(),
            char_chunker(100),
            RetryPolicy::no_retry(),
        );
        let db = EmbeddingDb::open(InMemoryVectorStore::new(), "docs", false)
            .await
            .unwrap();
        let qa = QaService::new(
            embedder,
            db,
            RateLimitedOnce::default(),
            AiConfig::default(),
            2,
            RetryPolicy::immediate(2),
        );

        let answer = qa.ask("anything").await.unwrap();

        assert_eq!(answer, "Second time lucky.");
        assert_eq!(*qa.provider.calls.lock().unwrap(), 2);
    }
}
