// This is the entry point of gdocs-qa.
//
// **Architecture Overview:**
// - `core/` = Business logic (chunking, embedding, retrieval, ingestion)
// - `infra/` = Implementations of core traits (Google APIs, OpenAI, SQLite)
// - `cli/` = Argument parsing and the `ingest` / `ask` commands
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Dispatch to the chosen command

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "cli/cli_layer.rs"]
mod cli;
mod config;
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::cli::commands::{ask, ingest};
use crate::cli::{Cli, Command};
use crate::config::AppConfig;
use crate::core::ai::QaService;
use crate::core::chunking::{TextChunker, TiktokenCounter};
use crate::core::embedding::Embedder;
use crate::core::ingestion::IngestionService;
use crate::core::vector_store::EmbeddingDb;
use crate::infra::ai::{OpenAiChatClient, OpenAiEmbeddingClient};
use crate::infra::google_docs::GoogleDocsClient;
use crate::infra::vector_store::SqliteVectorStore;
use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    // Logs go to stderr so they don't interleave with progress lines and answers.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("failed to load configuration")?;

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // This is the "composition root" where we wire everything together.

    let embedder = build_embedder(&config)?;

    match cli.command {
        Command::Ingest(args) => {
            let db = open_database(&config, args.reset_database).await?;
            let google_docs = GoogleDocsClient::from_env(config.http_timeout)
                .await
                .context("failed to set up Google credentials")?;

            let ingestion = IngestionService::new(google_docs, embedder, db, config.retry.clone());

            tracing::info!(maximum_items = args.maximum_items, "Starting ingestion");
            ingest::run(&ingestion, args.maximum_items).await?;
        }
        Command::Ask => {
            let db = open_database(&config, false).await?;
            if db.count().await? == 0 {
                tracing::warn!(
                    collection = %db.collection(),
                    "Collection is empty; run `gdocs-qa ingest` first for grounded answers"
                );
            }

            let chat = OpenAiChatClient::new(
                config.openai_api_key.clone(),
                &config.openai_base_url,
                config.http_timeout,
            )?;

            let qa = QaService::new(
                embedder,
                db,
                chat,
                config.ai.clone(),
                config.top_k,
                config.retry.clone(),
            );

            ask::run(&qa).await?;
        }
    }

    Ok(())
}

fn build_embedder(config: &AppConfig) -> Result<Embedder<OpenAiEmbeddingClient>> {
    let counter = TiktokenCounter::cl100k()?;
    let chunker = TextChunker::new(Arc::new(counter), config.chunker)
        .context("invalid chunking configuration")?;

    let client = OpenAiEmbeddingClient::new(
        config.openai_api_key.clone(),
        &config.openai_base_url,
        config.embedding_model.clone(),
        config.http_timeout,
    )?;

    Ok(Embedder::new(client, chunker, config.retry.clone())
        .with_batch_limits(config.embedding_batch))
}

async fn open_database(config: &AppConfig, reset: bool) -> Result<EmbeddingDb<SqliteVectorStore>> {
    let store = SqliteVectorStore::open(&config.vector_store_dir)
        .await
        .with_context(|| {
            format!(
                "failed to open vector store in {}",
                config.vector_store_dir.display()
            )
        })?;

    EmbeddingDb::open(store, &config.collection_name, reset)
        .await
        .context("failed to open collection")
}
