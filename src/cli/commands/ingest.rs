use crate::core::documents::DocumentSource;
use crate::core::embedding::EmbeddingProvider;
use crate::core::ingestion::{IngestionReport, IngestionService};
use crate::core::vector_store::VectorStore;
use anyhow::{bail, Context, Result};
use std::future::Future;

/// Progress line printed after every stored page.
pub fn progress_line(report: &IngestionReport, maximum_items: usize) -> String {
    format!(
        "ITEMS_SAVED // MAXIMUM_ITEMS : {} // {}",
        report.documents, maximum_items
    )
}

/// Runs ingestion until it finishes or Ctrl-C is pressed.
pub async fn run<D, E, S>(
    ingestion: &IngestionService<D, E, S>,
    maximum_items: usize,
) -> Result<IngestionReport>
where
    D: DocumentSource,
    E: EmbeddingProvider,
    S: VectorStore,
{
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Ctrl-C handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    };
    run_until(ingestion, maximum_items, ctrl_c).await
}

/// Runs ingestion until it finishes or `shutdown` resolves.
///
/// An interrupted run is an error, so the process exits non-zero. Pages
/// committed before the interrupt stay in the store; the page in flight is
/// dropped.
pub async fn run_until<D, E, S, F>(
    ingestion: &IngestionService<D, E, S>,
    maximum_items: usize,
    shutdown: F,
) -> Result<IngestionReport>
where
    D: DocumentSource,
    E: EmbeddingProvider,
    S: VectorStore,
    F: Future<Output = ()>,
{
    let ingest = ingestion.run(maximum_items, |report| {
        println!("{}", progress_line(report, maximum_items));
    });

    tokio::select! {
        result = ingest => {
            let report = result.context("ingestion failed")?;
            let stored = ingestion
                .db()
                .count()
                .await
                .context("failed to count stored chunks")?;
            tracing::info!(
                documents = report.documents,
                chunks = report.chunks,
                stored,
                "Collection updated"
            );
            Ok(report)
        }
        _ = shutdown => {
            tracing::warn!("Interrupted; pages stored so far are kept");
            bail!("ingestion interrupted before completion")
        }
    }
}
