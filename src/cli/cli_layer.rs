// CLI layer - argument parsing and the two user-facing commands.
// Commands receive fully wired services from `main`, so they can be driven
// with fakes in tests.

#[path = "commands/mod.rs"]
pub mod commands;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "gdocs-qa",
    version,
    about = "Index your Google Docs into a local vector store and ask questions about them"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List, chunk, embed and store Google Docs
    Ingest(IngestArgs),
    /// Interactive question answering over the stored documents
    Ask,
}

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Stop after this many documents have been processed
    #[arg(long = "maximum_items", default_value_t = 1000)]
    pub maximum_items: usize,

    /// Delete the collection before ingesting
    #[arg(long = "reset_database", default_value_t = false)]
    pub reset_database: bool,
}
