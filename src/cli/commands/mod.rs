// One file per subcommand.

pub mod ask;
pub mod ingest;
