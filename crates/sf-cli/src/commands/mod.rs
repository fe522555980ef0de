//! CLI subcommand implementations.

pub mod directory;
pub mod events;
pub mod import;
pub mod ingest;
pub mod maintenance;
pub mod metrics;
pub mod status;
mod util;
