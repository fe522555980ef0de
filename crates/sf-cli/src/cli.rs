//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Factory floor activity metrics.
///
/// Stores worker/workstation observations from perception systems and turns
/// them into utilization, occupancy and throughput metrics.
#[derive(Debug, Parser)]
#[command(name = "sf", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show database location and row counts.
    Status,

    /// Replace all data with the standard six-worker, six-station roster.
    Seed,

    /// Delete all events, workers and workstations.
    Reset,

    /// Manage workers.
    #[command(subcommand)]
    Workers(WorkersAction),

    /// Manage workstations.
    #[command(subcommand)]
    Stations(StationsAction),

    /// Ingest a single event.
    Ingest {
        /// Worker the event refers to (e.g., W1).
        #[arg(long)]
        worker: String,

        /// Workstation the event refers to (e.g., S1).
        #[arg(long)]
        station: String,

        /// Event type: working, idle, absent or `product_count`.
        #[arg(long = "type")]
        event_type: String,

        /// Detection confidence between 0.0 and 1.0.
        #[arg(long)]
        confidence: f64,

        /// Units produced (required for `product_count`).
        #[arg(long, allow_negative_numbers = true)]
        count: Option<i64>,

        /// RFC 3339 timestamp (defaults to now).
        #[arg(long)]
        timestamp: Option<String>,
    },

    /// Ingest JSONL events from stdin as a single batch.
    Import,

    /// Print stored events as JSONL.
    Events {
        /// Only events for this worker.
        #[arg(long)]
        worker: Option<String>,

        /// Only events for this workstation.
        #[arg(long)]
        station: Option<String>,

        /// Only events of this type.
        #[arg(long = "type")]
        event_type: Option<String>,

        /// Only events at or after this time (ISO 8601 or relative like "2 hours ago").
        #[arg(long)]
        after: Option<String>,

        /// Only events at or before this time (ISO 8601 or relative like "1 hour ago").
        #[arg(long)]
        before: Option<String>,
    },

    /// Show computed metrics.
    #[command(subcommand)]
    Metrics(MetricsTarget),
}

/// Worker directory actions.
#[derive(Debug, Subcommand)]
pub enum WorkersAction {
    /// List all workers.
    List {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Add a worker.
    Add {
        /// Worker ID (e.g., W7).
        id: String,
        /// Display name.
        name: String,
    },
}

/// Workstation directory actions.
#[derive(Debug, Subcommand)]
pub enum StationsAction {
    /// List all workstations.
    List {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Add a workstation.
    Add {
        /// Workstation ID (e.g., S7).
        id: String,
        /// Display name.
        name: String,
        /// Station type (e.g., Assembly).
        #[arg(value_name = "TYPE")]
        kind: String,
    },
}

/// Which metrics to compute.
#[derive(Debug, Subcommand)]
pub enum MetricsTarget {
    /// Metrics for one worker.
    Worker {
        /// Worker ID.
        id: String,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Metrics for one workstation.
    Station {
        /// Workstation ID.
        id: String,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Factory summary with every worker and workstation.
    Factory {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}
