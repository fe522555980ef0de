//! Shopfloor CLI library.
//!
//! This crate provides the CLI interface for the factory metrics store.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, MetricsTarget, StationsAction, WorkersAction};
pub use config::Config;
