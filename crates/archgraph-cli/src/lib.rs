//! archgraph CLI host
//!
//! Configuration loading, logging setup and the subcommands behind the
//! `archgraph` binary. Repositories live in snapshot JSON files; staged
//! changes and batches are JSON documents next to them.

#![warn(unreachable_pub)]

pub mod changes;
pub mod commands;
pub mod config;
pub mod logging;

pub use changes::ChangeDocument;
pub use commands::{
    CommitOutcome, HistoryReport, ImportOutcome, Stats, ValidationOutcome,
};
pub use config::{ArchgraphConfig, ConfigError, LoggingConfig};
