//! # elk-cli
//!
//! The `elktail` command: tail log entries stored in Elasticsearch.
//!
//! A run merges command-line flags with the saved settings, optionally opens
//! an SSH tunnel to reach the cluster, then lists or follows entries.
//!
//! ```text
//! ┌─────────┐  flags   ┌────────────┐  HTTP (maybe via  ┌───────────────┐
//! │ elktail ├─────────►│ elk-search ├──── elk-tunnel) ─►│ Elasticsearch │
//! └────┬────┘          └────────────┘                   └───────────────┘
//!      │ ~/.elktail/default.json
//!      ▼
//! ┌────────────┐
//! │ elk-config │
//! └────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod app;
pub mod cli;
pub mod error;
pub mod logging;
pub mod prompt;

pub use cli::{Cli, Invocation};
pub use error::CliError;
pub use logging::Verbosity;
