//! # elk-config
//!
//! Saved settings for elktail.
//!
//! This crate provides:
//!
//! - [`Configuration`] — The settings of one run, persisted fields marked
//! - [`ConfigStore`] — Loads and saves `~/.elktail/default.json`
//! - [`merge_query_terms`] — How ad-hoc query terms combine with saved ones

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod settings;
pub mod store;

// Re-export main types
pub use error::{ConfigError, Result};
pub use settings::{
    CONFIG_RELEVANT_FLAGS, Configuration, DEFAULT_INITIAL_ENTRIES, merge_query_terms,
};
pub use store::{CONFIG_DIR, ConfigStore, DEFAULT_CONFIG_FILE};
