//! The settings of one run, and the rules for merging them with saved ones.

use elk_search::{QueryDefinition, SearchTarget};
use serde::{Deserialize, Deserializer, Serialize};

/// Default number of entries shown by the initial search.
pub const DEFAULT_INITIAL_ENTRIES: usize = 50;

/// Command-line flags whose presence means "don't load the saved default".
pub const CONFIG_RELEVANT_FLAGS: [&str; 6] =
    ["url", "format", "index-pattern", "timestamp-field", "user", "ssh"];

/// Keyword inserted between saved and ad-hoc query terms.
const AND: &str = "AND";

/// Settings for one run.
///
/// Only the search target, the query definition (terms, format, timestamp
/// field), the initial entry count, the user and the tunnel spec are
/// persisted. Everything else is per-run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Configuration {
    /// Where to search.
    pub search_target: SearchTarget,
    /// What to search for and how to display it.
    pub query_definition: QueryDefinition,
    /// Number of entries shown by the initial search.
    pub initial_entries: usize,
    /// List once and exit instead of following.
    #[serde(skip)]
    pub list_only: bool,
    /// Basic-auth user.
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "empty_as_none")]
    pub user: Option<String>,
    /// Basic-auth password; prompted for, never persisted.
    #[serde(skip)]
    pub password: Option<String>,
    /// `--v1`
    #[serde(skip)]
    pub verbose: bool,
    /// `--v2`
    #[serde(skip)]
    pub more_verbose: bool,
    /// `--v3`
    #[serde(skip)]
    pub trace_requests: bool,
    /// `[localport:][user@]host[:port]` of the SSH tunnel.
    #[serde(
        rename = "SSHTunnelParams",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_as_none"
    )]
    pub ssh_tunnel_params: Option<String>,
    /// Replace the saved query terms with this run's terms.
    #[serde(skip)]
    pub save_query: bool,
    /// Extract the whole date range instead of the last few entries.
    #[serde(skip)]
    pub fetch_all: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            search_target: SearchTarget::default(),
            query_definition: QueryDefinition::default(),
            initial_entries: DEFAULT_INITIAL_ENTRIES,
            list_only: false,
            user: None,
            password: None,
            verbose: false,
            more_verbose: false,
            trace_requests: false,
            ssh_tunnel_params: None,
            save_query: false,
            fetch_all: false,
        }
    }
}

fn empty_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.filter(|s| !s.is_empty()))
}

impl Configuration {
    /// Lists once without following: either asked for, or implied by a date
    /// range.
    #[must_use]
    pub const fn is_list_only(&self) -> bool {
        self.list_only || self.query_definition.is_date_time_filtered()
    }

    /// True if a date range was given and the whole range should be
    /// extracted.
    #[must_use]
    pub const fn is_range_extraction(&self) -> bool {
        self.fetch_all && self.query_definition.is_date_time_filtered()
    }

    /// Copies the persisted, config-relevant settings onto `other`.
    ///
    /// Per-run settings of `other` are left alone, as is its initial entry
    /// count, which always comes from the command line.
    pub fn copy_config_relevant_settings_to(&self, other: &mut Self) {
        other.search_target.url.clone_from(&self.search_target.url);
        other
            .search_target
            .index_pattern
            .clone_from(&self.search_target.index_pattern);
        other
            .query_definition
            .terms
            .clone_from(&self.query_definition.terms);
        other
            .query_definition
            .format
            .clone_from(&self.query_definition.format);
        other
            .query_definition
            .timestamp_field
            .clone_from(&self.query_definition.timestamp_field);
        other.user.clone_from(&self.user);
        other.ssh_tunnel_params.clone_from(&self.ssh_tunnel_params);
    }

    /// Applies this run's positional query terms and returns the settings
    /// that should be saved.
    ///
    /// With `save_query` the terms replace the saved ones and are saved.
    /// Otherwise they are merged into the current terms for this run only.
    #[must_use]
    pub fn apply_query_terms(&mut self, args: &[String]) -> Self {
        if self.save_query {
            self.query_definition.terms = args.to_vec();
            return self.clone();
        }
        let to_save = self.clone();
        self.query_definition.terms = merge_query_terms(&self.query_definition.terms, args);
        to_save
    }
}

/// Merges ad-hoc terms into saved ones.
///
/// No ad-hoc terms keeps the saved terms. Several saved terms are kept and
/// joined to the ad-hoc ones with `AND`; a single saved term is replaced.
#[must_use]
pub fn merge_query_terms(saved: &[String], args: &[String]) -> Vec<String> {
    if args.is_empty() {
        return saved.to_vec();
    }
    if saved.len() > 1 {
        let mut terms = Vec::with_capacity(saved.len() + args.len() + 1);
        terms.extend_from_slice(saved);
        terms.push(AND.to_string());
        terms.extend_from_slice(args);
        terms
    } else {
        args.to_vec()
    }
}
