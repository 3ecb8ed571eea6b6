//! Command-line argument parsing with clap.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command, CommandFactory, FromArgMatches, Parser};
use elk_config::{CONFIG_RELEVANT_FLAGS, Configuration, DEFAULT_INITIAL_ENTRIES};
use elk_search::{DEFAULT_FORMAT, DEFAULT_INDEX_PATTERN, DEFAULT_TIMESTAMP_FIELD, DEFAULT_URL};

/// Tail log entries stored in Elasticsearch.
///
/// Options marked with (*) are saved between invocations. Giving any of them
/// replaces the previously saved settings.
#[derive(Parser, Debug, Clone)]
#[command(name = "elktail")]
#[command(version, about, long_about = None, disable_version_flag = true)]
pub struct Cli {
    /// (*) Elasticsearch URL.
    #[arg(long, default_value = DEFAULT_URL)]
    pub url: String,

    /// (*) Entry format; fields are referenced with %, e.g. '%@timestamp %message'.
    #[arg(short, long, default_value = DEFAULT_FORMAT)]
    pub format: String,

    /// (*) Index pattern; only the latest matching index is tailed.
    #[arg(short, long, default_value = DEFAULT_INDEX_PATTERN)]
    pub index_pattern: String,

    /// (*) Timestamp field used for sorting and tailing.
    #[arg(short, long, default_value = DEFAULT_TIMESTAMP_FIELD)]
    pub timestamp_field: String,

    /// List the results once, do not follow.
    #[arg(short, long)]
    pub list_only: bool,

    /// Number of entries fetched initially.
    #[arg(short = 'n', default_value_t = DEFAULT_INITIAL_ENTRIES)]
    pub initial_entries: usize,

    /// List entries at or after this date (e.g. "2016-06-17T15:00").
    #[arg(short, long)]
    pub after: Option<String>,

    /// List entries before this date (e.g. "2016-06-17T15:00").
    #[arg(short, long)]
    pub before: Option<String>,

    /// Save the query terms for the next invocation.
    ///
    /// Terms given to a later invocation are joined to the saved ones with AND.
    #[arg(short = 's')]
    pub save_query: bool,

    /// (*) User for HTTP basic auth; the password is prompted for.
    #[arg(short = 'u')]
    pub user: Option<String>,

    /// (*) Connect through an SSH tunnel: [localport:][user@]sshhost[:sshport].
    #[arg(long, visible_alias = "ssh-tunnel")]
    pub ssh: Option<String>,

    /// With --after and/or --before, fetch every entry in the range.
    #[arg(long = "all")]
    pub fetch_all: bool,

    /// Verbose output.
    #[arg(long = "v1")]
    pub verbose: bool,

    /// Even more verbose output.
    #[arg(long = "v2")]
    pub more_verbose: bool,

    /// Like --v2, and also trace requests and responses.
    #[arg(long = "v3")]
    pub trace_requests: bool,

    /// Directory holding saved settings.
    #[arg(long, env = "ELKTAIL_CONFIG_DIR", hide = true)]
    pub config_dir: Option<PathBuf>,

    /// Query string terms.
    #[arg(value_name = "QUERY")]
    pub query: Vec<String>,
}

impl Cli {
    /// Settings for this run, before saved settings and query terms are
    /// applied.
    #[must_use]
    pub fn to_configuration(&self) -> Configuration {
        let mut config = Configuration::default();
        config.search_target.url.clone_from(&self.url);
        config.search_target.index_pattern.clone_from(&self.index_pattern);
        config.query_definition.format.clone_from(&self.format);
        config
            .query_definition
            .timestamp_field
            .clone_from(&self.timestamp_field);
        config.query_definition.after = self.after.clone().filter(|s| !s.is_empty());
        config.query_definition.before = self.before.clone().filter(|s| !s.is_empty());
        config.initial_entries = self.initial_entries;
        config.list_only = self.list_only;
        config.user = self.user.clone().filter(|s| !s.is_empty());
        config.ssh_tunnel_params = self.ssh.clone().filter(|s| !s.is_empty());
        config.save_query = self.save_query;
        config.fetch_all = self.fetch_all;
        config.verbose = self.verbose;
        config.more_verbose = self.more_verbose;
        config.trace_requests = self.trace_requests;
        config
    }
}

/// The full command, with `-V, --print-version` in place of clap's version
/// flag.
#[must_use]
pub fn command() -> Command {
    Cli::command().arg(
        Arg::new("print_version")
            .short('V')
            .long("print-version")
            .help("Print the version")
            .action(ArgAction::Version),
    )
}

/// Parsed arguments, plus whether any saved setting was given explicitly.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// The parsed arguments.
    pub cli: Cli,
    /// True if any config-relevant flag appeared on the command line.
    pub config_flags_given: bool,
}

impl Invocation {
    /// Parses the process arguments, exiting on `--help`, `-V` or errors.
    #[must_use]
    pub fn parse() -> Self {
        let matches = command().get_matches();
        Self::from_matches(&matches).unwrap_or_else(|e| e.exit())
    }

    /// Parses `args`, the first of which is the program name.
    ///
    /// # Errors
    ///
    /// Returns the clap error for invalid arguments, help or version.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = command().try_get_matches_from(args)?;
        Self::from_matches(&matches)
    }

    fn from_matches(matches: &ArgMatches) -> Result<Self, clap::Error> {
        let cli = Cli::from_arg_matches(matches)?;
        let config_flags_given = CONFIG_RELEVANT_FLAGS.iter().any(|flag| {
            matches.value_source(&flag.replace('-', "_")) == Some(ValueSource::CommandLine)
        });
        Ok(Self {
            cli,
            config_flags_given,
        })
    }
}
