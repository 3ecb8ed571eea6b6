//! CLI error types.

use elk_config::ConfigError;
use elk_search::{ErrorKind, SearchError};
use elk_tunnel::TunnelError;
use thiserror::Error;

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum CliError {
    /// Selecting, querying or displaying entries failed.
    #[error(transparent)]
    Search(#[from] SearchError),

    /// The SSH tunnel could not be set up.
    #[error(transparent)]
    Tunnel(#[from] TunnelError),

    /// Saved settings could not be handled.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The password could not be read from the terminal.
    #[error("failed to read password: {0}")]
    Prompt(#[source] std::io::Error),

    /// Arguments are inconsistent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Process exit code for this error.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Search(e) => match e.kind() {
                ErrorKind::Configuration => 2,
                ErrorKind::Backend => 3,
                ErrorKind::Document => 4,
                ErrorKind::Io => 1,
            },
            Self::Tunnel(_) => 5,
            Self::InvalidArgument(_) => 2,
            Self::Config(_) | Self::Prompt(_) | Self::Io(_) => 1,
        }
    }
}
