//! Error types for SSH tunnelling.

use thiserror::Error;

/// Errors that can occur while setting up or running a tunnel.
#[derive(Debug, Error)]
pub enum TunnelError {
    /// The SSH host spec could not be parsed.
    #[error("failed to parse ssh host '{spec}'")]
    InvalidHostSpec {
        /// The spec as given.
        spec: String,
    },

    /// No user was given and the current OS user could not be detected.
    #[error(
        "could not detect current username to use when connecting via ssh; \
         specify one as your_username@{host}"
    )]
    UserDetection {
        /// Host the user was needed for.
        host: String,
    },

    /// The local listener could not be opened.
    #[error("failed to listen on {address}: {source}")]
    Bind {
        /// Address that was tried.
        address: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An SSH protocol operation failed.
    #[error("ssh error: {0}")]
    Ssh(#[from] ssh2::Error),

    /// Every authentication method was rejected.
    #[error("ssh authentication failed for {user}@{server}")]
    AuthFailed {
        /// SSH user.
        user: String,
        /// SSH server endpoint.
        server: String,
    },

    /// No password could be obtained.
    #[error("failed to read ssh password: {message}")]
    Password {
        /// Description of the failure.
        message: String,
    },

    /// I/O failure on a socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TunnelError {
    /// Creates a `Password` error with a message.
    #[must_use]
    pub fn password(message: impl Into<String>) -> Self {
        Self::Password {
            message: message.into(),
        }
    }
}

/// Result type alias for tunnel operations.
pub type Result<T> = std::result::Result<T, TunnelError>;
