//! Endpoints and host-spec parsing.
//!
//! Two compact forms are accepted:
//! - SSH host: `[user@]host[:port]`, port defaults to 22
//! - Forward: `[localport:]host[:port]`, defaults `9199:localhost:9200`

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{trace, warn};

use crate::error::{Result, TunnelError};

/// Default SSH port.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Default local listening port.
pub const DEFAULT_LOCAL_PORT: u16 = 9199;

/// Default remote port.
pub const DEFAULT_REMOTE_PORT: u16 = 9200;

/// Default remote host, as seen from the SSH server.
pub const DEFAULT_REMOTE_HOST: &str = "localhost";

/// Host the local listener binds to.
pub const LOCAL_HOST: &str = "localhost";

static SSH_HOST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"((\w*)@)?([^:@]+)(:(\d{2,5}))?").unwrap_or_else(|_| unreachable!())
});

static FORWARD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"((\d{2,5}):)?([^:@]+)(:(\d{2,5}))?").unwrap_or_else(|_| unreachable!())
});

static LEADING_LOCAL_PORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{2,5}):(.*\D.*)$").unwrap_or_else(|_| unreachable!()));

/// A host and port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Endpoint {
    /// Creates an endpoint.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A parsed SSH host spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshHost {
    /// SSH user.
    pub user: String,
    /// SSH server.
    pub server: Endpoint,
}

/// A parsed forward spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Forward {
    /// Local listening port.
    pub local_port: u16,
    /// Target, as reached from the SSH server.
    pub remote: Endpoint,
}

impl Default for Forward {
    fn default() -> Self {
        Self {
            local_port: DEFAULT_LOCAL_PORT,
            remote: Endpoint::new(DEFAULT_REMOTE_HOST, DEFAULT_REMOTE_PORT),
        }
    }
}

/// Parses a port, falling back to `default` when absent or invalid.
#[must_use]
pub fn parse_port(value: Option<&str>, default: u16) -> u16 {
    match value {
        None | Some("") => default,
        Some(value) => value.parse().unwrap_or_else(|e| {
            warn!(port = value, default, error = %e, "invalid port, reverting to default");
            default
        }),
    }
}

/// Parses `[user@]host[:port]`, filling in the current OS user when absent.
///
/// # Errors
///
/// Returns an error if nothing in `spec` looks like a host, or no user is
/// given and the current user cannot be detected.
pub fn parse_ssh_host(spec: &str) -> Result<SshHost> {
    parse_ssh_host_with(spec, current_user)
}

/// Like [`parse_ssh_host`], with an explicit user lookup.
///
/// # Errors
///
/// See [`parse_ssh_host`].
pub fn parse_ssh_host_with<F>(spec: &str, current_user: F) -> Result<SshHost>
where
    F: FnOnce() -> Option<String>,
{
    let caps = SSH_HOST
        .captures(spec)
        .ok_or_else(|| TunnelError::InvalidHostSpec {
            spec: spec.to_string(),
        })?;

    let host = caps.get(3).map_or("", |m| m.as_str()).to_string();
    let port = parse_port(caps.get(5).map(|m| m.as_str()), DEFAULT_SSH_PORT);
    let user = match caps.get(2).map(|m| m.as_str()) {
        Some(user) if !user.is_empty() => user.to_string(),
        _ => current_user()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| TunnelError::UserDetection { host: host.clone() })?,
    };

    trace!(user = %user, host = %host, port, "parsed ssh host");
    Ok(SshHost {
        user,
        server: Endpoint::new(host, port),
    })
}

/// Parses `[localport:]host[:port]`. Anything unparseable yields the defaults.
#[must_use]
pub fn parse_forward(spec: &str) -> Forward {
    let Some(caps) = FORWARD.captures(spec) else {
        trace!(spec, "could not parse forward spec, using defaults");
        return Forward::default();
    };

    let forward = Forward {
        local_port: parse_port(caps.get(2).map(|m| m.as_str()), DEFAULT_LOCAL_PORT),
        remote: Endpoint::new(
            caps.get(3).map_or(DEFAULT_REMOTE_HOST, |m| m.as_str()),
            parse_port(caps.get(5).map(|m| m.as_str()), DEFAULT_REMOTE_PORT),
        ),
    };
    trace!(local_port = forward.local_port, remote = %forward.remote, "parsed forward spec");
    forward
}

/// Splits a leading `localport:` off an SSH host spec.
///
/// `"9201:deploy@bastion:2222"` yields `(Some(9201), "deploy@bastion:2222")`.
/// A spec whose remainder is all digits (`"bastion:22"` style ports) is left
/// whole.
#[must_use]
pub fn split_local_port(spec: &str) -> (Option<u16>, &str) {
    match LEADING_LOCAL_PORT.captures(spec) {
        Some(caps) => {
            let port = caps.get(1).and_then(|m| m.as_str().parse().ok());
            let rest = caps.get(2).map_or(spec, |m| m.as_str());
            match port {
                Some(port) => (Some(port), rest),
                None => (None, spec),
            }
        }
        None => (None, spec),
    }
}

/// Name of the user running this process.
#[must_use]
pub fn current_user() -> Option<String> {
    match whoami::fallible::username() {
        Ok(user) => Some(user),
        Err(e) => {
            trace!(error = %e, "could not detect current user");
            None
        }
    }
}
