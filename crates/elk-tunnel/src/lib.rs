//! # elk-tunnel
//!
//! Local port forwarding over SSH, used to reach an Elasticsearch cluster
//! that is only visible from a bastion host.
//!
//! This crate provides:
//!
//! - [`Endpoint`] — A host and port
//! - [`parse_ssh_host`] / [`parse_forward`] — Compact host-spec parsing
//! - [`SshTunnel`] — Listener plus per-connection SSH forwarding
//! - [`PasswordSource`] — Password fallback when agent authentication fails

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod endpoint;
pub mod error;
pub mod tunnel;

// Re-export main types
pub use endpoint::{
    DEFAULT_LOCAL_PORT, DEFAULT_REMOTE_HOST, DEFAULT_REMOTE_PORT, DEFAULT_SSH_PORT, Endpoint,
    Forward, SshHost, current_user, parse_forward, parse_port, parse_ssh_host,
    parse_ssh_host_with, split_local_port,
};
pub use error::{Result, TunnelError};
pub use tunnel::{NoPassword, PasswordSource, SESSION_TIMEOUT, SshTunnel};
