//! Terminal password prompts.

use std::io;

use console::Term;
use elk_tunnel::{Endpoint, TunnelError};

use crate::error::CliError;

/// Prints `prompt` to stderr and reads a line without echo.
fn read_password(prompt: &str) -> io::Result<String> {
    let term = Term::stderr();
    term.write_str(prompt)?;
    term.read_secure_line()
}

/// Reads the basic-auth password.
///
/// # Errors
///
/// Returns [`CliError::Prompt`] if the terminal cannot be read.
pub fn basic_auth_password() -> Result<String, CliError> {
    read_password("Enter password: ").map_err(CliError::Prompt)
}

/// Reads an SSH password. Used as the tunnel's password source.
///
/// # Errors
///
/// Returns [`TunnelError::Password`] if the terminal cannot be read.
pub fn ssh_password(user: &str, server: &Endpoint) -> elk_tunnel::Result<String> {
    read_password(&ssh_prompt(user, server)).map_err(|e| TunnelError::password(e.to_string()))
}

fn ssh_prompt(user: &str, server: &Endpoint) -> String {
    format!("{user}@{}'s password: ", server.host)
}
