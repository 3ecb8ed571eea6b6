//! SSH local port forwarding.
//!
//! An [`SshTunnel`] listens on `localhost:<local port>`. Every accepted
//! connection gets its own SSH session to the server, authenticated with the
//! SSH agent first and a password second, and a `direct-tcpip` channel to the
//! remote endpoint. Bytes are then copied both ways until either side closes.

use std::fmt::Write as _;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use ssh2::{Channel, HashType, Session};
use tokio::net::TcpListener;
use tracing::{debug, error, info, trace, warn};

use crate::endpoint::{Endpoint, LOCAL_HOST, parse_forward, parse_ssh_host};
use crate::error::{Result, TunnelError};

/// Timeout for handshake, authentication and channel setup.
pub const SESSION_TIMEOUT: Duration = Duration::from_secs(30);

/// Sleep between pump iterations that moved no data.
const IDLE_POLL: Duration = Duration::from_millis(5);

const BUFFER_SIZE: usize = 16 * 1024;

/// Supplies the SSH password when agent authentication fails.
///
/// Called from a blocking thread; implementations may prompt on a terminal.
pub trait PasswordSource: Send + Sync {
    /// Returns the password for `user` on `server`.
    fn password(&self, user: &str, server: &Endpoint) -> Result<String>;
}

impl<F> PasswordSource for F
where
    F: Fn(&str, &Endpoint) -> Result<String> + Send + Sync,
{
    fn password(&self, user: &str, server: &Endpoint) -> Result<String> {
        self(user, server)
    }
}

/// A password source that never has a password.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPassword;

impl PasswordSource for NoPassword {
    fn password(&self, _user: &str, _server: &Endpoint) -> Result<String> {
        Err(TunnelError::password("no password source configured"))
    }
}

/// A local port forwarded over SSH to a remote endpoint.
pub struct SshTunnel {
    user: String,
    local: Endpoint,
    server: Endpoint,
    remote: Endpoint,
    passwords: Box<dyn PasswordSource>,
    cached_password: Mutex<Option<String>>,
}

impl std::fmt::Debug for SshTunnel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshTunnel")
            .field("user", &self.user)
            .field("local", &self.local)
            .field("server", &self.server)
            .field("remote", &self.remote)
            .finish_non_exhaustive()
    }
}

impl SshTunnel {
    /// Creates a tunnel from its parts.
    #[must_use]
    pub fn new(
        user: impl Into<String>,
        local: Endpoint,
        server: Endpoint,
        remote: Endpoint,
        passwords: impl PasswordSource + 'static,
    ) -> Self {
        Self {
            user: user.into(),
            local,
            server,
            remote,
            passwords: Box::new(passwords),
            cached_password: Mutex::new(None),
        }
    }

    /// Creates a tunnel from an SSH host spec and a forward spec.
    ///
    /// # Errors
    ///
    /// Returns an error if the SSH host spec cannot be parsed or no user is
    /// known.
    pub fn from_host_strings(
        ssh_host: &str,
        forward: &str,
        passwords: impl PasswordSource + 'static,
    ) -> Result<Self> {
        let host = parse_ssh_host(ssh_host)?;
        let forward = parse_forward(forward);
        Ok(Self::new(
            host.user,
            Endpoint::new(LOCAL_HOST, forward.local_port),
            host.server,
            forward.remote,
            passwords,
        ))
    }

    /// SSH user.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Local listening endpoint.
    #[must_use]
    pub const fn local(&self) -> &Endpoint {
        &self.local
    }

    /// SSH server endpoint.
    #[must_use]
    pub const fn server(&self) -> &Endpoint {
        &self.server
    }

    /// Forward target, as reached from the SSH server.
    #[must_use]
    pub const fn remote(&self) -> &Endpoint {
        &self.remote
    }

    /// URL clients should use to reach the remote endpoint through the tunnel.
    #[must_use]
    pub fn local_url(&self) -> String {
        format!("http://{}", self.local)
    }

    /// Opens the local listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the local address cannot be bound.
    pub async fn bind(&self) -> Result<TcpListener> {
        let address = self.local.to_string();
        TcpListener::bind(&address)
            .await
            .map_err(|source| TunnelError::Bind { address, source })
    }

    /// Accepts connections forever, forwarding each on a blocking thread.
    ///
    /// Forwarding failures are logged per connection. Returns only when
    /// accepting fails.
    ///
    /// # Errors
    ///
    /// Returns the accept error.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        info!(
            local = %self.local,
            user = %self.user,
            server = %self.server,
            remote = %self.remote,
            "ssh tunnel listening"
        );
        loop {
            let (stream, peer) = listener.accept().await.map_err(|e| {
                error!(error = %e, "ssh tunnel failed to accept connection");
                TunnelError::Io(e)
            })?;
            info!(peer = %peer, "ssh tunnel accepted connection");

            let stream = match stream.into_std() {
                Ok(stream) => stream,
                Err(e) => {
                    error!(peer = %peer, error = %e, "ssh tunnel could not take over connection");
                    continue;
                }
            };

            let tunnel = Arc::clone(&self);
            tokio::task::spawn_blocking(move || match tunnel.forward(stream) {
                Ok((sent, received)) => {
                    debug!(peer = %peer, sent, received, "ssh tunnel connection closed");
                }
                Err(e) => error!(peer = %peer, error = %e, "ssh tunnel could not forward connection"),
            });
        }
    }

    /// Forwards one accepted connection until either side closes.
    ///
    /// Blocks the calling thread. Returns bytes sent to and received from
    /// the remote endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the SSH session cannot be established or copying
    /// fails.
    pub fn forward(&self, local: TcpStream) -> Result<(u64, u64)> {
        let session = self.connect()?;

        let mut channel = session.channel_direct_tcpip(&self.remote.host, self.remote.port, None)?;
        debug!(remote = %self.remote, "opened direct-tcpip channel");

        session.set_blocking(false);
        let result = pump(&local, &mut channel);

        session.set_blocking(true);
        session.set_timeout(duration_millis(SESSION_TIMEOUT));
        if let Err(e) = channel.close() {
            trace!(error = %e, "closing channel");
        }
        if let Err(e) = local.shutdown(Shutdown::Both) {
            trace!(error = %e, "shutting down local stream");
        }
        result.map_err(TunnelError::from)
    }

    /// Dials the SSH server and authenticates.
    fn connect(&self) -> Result<Session> {
        let tcp = TcpStream::connect((self.server.host.as_str(), self.server.port))?;
        let mut session = Session::new()?;
        session.set_timeout(duration_millis(SESSION_TIMEOUT));
        session.set_tcp_stream(tcp);
        session.handshake()?;

        if let Some(hash) = session.host_key_hash(HashType::Sha256) {
            debug!(server = %self.server, fingerprint = %fingerprint(hash), "ssh host key");
        }

        self.authenticate(&session)?;
        Ok(session)
    }

    fn authenticate(&self, session: &Session) -> Result<()> {
        match session.userauth_agent(&self.user) {
            Ok(()) if session.authenticated() => {
                debug!(user = %self.user, "authenticated with ssh agent");
                return Ok(());
            }
            Ok(()) => {}
            Err(e) => debug!(user = %self.user, error = %e, "ssh agent authentication failed"),
        }

        // Held across the prompt so concurrent connections ask only once.
        let mut cached = self.cached_password.lock();
        let password = match cached.take() {
            Some(password) => password,
            None => self.passwords.password(&self.user, &self.server)?,
        };

        match session.userauth_password(&self.user, &password) {
            Ok(()) if session.authenticated() => {
                debug!(user = %self.user, "authenticated with password");
                *cached = Some(password);
                Ok(())
            }
            Ok(()) => Err(self.auth_failed()),
            Err(e) => {
                warn!(user = %self.user, server = %self.server, error = %e, "ssh password rejected");
                Err(self.auth_failed())
            }
        }
    }

    fn auth_failed(&self) -> TunnelError {
        TunnelError::AuthFailed {
            user: self.user.clone(),
            server: self.server.to_string(),
        }
    }
}

fn duration_millis(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}

fn fingerprint(hash: &[u8]) -> String {
    let mut out = String::with_capacity(hash.len() * 3);
    for (i, byte) in hash.iter().enumerate() {
        if i > 0 {
            out.push(':');
        }
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn is_would_block(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted)
}

/// Writes all of `data` to a non-blocking writer, retrying while it would block.
fn write_all_nonblocking<W: Write>(writer: &mut W, mut data: &[u8]) -> io::Result<()> {
    while !data.is_empty() {
        match writer.write(data) {
            Ok(0) => std::thread::sleep(IDLE_POLL),
            Ok(n) => data = &data[n..],
            Err(e) if is_would_block(&e) => std::thread::sleep(IDLE_POLL),
            Err(e) => return Err(e),
        }
    }
    loop {
        match writer.flush() {
            Ok(()) => return Ok(()),
            Err(e) if is_would_block(&e) => std::thread::sleep(IDLE_POLL),
            Err(e) => return Err(e),
        }
    }
}

/// Copies bytes both ways between a local socket and a non-blocking channel.
///
/// Both directions share one thread: libssh2 serializes all I/O on a
/// session. Returns when the remote side signals EOF, or when the local side
/// has closed and the remote side has drained.
fn pump(local: &TcpStream, channel: &mut Channel) -> io::Result<(u64, u64)> {
    local.set_nonblocking(true)?;
    let mut local_reader = local;
    let mut local_writer = local;

    let mut upstream = vec![0u8; BUFFER_SIZE];
    let mut downstream = vec![0u8; BUFFER_SIZE];
    let mut sent = 0u64;
    let mut received = 0u64;
    let mut local_open = true;

    loop {
        let mut progressed = false;

        if local_open {
            match local_reader.read(&mut upstream) {
                Ok(0) => {
                    local_open = false;
                    progressed = true;
                    loop {
                        match channel.send_eof() {
                            Ok(()) => break,
                            Err(e) => {
                                let e = io::Error::from(e);
                                if !is_would_block(&e) {
                                    return Err(e);
                                }
                                std::thread::sleep(IDLE_POLL);
                            }
                        }
                    }
                    trace!(sent, "local side closed");
                }
                Ok(n) => {
                    write_all_nonblocking(channel, &upstream[..n])?;
                    sent += n as u64;
                    progressed = true;
                }
                Err(e) if is_would_block(&e) => {}
                Err(e) => return Err(e),
            }
        }

        match channel.read(&mut downstream) {
            Ok(0) => {
                if channel.eof() {
                    trace!(received, "remote side closed");
                    return Ok((sent, received));
                }
            }
            Ok(n) => {
                write_all_nonblocking(&mut local_writer, &downstream[..n])?;
                received += n as u64;
                progressed = true;
            }
            Err(e) if is_would_block(&e) => {
                if channel.eof() {
                    return Ok((sent, received));
                }
            }
            Err(e) => return Err(e),
        }

        if !progressed {
            std::thread::sleep(IDLE_POLL);
        }
    }
}
