//! SSH transport: bounded handshake and single-command execution.
//!
//! ## Connection Lifecycle
//!
//! 1. **Address Parsing**: `host:port`, with brackets stripped from IPv6
//!    literals and port 22 when none is given.
//!
//! 2. **Handshake**: TCP connect, key exchange, host key check and
//!    authentication all run under one deadline ([`HANDSHAKE_TIMEOUT`] by
//!    default). Expiry is reported as a transport timeout.
//!
//! 3. **Command Execution**: one session channel per command. Output is
//!    collected until the channel closes; there is no deadline on this stage.
//!
//! 4. **Teardown**: the connection is closed with a `ByApplication`
//!    disconnect whatever the outcome of the command.
//!
//! [`HANDSHAKE_TIMEOUT`]: crate::remote::config::HANDSHAKE_TIMEOUT

use std::sync::Arc;
use std::time::Duration;

use russh::{ChannelMsg, Disconnect, client};
use tracing::{debug, info, warn};

use crate::remote::auth::AuthChain;
use crate::remote::config::resolve_handshake_timeout;
use crate::remote::error::{ExecFailure, ResolveError, ResolveResult, TransportFailure};
use crate::remote::session::{HostKeyPolicy, SshClientHandler};
use crate::remote::types::{DEFAULT_SSH_PORT, RemoteExecutionResult};

/// Everything the handshake needs besides the address.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub username: String,
    pub auth: AuthChain,
    pub host_key_policy: HostKeyPolicy,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(username: impl Into<String>, auth: AuthChain) -> Self {
        Self {
            username: username.into(),
            auth,
            host_key_policy: HostKeyPolicy::default(),
            timeout: resolve_handshake_timeout(None),
        }
    }

    pub fn with_host_key_policy(mut self, policy: HostKeyPolicy) -> Self {
        self.host_key_policy = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Build russh client configuration.
///
/// The inactivity timeout is disabled: the handshake has its own deadline
/// and the remote command runs unbounded. Keepalives still detect a dead
/// peer (30 seconds, at most 3 unanswered).
pub(crate) fn build_client_config() -> Arc<client::Config> {
    Arc::new(client::Config {
        inactivity_timeout: None,
        keepalive_interval: Some(Duration::from_secs(30)),
        keepalive_max: 3,
        ..Default::default()
    })
}

/// Parse address string into host and port components.
///
/// Supports `host:port`, `host` (port 22) and `[v6]:port`. Brackets around
/// an IPv6 literal are removed so the host can be handed to the resolver.
pub(crate) fn parse_address(address: &str) -> Result<(String, u16), TransportFailure> {
    if let Some(rest) = address.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| TransportFailure::InvalidAddress(address.to_string()))?;
        let port = match tail.strip_prefix(':') {
            Some(port_str) => parse_port(address, port_str)?,
            None if tail.is_empty() => DEFAULT_SSH_PORT,
            None => return Err(TransportFailure::InvalidAddress(address.to_string())),
        };
        return Ok((host.to_string(), port));
    }

    match address.rsplit_once(':') {
        Some((host, port_str)) => Ok((host.to_string(), parse_port(address, port_str)?)),
        None => Ok((address.to_string(), DEFAULT_SSH_PORT)),
    }
}

fn parse_port(address: &str, port_str: &str) -> Result<u16, TransportFailure> {
    port_str.parse::<u16>().map_err(|e| {
        TransportFailure::InvalidAddress(format!("{}: invalid port number: {}", address, e))
    })
}

/// An authenticated SSH connection to one host.
pub struct Connection {
    host: String,
    handle: client::Handle<SshClientHandler>,
}

impl Connection {
    /// Connect to `host` and authenticate.
    ///
    /// Connect, key exchange and authentication share `config.timeout`.
    /// Every failure is a [`ResolveError::Transport`] naming `host`.
    pub async fn establish(host: &str, config: &ClientConfig) -> ResolveResult<Self> {
        let (address, port) =
            parse_address(host).map_err(|e| ResolveError::transport(host, e))?;
        let handler = SshClientHandler::new(config.host_key_policy.clone());

        let handshake = async {
            let mut handle =
                client::connect(build_client_config(), (address.as_str(), port), handler).await?;
            config.auth.authenticate(&mut handle, &config.username).await?;
            Ok::<_, TransportFailure>(handle)
        };

        let handle = match tokio::time::timeout(config.timeout, handshake).await {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) => {
                warn!("SSH handshake with {}@{} failed: {}", config.username, host, e);
                return Err(ResolveError::transport(host, e));
            }
            Err(_) => {
                warn!(
                    "SSH handshake with {}@{} timed out after {:?}",
                    config.username, host, config.timeout
                );
                return Err(ResolveError::transport(
                    host,
                    TransportFailure::Timeout(config.timeout),
                ));
            }
        };

        info!("SSH connection established to {}@{}", config.username, host);
        Ok(Self {
            host: host.to_string(),
            handle,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Run `command` and capture its output and exit information.
    pub async fn run(&self, command: &str) -> Result<RemoteExecutionResult, ExecFailure> {
        execute_remote_command(&self.handle, command).await
    }

    /// Run `command` and return its stdout, failing unless it exits with 0.
    pub async fn execute(&self, command: &str) -> ResolveResult<Vec<u8>> {
        let result = self
            .run(command)
            .await
            .map_err(|source| ResolveError::RemoteExecution {
                host: self.host.clone(),
                stderr: String::new(),
                source,
            })?;

        if result.success() {
            return Ok(result.stdout);
        }

        let source = match (&result.exit_signal, result.exit_status) {
            (Some(signal), _) => ExecFailure::ExitSignal(signal.clone()),
            (None, Some(status)) => ExecFailure::ExitStatus(status),
            (None, None) => ExecFailure::MissingExitStatus,
        };
        Err(ResolveError::RemoteExecution {
            host: self.host.clone(),
            stderr: result.stderr_text(),
            source,
        })
    }

    /// Disconnect. Errors are logged, never returned.
    pub async fn close(self) {
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
        {
            debug!("Disconnect from {} failed: {}", self.host, e);
        }
    }
}

/// Execute a command on an SSH session.
///
/// Opens a session channel, executes the command, and collects stdout,
/// stderr and the exit status or signal. The channel is always closed.
pub(crate) async fn execute_remote_command(
    handle: &client::Handle<SshClientHandler>,
    command: &str,
) -> Result<RemoteExecutionResult, ExecFailure> {
    let mut channel = handle
        .channel_open_session()
        .await
        .map_err(ExecFailure::Session)?;

    if let Err(e) = channel.exec(true, command).await {
        if let Err(close_err) = channel.close().await {
            debug!("Closing channel after failed exec: {}", close_err);
        }
        return Err(ExecFailure::Start(e));
    }

    let mut result = RemoteExecutionResult {
        stdout: Vec::with_capacity(4096),
        stderr: Vec::with_capacity(1024),
        ..Default::default()
    };

    loop {
        match channel.wait().await {
            Some(ChannelMsg::Data { data }) => {
                result.stdout.extend_from_slice(&data);
            }
            Some(ChannelMsg::ExtendedData { data, ext }) => {
                // ext == 1 is stderr in SSH protocol
                if ext == 1 {
                    result.stderr.extend_from_slice(&data);
                }
            }
            Some(ChannelMsg::ExitStatus { exit_status }) => {
                result.exit_status = Some(exit_status);
            }
            Some(ChannelMsg::ExitSignal { signal_name, .. }) => {
                result.exit_signal = Some(format!("{:?}", signal_name));
            }
            Some(ChannelMsg::Eof) => {
                if result.exit_status.is_some() || result.exit_signal.is_some() {
                    break;
                }
            }
            Some(ChannelMsg::Close) | None => break,
            Some(_) => {}
        }
    }

    // The server usually closed the channel already
    if let Err(e) = channel.close().await {
        debug!("Closing channel failed: {}", e);
    }

    debug!(
        "Remote command finished: status={:?} signal={:?} stdout={}B stderr={}B",
        result.exit_status,
        result.exit_signal,
        result.stdout.len(),
        result.stderr.len()
    );
    Ok(result)
}
