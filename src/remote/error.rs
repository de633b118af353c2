//! Typed failures of a socket resolution.
//!
//! Every stage wraps the lower-level cause instead of discarding it, so the
//! rendered message names the host or path involved while [`std::error::Error::source`]
//! still leads to the root cause.
//!
//! # Retry Classification
//!
//! Nothing inside the resolution retries. [`ResolveError::is_retryable`] tells
//! a caller whether starting a fresh resolution can help:
//!
//! 1. **Credential failures (NOT retryable)**: identity, agent and rejected
//!    authentication.
//! 2. **Connection failures (retryable)**: timeouts, refused or reset
//!    connections and similar transient network conditions.
//! 3. **Remote results (NOT retryable)**: the remote command ran and answered;
//!    asking again returns the same answer.

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result alias used throughout the resolution.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Authentication error patterns that indicate permanent failures.
const AUTH_ERRORS: &[&str] = &[
    "authentication failed",
    "permission denied",
    "publickey",
    "auth fail",
    "no authentication",
    "unable to authenticate",
];

/// Connection error patterns that indicate transient failures.
const RETRYABLE_ERRORS: &[&str] = &[
    "connection refused",
    "connection reset",
    "connection timed out",
    "timeout",
    "network is unreachable",
    "no route to host",
    "host is down",
    "temporary failure",
    "resource temporarily unavailable",
    "broken pipe",
    "disconnect",
];

/// Stage at which a resolution failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    IdentityLoad,
    AgentUnreachable,
    Transport,
    RemoteExecution,
    PayloadDecode,
    SocketNotReported,
    Runtime,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::IdentityLoad => "identity",
            ErrorKind::AgentUnreachable => "agent",
            ErrorKind::Transport => "transport",
            ErrorKind::RemoteExecution => "remote-execution",
            ErrorKind::PayloadDecode => "payload",
            ErrorKind::SocketNotReported => "socket-not-reported",
            ErrorKind::Runtime => "runtime",
        };
        f.write_str(name)
    }
}

/// Why the ssh-agent could not be used.
#[derive(Debug, Error)]
pub enum AgentFailure {
    #[error("failed to connect: {0}")]
    Connect(#[source] io::Error),

    #[error("failed to list identities: {0}")]
    Identities(#[source] russh::keys::Error),
}

/// Why the SSH transport could not be established.
#[derive(Debug, Error)]
pub enum TransportFailure {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("connection timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Protocol(#[from] russh::Error),

    #[error(
        "unable to authenticate, attempted methods [{}]{}",
        .attempted.join(" "),
        last_error_suffix(.last_error)
    )]
    AuthRejected {
        attempted: Vec<&'static str>,
        #[source]
        last_error: Option<AuthAttemptError>,
    },
}

fn last_error_suffix(last_error: &Option<AuthAttemptError>) -> String {
    last_error
        .as_ref()
        .map(|e| format!(", last error: {}", e))
        .unwrap_or_default()
}

/// An authentication attempt that errored instead of being answered.
#[derive(Debug, Error)]
pub enum AuthAttemptError {
    #[error("{0}")]
    Protocol(#[from] russh::Error),

    #[error("identity key {fingerprint}: {source}")]
    Identity {
        fingerprint: String,
        #[source]
        source: russh::Error,
    },

    #[error("agent key {fingerprint}: {source}")]
    Agent {
        fingerprint: String,
        #[source]
        source: russh::AgentAuthError,
    },
}

/// Why the remote command is considered failed.
#[derive(Debug, Error)]
pub enum ExecFailure {
    #[error("failed to open session: {0}")]
    Session(#[source] russh::Error),

    #[error("failed to start command: {0}")]
    Start(#[source] russh::Error),

    #[error("process exited with status {0}")]
    ExitStatus(u32),

    #[error("process killed by signal {0}")]
    ExitSignal(String),

    #[error("remote command exited without exit status or exit signal")]
    MissingExitStatus,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(
        "failed to read identity {path:?}, set 'CONTAINER_PASSPHRASE' variable if password is required: {source}"
    )]
    IdentityLoad {
        path: PathBuf,
        #[source]
        source: russh::keys::Error,
    },

    #[error("ssh-agent at {socket:?} is unreachable: {source}")]
    AgentUnreachable {
        socket: PathBuf,
        #[source]
        source: AgentFailure,
    },

    #[error("failed to connect to {host:?}: {source}")]
    Transport {
        host: String,
        #[source]
        source: TransportFailure,
    },

    #[error("remote command on {host:?} failed: {source}: {stderr}")]
    RemoteExecution {
        host: String,
        stderr: String,
        #[source]
        source: ExecFailure,
    },

    #[error("failed to parse 'podman info' results from {host:?}: {source}")]
    PayloadDecode {
        host: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("remote podman {host:?} failed to report its UDS socket")]
    SocketNotReported { host: String },

    #[error("failed to start resolution runtime: {0}")]
    Runtime(#[source] io::Error),
}

impl ResolveError {
    pub(crate) fn transport(host: &str, source: impl Into<TransportFailure>) -> Self {
        ResolveError::Transport {
            host: host.to_string(),
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ResolveError::IdentityLoad { .. } => ErrorKind::IdentityLoad,
            ResolveError::AgentUnreachable { .. } => ErrorKind::AgentUnreachable,
            ResolveError::Transport { .. } => ErrorKind::Transport,
            ResolveError::RemoteExecution { .. } => ErrorKind::RemoteExecution,
            ResolveError::PayloadDecode { .. } => ErrorKind::PayloadDecode,
            ResolveError::SocketNotReported { .. } => ErrorKind::SocketNotReported,
            ResolveError::Runtime(_) => ErrorKind::Runtime,
        }
    }

    /// Host named by the error, if the failing stage had one.
    pub fn host(&self) -> Option<&str> {
        match self {
            ResolveError::Transport { host, .. }
            | ResolveError::RemoteExecution { host, .. }
            | ResolveError::PayloadDecode { host, .. }
            | ResolveError::SocketNotReported { host } => Some(host.as_str()),
            _ => None,
        }
    }

    /// Innermost error of the source chain.
    pub fn root_cause(&self) -> &(dyn StdError + 'static) {
        let mut current: &(dyn StdError + 'static) = self;
        while let Some(next) = current.source() {
            current = next;
        }
        current
    }

    /// Whether a fresh resolution with the same inputs may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ResolveError::Transport { source, .. } => match source {
                TransportFailure::Timeout(_) => true,
                TransportFailure::AuthRejected { .. } | TransportFailure::InvalidAddress(_) => {
                    false
                }
                TransportFailure::Protocol(e) => is_retryable_message(&e.to_string()),
            },
            ResolveError::Runtime(_) => true,
            _ => false,
        }
    }
}

/// Classify a protocol error message as transient or permanent.
///
/// Authentication keywords take precedence: a message mentioning both a
/// timeout and a failed authentication is not retryable.
pub(crate) fn is_retryable_message(error: &str) -> bool {
    let error_lower = error.to_lowercase();

    if AUTH_ERRORS.iter().any(|auth_err| error_lower.contains(auth_err)) {
        return false;
    }

    if RETRYABLE_ERRORS
        .iter()
        .any(|retryable_err| error_lower.contains(retryable_err))
    {
        return true;
    }

    // I/O level failures surface as "IO error: ..." and are worth another try
    error_lower.contains("io error") || error_lower.contains("connect")
}
