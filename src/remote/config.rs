//! Configuration resolution for remote socket discovery.
//!
//! Every value the resolution reads from the process environment is captured
//! once into an [`EnvContext`]. Values follow a three-tier priority:
//!
//! 1. **Parameter** - Explicitly provided value (highest priority)
//! 2. **Environment Variable** - Value captured in the [`EnvContext`]
//! 3. **Default** - Built-in default value (lowest priority)
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `PODMAN_BINARY` | `podman` | Remote binary used for `info` |
//! | `CONTAINER_PASSPHRASE` | `_empty_pass_` | Passphrase for the identity file |
//! | `SSH_AUTH_SOCK` | unset | ssh-agent socket, enables agent keys |
//! | `_CONTAINERS_ROOTLESS_UID` | unset | Uid whose name is the default SSH user |

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

/// Upper bound for TCP connect, SSH handshake and authentication.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(40);

/// Default remote binary
pub const DEFAULT_PODMAN_BINARY: &str = "podman";

/// Arguments appended to the remote binary
pub const INFO_ARGS: &str = "info --format=json";

/// Passphrase used when none is configured
pub const EMPTY_PASSPHRASE: &str = "_empty_pass_";

/// Environment variable name for the remote binary override
pub const PODMAN_BINARY_ENV_VAR: &str = "PODMAN_BINARY";

/// Environment variable name for the identity passphrase
pub const PASSPHRASE_ENV_VAR: &str = "CONTAINER_PASSPHRASE";

/// Environment variable name for the ssh-agent socket
pub const AGENT_SOCK_ENV_VAR: &str = "SSH_AUTH_SOCK";

/// Environment variable name for the rootless uid override
pub const ROOTLESS_UID_ENV_VAR: &str = "_CONTAINERS_ROOTLESS_UID";

/// Snapshot of the environment signals the resolution depends on.
///
/// Built once at the start of a resolution so that no stage reads the
/// process environment on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvContext {
    pub podman_binary: Option<String>,
    pub passphrase: Option<String>,
    pub agent_socket: Option<PathBuf>,
    pub rootless_uid: Option<String>,
}

impl EnvContext {
    /// Capture the recognized variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var_os(key))
    }

    /// Capture the recognized variables through an arbitrary lookup.
    ///
    /// A variable that is set always counts as set. The agent socket keeps
    /// its raw bytes; text values that are not UTF-8 are converted lossily.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let text = |key: &str| lookup(key).map(|value| os_to_text(key, value));
        Self {
            podman_binary: text(PODMAN_BINARY_ENV_VAR),
            passphrase: text(PASSPHRASE_ENV_VAR),
            agent_socket: lookup(AGENT_SOCK_ENV_VAR).map(PathBuf::from),
            rootless_uid: text(ROOTLESS_UID_ENV_VAR),
        }
    }

    /// Remote binary name: override -> default.
    pub fn podman_binary(&self) -> &str {
        self.podman_binary
            .as_deref()
            .unwrap_or(DEFAULT_PODMAN_BINARY)
    }

    /// Identity passphrase. Unset and empty both fall back to the sentinel.
    pub fn passphrase(&self) -> &str {
        match self.passphrase.as_deref() {
            Some(passphrase) if !passphrase.is_empty() => passphrase,
            _ => EMPTY_PASSPHRASE,
        }
    }

    pub fn agent_socket(&self) -> Option<&PathBuf> {
        self.agent_socket.as_ref()
    }

    /// Command line executed on the remote host.
    pub fn info_command(&self) -> String {
        format!("{} {}", self.podman_binary(), INFO_ARGS)
    }
}

fn os_to_text(key: &str, value: OsString) -> String {
    value.into_string().unwrap_or_else(|raw| {
        warn!("{} is not valid UTF-8, using a lossy conversion", key);
        raw.to_string_lossy().into_owned()
    })
}

/// Resolve the handshake timeout with priority: parameter -> default
pub(crate) fn resolve_handshake_timeout(timeout_param: Option<Duration>) -> Duration {
    timeout_param.unwrap_or(HANDSHAKE_TIMEOUT)
}
