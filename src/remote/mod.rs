//! Remote Podman service discovery over SSH.
//!
//! This module is organized into the following submodules:
//!
//! - `types`: connection descriptor, command output and `podman info` payload
//! - `config`: environment context and constants
//! - `error`: typed resolution failures and retry classification
//! - `session`: client handler and host-key policy
//! - `auth`: signer loading, agent bridge, dedup and auth methods
//! - `client`: bounded handshake and remote command execution
//! - `discovery`: socket path extraction
//! - `resolve`: the end-to-end resolution and its blocking form

pub mod auth;
pub mod client;
pub mod config;
pub mod discovery;
pub mod error;
pub mod resolve;
pub mod session;
pub mod types;
mod user;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{ClientConfig, Connection};
pub use config::EnvContext;
pub use discovery::parse_socket_path;
pub use error::{AuthAttemptError, ErrorKind, ResolveError, ResolveResult};
pub use resolve::{Resolver, resolve_socket_path, resolve_socket_path_blocking};
pub use session::HostKeyPolicy;
pub use types::{ConnectionDescriptor, DescriptorError};
