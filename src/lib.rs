#![deny(clippy::unwrap_used)]

//! Resolve the service socket of a remote Podman host over SSH.
//!
//! ```no_run
//! use podman_uds::{ConnectionDescriptor, EnvContext, resolve_socket_path_blocking};
//!
//! let env = EnvContext::from_env();
//! let descriptor = ConnectionDescriptor::parse("ssh://core@example.com:22", "~/.ssh/id_ed25519", &env)?;
//! let path = resolve_socket_path_blocking(&descriptor, &env)?;
//! println!("{}", descriptor.service_uri(&path));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod remote;

pub use remote::{
    ConnectionDescriptor, DescriptorError, EnvContext, ErrorKind, HostKeyPolicy, ResolveError,
    ResolveResult, Resolver, resolve_socket_path, resolve_socket_path_blocking,
};
