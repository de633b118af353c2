//! End-to-end resolution of the remote service socket.
//!
//! Stages run strictly in order and the first failure ends the resolution:
//!
//! 1. load the identity file, if one was given
//! 2. list the agent keys, if an agent socket is advertised
//! 3. merge both by fingerprint
//! 4. negotiate the authentication methods
//! 5. bounded handshake
//! 6. run `<binary> info --format=json`
//! 7. read `host.remoteSocket.path`
//!
//! Nothing is cached between calls. Two resolutions of the same descriptor
//! perform two independent handshakes.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info};

use crate::remote::auth::{AuthChain, agent_signers, dedup_signers, load_identity};
use crate::remote::client::{ClientConfig, Connection};
use crate::remote::config::{EnvContext, resolve_handshake_timeout};
use crate::remote::discovery::parse_socket_path;
use crate::remote::error::{ResolveError, ResolveResult};
use crate::remote::session::HostKeyPolicy;
use crate::remote::types::ConnectionDescriptor;

/// Resolve the service socket path of the remote described by `descriptor`.
pub async fn resolve_socket_path(
    descriptor: &ConnectionDescriptor,
    env: &EnvContext,
) -> ResolveResult<String> {
    Resolver::new(env.clone()).resolve(descriptor).await
}

/// Blocking form of [`resolve_socket_path`].
///
/// Drives the resolution on a private current-thread runtime. Must not be
/// called from inside an async context.
pub fn resolve_socket_path_blocking(
    descriptor: &ConnectionDescriptor,
    env: &EnvContext,
) -> ResolveResult<String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(ResolveError::Runtime)?;
    runtime.block_on(resolve_socket_path(descriptor, env))
}

/// Resolution settings beyond the descriptor.
#[derive(Debug, Clone)]
pub struct Resolver {
    env: EnvContext,
    host_key_policy: HostKeyPolicy,
    timeout: Duration,
}

impl Resolver {
    pub fn new(env: EnvContext) -> Self {
        Self {
            env,
            host_key_policy: HostKeyPolicy::default(),
            timeout: resolve_handshake_timeout(None),
        }
    }

    pub fn with_host_key_policy(mut self, policy: HostKeyPolicy) -> Self {
        self.host_key_policy = policy;
        self
    }

    pub(crate) fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Stages 1 to 4: collect signers and build the client configuration.
    pub async fn negotiate(&self, descriptor: &ConnectionDescriptor) -> ResolveResult<ClientConfig> {
        let identity = load_identity(descriptor.identity_path(), self.env.passphrase())?;
        let agent = agent_signers(self.env.agent_socket().map(PathBuf::as_path)).await?;

        let signers = dedup_signers(identity.into_iter().chain(agent));
        debug!(
            "{}: {} distinct signer(s) after dedup",
            descriptor.host,
            signers.len()
        );

        let auth = AuthChain::negotiate(signers, descriptor.password.as_deref());
        debug!(
            "{}: negotiated auth methods {:?}",
            descriptor.host,
            auth.names()
        );

        Ok(ClientConfig::new(descriptor.username.clone(), auth)
            .with_host_key_policy(self.host_key_policy.clone())
            .with_timeout(self.timeout))
    }

    pub async fn resolve(&self, descriptor: &ConnectionDescriptor) -> ResolveResult<String> {
        let config = self.negotiate(descriptor).await?;
        let connection = Connection::establish(&descriptor.host, &config).await?;

        let command = self.env.info_command();
        debug!("{}: running {:?}", descriptor.host, command);
        let output = connection.execute(&command).await;
        connection.close().await;

        let path = parse_socket_path(&descriptor.host, &output?)?;
        info!("{}: remote socket is {}", descriptor.host, path);
        Ok(path)
    }
}
