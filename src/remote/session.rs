//! SSH client handler and host-key policy.
//!
//! By default every host key is accepted, similar to
//! `StrictHostKeyChecking=no` in OpenSSH. The decision is a [`HostKeyPolicy`]
//! value carried by the client configuration, so callers can pin known
//! fingerprints instead.

use russh::client;
use russh::keys::{HashAlg, PublicKey};
use tracing::{debug, warn};

/// How the server's host key is verified during the handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HostKeyPolicy {
    /// Accept any host key.
    #[default]
    AcceptAny,
    /// Accept only keys whose `SHA256:` fingerprint is listed.
    Fingerprints(Vec<String>),
}

impl HostKeyPolicy {
    pub fn accepts(&self, server_public_key: &PublicKey) -> bool {
        let fingerprint = server_public_key.fingerprint(HashAlg::Sha256).to_string();
        match self {
            HostKeyPolicy::AcceptAny => {
                warn!(
                    "Accepting unverified host key {} {}",
                    server_public_key.algorithm().as_str(),
                    fingerprint
                );
                true
            }
            HostKeyPolicy::Fingerprints(allowed) => {
                let accepted = allowed.iter().any(|f| *f == fingerprint);
                debug!("Host key {} pinned: {}", fingerprint, accepted);
                accepted
            }
        }
    }
}

/// Client handler for russh that applies a [`HostKeyPolicy`].
pub struct SshClientHandler {
    policy: HostKeyPolicy,
}

impl SshClientHandler {
    pub fn new(policy: HostKeyPolicy) -> Self {
        Self { policy }
    }
}

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(self.policy.accepts(server_public_key))
    }
}
