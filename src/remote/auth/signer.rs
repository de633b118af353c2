//! Signers and fingerprint deduplication.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use russh::keys::agent::client::AgentClient;
use russh::keys::{HashAlg, PrivateKey, PublicKey};
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use tracing::debug;

/// Agent connection shared by every signer it produced.
pub type SharedAgent = Arc<Mutex<AgentClient<UnixStream>>>;

/// A key able to prove possession of a private key during authentication.
#[derive(Clone)]
pub enum Signer {
    /// Private key loaded from an identity file.
    Identity { key: Arc<PrivateKey>, path: PathBuf },
    /// Key held by an ssh-agent; signing is delegated to the agent.
    Agent { key: PublicKey, agent: SharedAgent },
}

impl Signer {
    pub fn public_key(&self) -> &PublicKey {
        match self {
            Signer::Identity { key, .. } => key.public_key(),
            Signer::Agent { key, .. } => key,
        }
    }

    /// OpenSSH style `SHA256:` fingerprint of the public key.
    pub fn fingerprint(&self) -> String {
        fingerprint(self.public_key())
    }

    pub fn key_type(&self) -> String {
        self.public_key().algorithm().as_str().to_owned()
    }

    pub fn source(&self) -> &'static str {
        match self {
            Signer::Identity { .. } => "identity",
            Signer::Agent { .. } => "agent",
        }
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("source", &self.source())
            .field("type", &self.key_type())
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

pub(crate) fn fingerprint(key: &PublicKey) -> String {
    key.fingerprint(HashAlg::Sha256).to_string()
}

/// Merge signers, keeping one per fingerprint.
///
/// On collision the later signer replaces the earlier one; both prove the
/// same key. The returned order is unspecified.
pub fn dedup_signers<I>(signers: I) -> Vec<Signer>
where
    I: IntoIterator<Item = Signer>,
{
    let mut dedup: HashMap<String, Signer> = HashMap::new();
    for signer in signers {
        let fp = signer.fingerprint();
        if dedup.contains_key(&fp) {
            debug!("Dedup SSH Key {} {}", fp, signer.key_type());
        }
        dedup.insert(fp, signer);
    }
    dedup.into_values().collect()
}
