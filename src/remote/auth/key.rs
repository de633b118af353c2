//! Identity file loading and public key authentication.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use russh::{client, keys};
use tracing::debug;

use crate::remote::error::{AuthAttemptError, ResolveError, ResolveResult};
use crate::remote::session::SshClientHandler;

use super::signer::Signer;
use super::traits::AuthStrategy;

/// Load the identity file, if one was requested.
///
/// An empty path means no identity and yields `Ok(None)`. Otherwise the key
/// is decrypted with `passphrase`; the passphrase is ignored for keys that
/// are not encrypted.
pub fn load_identity(path: &Path, passphrase: &str) -> ResolveResult<Option<Signer>> {
    if path.as_os_str().is_empty() {
        return Ok(None);
    }

    let key_pair =
        keys::load_secret_key(path, Some(passphrase)).map_err(|e| ResolveError::IdentityLoad {
            path: path.to_path_buf(),
            source: e,
        })?;

    let signer = Signer::Identity {
        key: Arc::new(key_pair),
        path: path.to_path_buf(),
    };
    debug!(
        "SSH Ident Key {:?} {} {}",
        path,
        signer.fingerprint(),
        signer.key_type()
    );

    Ok(Some(signer))
}

/// Public key authentication strategy.
///
/// Holds a fixed signer list; every attempt offers exactly these signers, in
/// order, until the server accepts one.
#[derive(Debug, Clone)]
pub struct PublicKeyAuth {
    signers: Arc<[Signer]>,
}

impl PublicKeyAuth {
    pub fn new(signers: Vec<Signer>) -> Self {
        Self {
            signers: signers.into(),
        }
    }

    pub fn signers(&self) -> &[Signer] {
        &self.signers
    }
}

#[async_trait]
impl AuthStrategy for PublicKeyAuth {
    /// Offer every signer in order. Rejections move on to the next signer;
    /// so do errors, but the last one is returned when no signer succeeds.
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<bool, AuthAttemptError> {
        // For RSA keys, use the best supported hash algorithm
        let hash_alg = handle
            .best_supported_rsa_hash()
            .await
            .ok()
            .flatten()
            .flatten();
        debug!("Using RSA hash algorithm for key auth: {:?}", hash_alg);

        let mut last_error = None;
        for signer in self.signers.iter() {
            let fingerprint = signer.fingerprint();
            debug!("Offering {} key {}", signer.source(), fingerprint);
            let attempt = match signer {
                Signer::Identity { key, .. } => {
                    let key_with_hash = keys::PrivateKeyWithHashAlg::new(key.clone(), hash_alg);
                    handle
                        .authenticate_publickey(username, key_with_hash)
                        .await
                        .map(|result| result.success())
                        .map_err(|source| AuthAttemptError::Identity {
                            fingerprint: fingerprint.clone(),
                            source,
                        })
                }
                Signer::Agent { key, agent } => {
                    let mut agent = agent.lock().await;
                    handle
                        .authenticate_publickey_with(username, key.clone(), hash_alg, &mut *agent)
                        .await
                        .map(|result| result.success())
                        .map_err(|source| AuthAttemptError::Agent {
                            fingerprint: fingerprint.clone(),
                            source,
                        })
                }
            };

            match attempt {
                Ok(true) => {
                    debug!("Server accepted key {}", fingerprint);
                    return Ok(true);
                }
                Ok(false) => debug!("Server rejected key {}", fingerprint),
                Err(e) => {
                    debug!("Key authentication error: {}, trying next...", e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(false),
        }
    }

    fn name(&self) -> &'static str {
        "publickey"
    }
}
