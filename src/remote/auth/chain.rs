//! Negotiated authentication methods.

use async_trait::async_trait;
use russh::client;
use tracing::debug;

use crate::remote::error::{AuthAttemptError, TransportFailure};
use crate::remote::session::SshClientHandler;

use super::key::PublicKeyAuth;
use super::password::PasswordAuth;
use super::signer::Signer;
use super::traits::AuthStrategy;

/// One authentication method offered to the server.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    PublicKey(PublicKeyAuth),
    Password(PasswordAuth),
}

#[async_trait]
impl AuthStrategy for AuthMethod {
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<bool, AuthAttemptError> {
        match self {
            AuthMethod::PublicKey(auth) => auth.authenticate(handle, username).await,
            AuthMethod::Password(auth) => auth.authenticate(handle, username).await,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            AuthMethod::PublicKey(auth) => auth.name(),
            AuthMethod::Password(auth) => auth.name(),
        }
    }
}

/// Ordered list of authentication methods.
///
/// Methods are tried in the order they were added. The first accepted
/// method ends the chain.
#[derive(Debug, Clone, Default)]
pub struct AuthChain {
    methods: Vec<AuthMethod>,
}

impl AuthChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the chain for a resolution: public key first when there are
    /// signers, then password when one was supplied.
    pub fn negotiate(signers: Vec<Signer>, password: Option<&str>) -> Self {
        let mut chain = Self::new();
        if !signers.is_empty() {
            chain = chain.with_public_keys(signers);
        }
        if let Some(password) = password {
            chain = chain.with_password(password);
        }
        chain
    }

    pub fn with_public_keys(mut self, signers: Vec<Signer>) -> Self {
        self.methods
            .push(AuthMethod::PublicKey(PublicKeyAuth::new(signers)));
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.methods
            .push(AuthMethod::Password(PasswordAuth::new(password)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn methods(&self) -> &[AuthMethod] {
        &self.methods
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.methods.iter().map(AuthMethod::name).collect()
    }

    /// Authenticate `username` on an established transport.
    ///
    /// An empty chain still attempts the `none` method so that the server's
    /// answer decides the outcome. A method whose attempt errors does not
    /// stop the chain; the last such error is kept on the final rejection.
    pub async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<(), TransportFailure> {
        if self.methods.is_empty() {
            debug!("No authentication methods negotiated, trying none");
            let result = handle.authenticate_none(username).await?;
            if result.success() {
                return Ok(());
            }
            return Err(TransportFailure::AuthRejected {
                attempted: vec!["none"],
                last_error: None,
            });
        }

        let mut attempted = Vec::with_capacity(self.methods.len());
        let mut last_error = None;
        for method in &self.methods {
            debug!("Trying authentication method: {}", method.name());
            attempted.push(method.name());

            match method.authenticate(handle, username).await {
                Ok(true) => {
                    debug!("Authentication succeeded with method: {}", method.name());
                    return Ok(());
                }
                Ok(false) => debug!("Authentication rejected for method: {}", method.name()),
                Err(e) => {
                    debug!("Authentication method {} failed: {}", method.name(), e);
                    last_error = Some(e);
                }
            }
        }

        Err(TransportFailure::AuthRejected {
            attempted,
            last_error,
        })
    }
}
