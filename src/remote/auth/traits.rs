//! Authentication strategy trait definition.
//!
//! Defines the interface for authentication strategies, enabling
//! the Strategy pattern for SSH authentication methods.

use async_trait::async_trait;
use russh::client;

use crate::remote::error::AuthAttemptError;
use crate::remote::session::SshClientHandler;

/// Trait for SSH authentication strategies.
///
/// Implementations must be thread-safe (`Send + Sync`) for use across
/// async tasks. Each strategy represents a different authentication
/// method (public key, password).
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Attempt to authenticate with the SSH server.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - Authentication succeeded
    /// * `Ok(false)` - Authentication failed (credentials rejected)
    /// * `Err(error)` - The attempt errored before the server answered
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<bool, AuthAttemptError>;

    /// SSH method name, used for logging and error reporting.
    fn name(&self) -> &'static str;
}
