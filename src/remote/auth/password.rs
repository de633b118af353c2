//! Password-based SSH authentication.

use std::fmt;

use async_trait::async_trait;
use russh::client;

use crate::remote::error::AuthAttemptError;
use crate::remote::session::SshClientHandler;

use super::traits::AuthStrategy;

/// Password authentication strategy.
///
/// Uses the password embedded in the connection URI.
#[derive(Clone)]
pub struct PasswordAuth {
    password: String,
}

impl PasswordAuth {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }
}

impl fmt::Debug for PasswordAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordAuth(****)")
    }
}

#[async_trait]
impl AuthStrategy for PasswordAuth {
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<bool, AuthAttemptError> {
        let result = handle.authenticate_password(username, &self.password).await?;
        Ok(result.success())
    }

    fn name(&self) -> &'static str {
        "password"
    }
}
