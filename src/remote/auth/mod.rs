//! Credential resolution and authentication strategies.
//!
//! Signers come from two sources and are merged by fingerprint:
//!
//! - [`load_identity`]: the identity file named by the caller
//! - [`agent_signers`]: every key held by the advertised ssh-agent
//!
//! The merged signers and the optional URI password become an [`AuthChain`]
//! whose methods implement the [`AuthStrategy`] trait.
//!
//! # Example
//!
//! ```ignore
//! let identity = load_identity(path, env.passphrase())?;
//! let agent = agent_signers(env.agent_socket().map(PathBuf::as_path)).await?;
//! let signers = dedup_signers(identity.into_iter().chain(agent));
//! let chain = AuthChain::negotiate(signers, descriptor.password.as_deref());
//! ```

mod agent;
mod chain;
mod key;
mod password;
mod signer;
mod traits;

pub use agent::agent_signers;
pub use chain::{AuthChain, AuthMethod};
pub use key::{PublicKeyAuth, load_identity};
pub use password::PasswordAuth;
pub use signer::{SharedAgent, Signer, dedup_signers};
pub use traits::AuthStrategy;
