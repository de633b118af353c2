//! ssh-agent bridge.

use std::path::Path;
use std::sync::Arc;

use russh::keys::agent::client::AgentClient;
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use tracing::debug;

use crate::remote::error::{AgentFailure, ResolveError, ResolveResult};

use super::signer::{SharedAgent, Signer};

/// Collect every key held by the agent advertised at `socket`.
///
/// No socket means no agent signers. An advertised agent is expected to be
/// reachable: failing to connect or to list identities fails the resolution.
pub async fn agent_signers(socket: Option<&Path>) -> ResolveResult<Vec<Signer>> {
    let Some(socket) = socket else {
        return Ok(Vec::new());
    };
    debug!("Found SSH_AUTH_SOCK {:?}, ssh-agent signer enabled", socket);

    let unreachable = |source| ResolveError::AgentUnreachable {
        socket: socket.to_path_buf(),
        source,
    };

    let stream = UnixStream::connect(socket)
        .await
        .map_err(|e| unreachable(AgentFailure::Connect(e)))?;
    let mut client = AgentClient::connect(stream);

    let identities = client
        .request_identities()
        .await
        .map_err(|e| unreachable(AgentFailure::Identities(e)))?;

    let agent: SharedAgent = Arc::new(Mutex::new(client));
    let signers = identities
        .into_iter()
        .map(|key| Signer::Agent {
            key,
            agent: agent.clone(),
        })
        .inspect(|signer| debug!("SSH Agent Key {} {}", signer.fingerprint(), signer.key_type()))
        .collect();

    Ok(signers)
}
