//! Extraction of the service socket from `podman info --format=json`.

use tracing::debug;

use crate::remote::error::{ResolveError, ResolveResult};
use crate::remote::types::RemoteInfo;

/// Read `host.remoteSocket.path` from the info document printed by `host`.
///
/// Unknown fields are ignored. A JSON `null` document, a missing `host` or
/// `remoteSocket`, and an empty path all mean the remote did not report a
/// socket.
pub fn parse_socket_path(host: &str, stdout: &[u8]) -> ResolveResult<String> {
    let info: Option<RemoteInfo> =
        serde_json::from_slice(stdout).map_err(|source| ResolveError::PayloadDecode {
            host: host.to_string(),
            source,
        })?;
    let info = info.unwrap_or_default();

    if let Some(version) = &info.version {
        debug!(
            "Remote podman on {} reports version {:?} (API {:?})",
            host, version.version, version.api_version
        );
    }

    let socket = info
        .host
        .and_then(|h| {
            if let Some(hostname) = &h.hostname {
                debug!("Remote hostname for {}: {}", host, hostname);
            }
            h.remote_socket
        })
        .filter(|s| !s.path.is_empty())
        .ok_or_else(|| ResolveError::SocketNotReported {
            host: host.to_string(),
        })?;

    if socket.exists == Some(false) {
        debug!("Remote podman on {} reports {} as not existing yet", host, socket.path);
    }
    Ok(socket.path)
}
