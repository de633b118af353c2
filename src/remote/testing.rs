//! Test fixtures: key files, a private ssh-agent and a scripted SSH server.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use russh::keys::agent::client::AgentClient;
use russh::keys::{PrivateKey, PublicKey};
use russh::server::{Auth, Msg, Server as _, Session};
use russh::{Channel, ChannelId, CryptoVec};
use tempfile::TempDir;
use tokio::net::{TcpListener, UnixStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::remote::auth::SharedAgent;

pub(crate) fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub(crate) fn fixture_private_key(name: &str) -> PrivateKey {
    russh::keys::load_secret_key(fixture_path(name), None).expect("load fixture key")
}

pub(crate) fn fixture_public_key(name: &str) -> PublicKey {
    let text = std::fs::read_to_string(fixture_path(name)).expect("read fixture public key");
    PublicKey::from_openssh(text.trim()).expect("parse fixture public key")
}

/// Agent handle whose peer never answers. Only usable where no signing
/// happens. Must be called inside a tokio runtime.
pub(crate) fn idle_agent() -> SharedAgent {
    let (stream, _peer) = UnixStream::pair().expect("socket pair");
    Arc::new(Mutex::new(AgentClient::connect(stream)))
}

/// Agent handle whose peer has already hung up: every request fails.
/// Must be called inside a tokio runtime.
pub(crate) fn dead_agent() -> SharedAgent {
    let (stream, peer) = UnixStream::pair().expect("socket pair");
    drop(peer);
    Arc::new(Mutex::new(AgentClient::connect(stream)))
}

pub(crate) fn can_bind_localhost() -> bool {
    std::net::TcpListener::bind(("127.0.0.1", 0)).is_ok()
}

/// When set, a missing test facility fails the test instead of skipping it.
pub(crate) const REQUIRE_FACILITIES_ENV_VAR: &str = "PODMAN_UDS_REQUIRE_TEST_FACILITIES";

/// Report that `facility` is unavailable and skip, or fail when facilities
/// are required.
pub(crate) fn skip<T>(facility: &str, reason: impl fmt::Display) -> Option<T> {
    if std::env::var_os(REQUIRE_FACILITIES_ENV_VAR).is_some() {
        panic!("{} unavailable: {}", facility, reason);
    }
    eprintln!("SKIPPED: {} unavailable: {}", facility, reason);
    None
}

/// Private `ssh-agent` bound to a temporary socket, killed on drop.
pub(crate) struct TestAgent {
    _dir: TempDir,
    socket: PathBuf,
    pid: u32,
}

impl TestAgent {
    /// Start an agent, or `None` when `ssh-agent` is not available.
    pub(crate) async fn spawn() -> Option<Self> {
        let dir = match TempDir::new() {
            Ok(dir) => dir,
            Err(e) => return skip("ssh-agent", e),
        };
        let socket = dir.path().join("agent.sock");
        let out = match tokio::process::Command::new("ssh-agent")
            .arg("-a")
            .arg(&socket)
            .arg("-s")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
        {
            Ok(out) => out,
            Err(e) => return skip("ssh-agent", e),
        };
        if !out.status.success() {
            return skip("ssh-agent", out.status);
        }
        let stdout = String::from_utf8_lossy(&out.stdout);
        let Some(pid) = stdout
            .split(';')
            .find_map(|part| part.trim().strip_prefix("SSH_AGENT_PID="))
            .and_then(|v| v.parse::<u32>().ok())
        else {
            return skip("ssh-agent", "no SSH_AGENT_PID in output");
        };

        Some(Self {
            _dir: dir,
            socket,
            pid,
        })
    }

    pub(crate) fn socket(&self) -> &Path {
        &self.socket
    }

    pub(crate) async fn add(&self, key: &PrivateKey) {
        let stream = UnixStream::connect(&self.socket)
            .await
            .expect("connect to agent");
        let mut agent = AgentClient::connect(stream);
        agent.add_identity(key, &[]).await.expect("add identity");
    }
}

impl Drop for TestAgent {
    fn drop(&mut self) {
        let _ = std::process::Command::new("kill")
            .arg(self.pid.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }
}

/// What the scripted remote answers to `exec`.
#[derive(Debug, Clone, Default)]
pub(crate) struct Reply {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_status: u32,
}

impl Reply {
    pub(crate) fn ok(stdout: &str) -> Self {
        Self {
            stdout: stdout.as_bytes().to_vec(),
            ..Self::default()
        }
    }

    pub(crate) fn failed(exit_status: u32, stderr: &str) -> Self {
        Self {
            stderr: stderr.as_bytes().to_vec(),
            exit_status,
            ..Self::default()
        }
    }
}

/// Behavior of the scripted remote.
#[derive(Debug, Clone, Default)]
pub(crate) struct Script {
    pub password: Option<String>,
    pub allowed_keys: Vec<PublicKey>,
    pub accept_none: bool,
    pub reply: Reply,
}

#[derive(Clone)]
struct ScriptedServer {
    script: Arc<Script>,
    connections: Arc<AtomicUsize>,
    commands: Arc<StdMutex<Vec<String>>>,
    channels: Arc<StdMutex<HashMap<ChannelId, Channel<Msg>>>>,
}

impl russh::server::Server for ScriptedServer {
    type Handler = Self;

    fn new_client(&mut self, _: Option<SocketAddr>) -> Self::Handler {
        self.connections.fetch_add(1, Ordering::SeqCst);
        self.clone()
    }
}

impl russh::server::Handler for ScriptedServer {
    type Error = russh::Error;

    fn auth_none(&mut self, _user: &str) -> impl Future<Output = Result<Auth, Self::Error>> + Send {
        let accepted = self.script.accept_none;
        async move {
            if accepted {
                Ok(Auth::Accept)
            } else {
                Ok(Auth::reject())
            }
        }
    }

    fn auth_password(
        &mut self,
        _user: &str,
        password: &str,
    ) -> impl Future<Output = Result<Auth, Self::Error>> + Send {
        let accepted = self.script.password.as_deref() == Some(password);
        async move {
            if accepted {
                Ok(Auth::Accept)
            } else {
                Ok(Auth::reject())
            }
        }
    }

    fn auth_publickey(
        &mut self,
        _user: &str,
        key: &PublicKey,
    ) -> impl Future<Output = Result<Auth, Self::Error>> + Send {
        let accepted = self
            .script
            .allowed_keys
            .iter()
            .any(|allowed| allowed.key_data() == key.key_data());
        async move {
            if accepted {
                Ok(Auth::Accept)
            } else {
                Ok(Auth::reject())
            }
        }
    }

    fn channel_open_session(
        &mut self,
        channel: Channel<Msg>,
        _session: &mut Session,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send {
        if let Ok(mut channels) = self.channels.lock() {
            channels.insert(channel.id(), channel);
        }
        async { Ok(true) }
    }

    fn exec_request(
        &mut self,
        channel: ChannelId,
        data: &[u8],
        session: &mut Session,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        if let Ok(mut commands) = self.commands.lock() {
            commands.push(String::from_utf8_lossy(data).into_owned());
        }

        let reply = &self.script.reply;
        let _ = session.channel_success(channel);
        if !reply.stdout.is_empty() {
            let _ = session.data(channel, CryptoVec::from_slice(&reply.stdout));
        }
        if !reply.stderr.is_empty() {
            let _ = session.extended_data(channel, 1, CryptoVec::from_slice(&reply.stderr));
        }
        let _ = session.exit_status_request(channel, reply.exit_status);
        let _ = session.eof(channel);
        let _ = session.close(channel);

        async { Ok(()) }
    }
}

/// A scripted remote listening on 127.0.0.1, stopped on drop.
pub(crate) struct ScriptedRemote {
    pub port: u16,
    connections: Arc<AtomicUsize>,
    commands: Arc<StdMutex<Vec<String>>>,
    task: JoinHandle<()>,
}

impl ScriptedRemote {
    /// Start the server inside the current tokio runtime. `None`, with a
    /// skip notice, when the sandbox forbids binding a local port.
    pub(crate) async fn start(script: Script) -> Option<Self> {
        let listener = match TcpListener::bind(("127.0.0.1", 0)).await {
            Ok(listener) => listener,
            Err(e) => return skip("local TCP port", e),
        };
        let port = match listener.local_addr() {
            Ok(addr) => addr.port(),
            Err(e) => return skip("local TCP port", e),
        };

        let config = Arc::new(russh::server::Config {
            auth_rejection_time: Duration::from_millis(0),
            auth_rejection_time_initial: Some(Duration::from_millis(0)),
            inactivity_timeout: Some(Duration::from_secs(10)),
            keys: vec![fixture_private_key("id_ed25519_plain")],
            ..Default::default()
        });

        let connections = Arc::new(AtomicUsize::new(0));
        let commands = Arc::new(StdMutex::new(Vec::new()));
        let mut server = ScriptedServer {
            script: Arc::new(script),
            connections: connections.clone(),
            commands: commands.clone(),
            channels: Arc::new(StdMutex::new(HashMap::new())),
        };
        let task = tokio::spawn(async move {
            let _ = server.run_on_socket(config, &listener).await;
        });

        Some(Self {
            port,
            connections,
            commands,
            task,
        })
    }

    pub(crate) fn host(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    pub(crate) fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub(crate) fn commands(&self) -> Vec<String> {
        self.commands.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Drop for ScriptedRemote {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Host key fingerprint the scripted remote presents.
pub(crate) const SCRIPTED_HOST_FINGERPRINT: &str =
    "SHA256:wrqm16cySfWFEafUlv5ilr/tmU+1TjmogREbri0YuWA";

/// Port on 127.0.0.1 with nothing listening.
pub(crate) fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).expect("bind");
    listener.local_addr().expect("local addr").port()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_yields_none_unless_required() {
        if std::env::var_os(REQUIRE_FACILITIES_ENV_VAR).is_some() {
            return;
        }
        let skipped: Option<()> = skip("local TCP port", "denied");
        assert!(skipped.is_none());
    }
}
