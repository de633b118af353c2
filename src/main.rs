#![deny(warnings)]
#![deny(clippy::unwrap_used)]

use std::process::ExitCode;

use dotenv::dotenv;
use podman_uds::{ConnectionDescriptor, EnvContext, resolve_socket_path};
use tracing::{error, info};

/// Identity file used when none is passed on the command line.
const SSHKEY_ENV_VAR: &str = "CONTAINER_SSHKEY";

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    dotenv().ok();

    // Initialize logging with proper tracing default
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(uri) = args.next() else {
        eprintln!("usage: podman-uds <ssh://[user[:password]@]host[:port]> [identity-file]");
        return Ok(ExitCode::from(2));
    };
    let identity = args
        .next()
        .or_else(|| std::env::var(SSHKEY_ENV_VAR).ok())
        .unwrap_or_default();

    let env = EnvContext::from_env();
    let descriptor = match ConnectionDescriptor::parse(&uri, &identity, &env) {
        Ok(descriptor) => descriptor,
        Err(e) => {
            error!("Invalid connection URI: {}", e);
            eprintln!("{}", e);
            return Ok(ExitCode::from(2));
        }
    };
    info!("Resolving Podman socket on {}@{}", descriptor.username, descriptor.host);

    match resolve_socket_path(&descriptor, &env).await {
        Ok(path) => {
            println!("{}", path);
            println!("{}", descriptor.service_uri(&path));
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!("Resolution failed ({}): {}", e.kind(), e);
            eprintln!("{}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}
