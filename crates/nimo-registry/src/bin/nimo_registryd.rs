//! The Registry service binary: binds the command port, announces
//! itself via mDNS (§4.D), and serves `nimo_registry::build_handlers`
//! until `stop.` is received or the process is signaled. Mirrors the
//! teacher's `spec-subject::main` shape — parse args, init tracing,
//! build a current/multi-thread runtime, run.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use serde::Deserialize;

use nimo_discovery::Announcement;
use nimo_proto::{CommandEngine, ShutdownFlag};
use nimo_registry::{build_handlers, MemoryStore, Publisher, Registry};
use nimo_types::Endpoint;

#[derive(Parser, Debug)]
#[command(name = "nimo-registryd", about = "The nImO Registry service")]
struct Args {
    /// Path to a TOML config file; `[registry]` table only (§6).
    #[arg(long)]
    config: Option<PathBuf>,

    /// This machine's IPv4 address, overriding the config file.
    #[arg(long)]
    address: Option<Ipv4Addr>,

    /// TCP command port; `0` picks an ephemeral port.
    #[arg(long, default_value_t = 0)]
    port: u16,

    /// mDNS advertisement tag, overriding the config file.
    #[arg(long)]
    tag: Option<String>,

    #[arg(long, default_value_t = false)]
    log: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    registry: RegistrySection,
}

#[derive(Debug, Default, Deserialize)]
struct RegistrySection {
    address: Option<Ipv4Addr>,
    tag: Option<String>,
    multicast_group: Option<Ipv4Addr>,
    multicast_port: Option<u16>,
}

fn main() {
    let args = Args::parse();

    let default_filter = if args.log { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let file_config = args
        .config
        .as_ref()
        .map(|path| {
            let text = std::fs::read_to_string(path)
                .unwrap_or_else(|e| panic!("reading config {path:?}: {e}"));
            toml::from_str::<ConfigFile>(&text).unwrap_or_else(|e| panic!("parsing config {path:?}: {e}"))
        })
        .unwrap_or_default();

    let address = args
        .address
        .or(file_config.registry.address)
        .unwrap_or(Ipv4Addr::LOCALHOST);
    let tag = args
        .tag
        .or(file_config.registry.tag)
        .unwrap_or_else(|| "nimo-registry".to_string());
    let multicast_group = file_config
        .registry
        .multicast_group
        .unwrap_or(nimo_registry::DEFAULT_MULTICAST_GROUP);
    let multicast_port = file_config
        .registry
        .multicast_port
        .unwrap_or(nimo_registry::DEFAULT_MULTICAST_PORT);

    let rt = tokio::runtime::Runtime::new().expect("failed to create runtime");
    rt.block_on(run(address, args.port, tag, multicast_group, multicast_port));
}

async fn run(address: Ipv4Addr, port: u16, tag: String, multicast_group: Ipv4Addr, multicast_port: u16) {
    let publisher = match Publisher::bind(multicast_group, multicast_port).await {
        Ok(publisher) => Some(publisher),
        Err(e) => {
            tracing::warn!(error = %e, "status bus publisher unavailable, continuing without it");
            None
        }
    };
    let registry = Arc::new(Registry::new(Arc::new(MemoryStore::new()), publisher));
    let shutdown = ShutdownFlag::new();
    let handlers = build_handlers(Arc::clone(&registry), shutdown.clone());
    let engine = Arc::new(CommandEngine::new(handlers, shutdown.clone()));

    let bind_addr = SocketAddr::new(address.into(), port);
    let (local_addr, listener) = engine
        .bind_tcp(bind_addr)
        .await
        .unwrap_or_else(|e| panic!("binding command port {bind_addr}: {e}"));
    tracing::info!(%local_addr, "Registry command port bound");

    let announcement = match Announcement::publish(Endpoint::from(match local_addr {
        SocketAddr::V4(addr) => addr,
        SocketAddr::V6(_) => panic!("command port bound to an unexpected IPv6 address"),
    }), &tag) {
        Ok(a) => Some(a),
        Err(e) => {
            tracing::warn!(error = %e, "mDNS announcement failed, continuing without discovery");
            None
        }
    };

    engine.serve_tcp(listener).await;

    if let Some(announcement) = announcement {
        announcement.unregister();
    }
    tracing::info!("Registry stopped");
}
