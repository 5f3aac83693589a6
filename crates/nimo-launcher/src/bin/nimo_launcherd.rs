//! The Launcher service binary: resolves the Registry via mDNS, registers
//! itself as a Node, pushes its application catalogue, and serves
//! `nimo_launcher::build_handlers` until `stop.` is received. Shares the
//! `Context`-driven start-up shape used by every long-running node
//! (`nimo-context::Context`, §4.E), unlike the Registry's own binary
//! which is necessarily self-contained.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use nimo_context::{Context, ContextKind, NimoConfig};
use nimo_launcher::{AppDescriptor, Launcher};
use nimo_proto::{CommandEngine, ShutdownFlag};
use nimo_registry_client::{LauncherAppEntry, RegistryClient};
use nimo_types::{Endpoint, MachineName, NodeName};

#[derive(Parser, Debug)]
#[command(name = "nimo-launcherd", about = "The nImO Launcher service")]
struct Args {
    /// Path to a TOML config file; `[node]` and `[launcher]` tables (§6).
    #[arg(long)]
    config: Option<PathBuf>,

    /// This node's globally unique name.
    #[arg(long)]
    node_name: String,

    /// TCP command port; `0` picks an ephemeral port.
    #[arg(long, default_value_t = 0)]
    port: u16,

    /// mDNS advertisement tag, overriding the config file.
    #[arg(long)]
    tag: Option<String>,

    #[arg(long, default_value_t = false)]
    log: bool,
}

fn main() {
    let args = Args::parse();
    if args.log && std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "debug");
    }
    nimo_context::init_for_service();

    let rt = tokio::runtime::Runtime::new().expect("failed to create runtime");
    rt.block_on(run(args));
}

async fn run(args: Args) {
    let config = args
        .config
        .as_deref()
        .map(NimoConfig::load)
        .transpose()
        .unwrap_or_else(|e| panic!("loading config: {e}"))
        .unwrap_or_default();

    let tag = args
        .tag
        .or_else(|| config.node.tag.clone())
        .unwrap_or_else(|| "nimo-launcher".to_string());
    let machine = MachineName::new(
        config
            .node
            .machine
            .clone()
            .unwrap_or_else(|| "localhost".to_string()),
    );

    let registry_endpoint =
        nimo_discovery::wait_for_registry(nimo_discovery::default_deadline(), &ShutdownFlag::new())
            .await
            .unwrap_or_else(|e| panic!("finding Registry: {e}"));
    let registry_client = Arc::new(
        RegistryClient::connect(registry_endpoint)
            .await
            .unwrap_or_else(|e| panic!("connecting to Registry: {e}")),
    );

    let context = Arc::new(Context::new(ContextKind::Launcher, tag, machine).with_registry(Arc::clone(&registry_client)));

    let apps: Vec<AppDescriptor> = config
        .launcher
        .apps
        .iter()
        .map(|entry| AppDescriptor {
            short_name: entry.short_name.clone(),
            description: entry.description.clone(),
            executable_path: entry.executable_path.clone(),
            argument_descriptors: entry.argument_template.clone(),
            option_descriptors: entry.option_template.clone(),
        })
        .collect();
    let launcher = Arc::new(Launcher::new(apps));

    let shutdown = context.shutdown_flag();
    let handlers = nimo_launcher::build_handlers(Arc::clone(&launcher), shutdown.clone());
    let engine = Arc::new(CommandEngine::new(handlers, shutdown.clone()));

    let bind_addr = SocketAddr::new(std::net::Ipv4Addr::UNSPECIFIED.into(), args.port);
    let (local_addr, listener) = engine
        .bind_tcp(bind_addr)
        .await
        .unwrap_or_else(|e| panic!("binding command port {bind_addr}: {e}"));
    tracing::info!(%local_addr, "Launcher command port bound");

    let command_endpoint = match local_addr {
        SocketAddr::V4(addr) => Endpoint::from(addr),
        SocketAddr::V6(_) => panic!("command port bound to an unexpected IPv6 address"),
    };
    let node_name = NodeName::new(args.node_name);
    context
        .register_node(node_name.clone(), command_endpoint)
        .await
        .unwrap_or_else(|e| panic!("registering as a Node: {e}"));

    push_catalogue(&registry_client, &node_name, &config.launcher.apps).await;

    engine.serve_tcp(listener).await;

    if let Err(e) = registry_client.remove_node(node_name.as_str()).await {
        tracing::warn!(error = %e, "failed to deregister on shutdown");
    }
    tracing::info!("Launcher stopped");
}

async fn push_catalogue(
    registry_client: &RegistryClient,
    node_name: &NodeName,
    apps: &[nimo_context::AppConfigEntry],
) {
    let entries: Vec<LauncherAppEntry> = apps
        .iter()
        .map(|entry| LauncherAppEntry {
            short_name: entry.short_name.clone(),
            description: entry.description.clone(),
            executable_path: entry.executable_path.clone(),
            argument_template: entry.argument_template.clone(),
            option_template: entry.option_template.clone(),
        })
        .collect();
    if let Err(e) = registry_client
        .set_applications_for_node(node_name.as_str(), &entries)
        .await
    {
        tracing::warn!(error = %e, "failed to push application catalogue to Registry");
    }
}
