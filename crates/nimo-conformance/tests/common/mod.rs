//! Shared harness: spin up a Registry with its command engine bound to
//! an ephemeral loopback port, the way the §8 scenarios assume a running
//! Registry to drive over TCP.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use nimo_proto::{CommandEngine, ShutdownFlag};
use nimo_registry::{build_handlers, MemoryStore, Registry};
use nimo_registry_client::RegistryClient;
use nimo_types::Endpoint;

/// Binds a Registry on loopback and returns a connected client plus the
/// shutdown flag, so a test can drive `stop.` and observe the effect.
pub async fn spawn_registry() -> (RegistryClient, ShutdownFlag) {
    let registry = Arc::new(Registry::new(Arc::new(MemoryStore::new()), None));
    let shutdown = ShutdownFlag::new();
    let handlers = build_handlers(Arc::clone(&registry), shutdown.clone());
    let engine = Arc::new(CommandEngine::new(handlers, shutdown.clone()));

    let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0);
    let (local_addr, listener) = engine.bind_tcp(addr).await.expect("bind loopback port");
    let engine_clone = Arc::clone(&engine);
    tokio::spawn(async move { engine_clone.serve_tcp(listener).await });

    let endpoint = match local_addr {
        SocketAddr::V4(addr) => Endpoint::from(addr),
        SocketAddr::V6(_) => unreachable!("bound to an IPv4 loopback address"),
    };
    let client = RegistryClient::connect(endpoint).await.expect("connect to Registry");
    (client, shutdown)
}
