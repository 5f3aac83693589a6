//! mDNS discovery (§4.D): the Registry announces itself under a
//! well-known service type; every other node resolves that type to find
//! it, retrying at geometric back-off when *wait-for-registry* is
//! enabled. Built on `mdns-sd`, the one maintained pure-Rust mDNS/DNS-SD
//! crate — neither the teacher nor the rest of the example pack
//! implements mDNS, so this dependency is an ecosystem import rather
//! than one inherited from the teacher's own stack (recorded in
//! DESIGN.md).

use std::time::Duration;

use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};

use nimo_types::{Endpoint, NimoError};

/// The opaque service-type token (§4.D: "the only requirement is that
/// the same token is used by publisher and all subscribers").
pub const SERVICE_TYPE: &str = "_nimo-registry._tcp.local.";

/// TXT record key carrying the Registry protocol version (§4.D, §6).
pub const VERSION_TXT_KEY: &str = "version";

/// The protocol version this build of nImO speaks.
pub const PROTOCOL_VERSION: &str = "1";

const DEFAULT_DEADLINE: Duration = Duration::from_secs(5);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Announces the Registry's command endpoint via mDNS. Held for the
/// Registry process's lifetime; dropping it (or calling
/// [`Announcement::unregister`]) withdraws the record.
pub struct Announcement {
    daemon: ServiceDaemon,
    fullname: String,
}

impl Announcement {
    pub fn publish(endpoint: Endpoint, tag: &str) -> Result<Self, NimoError> {
        let daemon =
            ServiceDaemon::new().map_err(|e| NimoError::internal(format!("mdns daemon: {e}")))?;
        let host_label = format!("{tag}.local.");
        let mut properties = std::collections::HashMap::new();
        properties.insert(VERSION_TXT_KEY.to_string(), PROTOCOL_VERSION.to_string());

        let info = ServiceInfo::new(
            SERVICE_TYPE,
            tag,
            &host_label,
            endpoint.address,
            endpoint.port,
            Some(properties),
        )
        .map_err(|e| NimoError::internal(format!("mdns service info: {e}")))?;
        let fullname = info.get_fullname().to_string();

        daemon
            .register(info)
            .map_err(|e| NimoError::internal(format!("mdns register: {e}")))?;
        Ok(Self { daemon, fullname })
    }

    pub fn unregister(self) {
        let _ = self.daemon.unregister(&self.fullname);
        let _ = self.daemon.shutdown();
    }
}

/// Resolve the Registry's command endpoint once, waiting up to
/// `deadline` for a response. Fails with `registryNotFound` on timeout
/// (§4.D).
pub async fn resolve_once(deadline: Duration) -> Result<Endpoint, NimoError> {
    let daemon =
        ServiceDaemon::new().map_err(|e| NimoError::internal(format!("mdns daemon: {e}")))?;
    let receiver = daemon
        .browse(SERVICE_TYPE)
        .map_err(|e| NimoError::internal(format!("mdns browse: {e}")))?;

    let outcome = tokio::task::spawn_blocking(move || {
        let start = std::time::Instant::now();
        loop {
            let remaining = deadline.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                return None;
            }
            match receiver.recv_timeout(remaining) {
                Ok(ServiceEvent::ServiceResolved(info)) => {
                    let address = info.get_addresses().iter().next().copied();
                    if let Some(address) = address {
                        if let std::net::IpAddr::V4(v4) = address {
                            return Some(Endpoint::new(v4, info.get_port()));
                        }
                    }
                }
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
    })
    .await
    .map_err(|e| NimoError::internal(format!("mdns resolve task panicked: {e}")))?;

    let _ = daemon.shutdown();
    outcome.ok_or_else(|| NimoError::registry_not_found("no Registry responded to mDNS query"))
}

/// Resolve the Registry, retrying at geometric back-off (doubling from
/// `deadline` up to a 60s cap) until one responds or `stop` fires
/// (§4.D "repeated at geometric back-off until a response arrives or
/// the caller cancels").
pub async fn wait_for_registry(
    deadline: Duration,
    stop: &nimo_proto::ShutdownFlag,
) -> Result<Endpoint, NimoError> {
    let mut backoff = deadline.max(Duration::from_millis(1));
    loop {
        if stop.should_stop() {
            return Err(NimoError::registry_not_found(
                "wait-for-registry cancelled before a Registry was found",
            ));
        }
        match resolve_once(backoff).await {
            Ok(endpoint) => return Ok(endpoint),
            Err(_) => {
                tracing::info!(next_wait = ?backoff, "Registry not found, retrying");
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
    }
}

pub fn default_deadline() -> Duration {
    DEFAULT_DEADLINE
}
