//! The Registry's schema (§3): one Rust struct per entity kind. This is
//! the only persisted artefact (§6); the storage engine behind it is out
//! of scope, so these structs are deliberately plain data, easy to
//! (de)serialize for whatever backend eventually stores them.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use nimo_types::{ChannelKey, Endpoint, MachineName, NodeName, ServiceKind, Transport, TransportPref};

#[derive(Debug, Clone)]
pub struct MachineRow {
    pub name: MachineName,
    pub address: Ipv4Addr,
}

#[derive(Debug, Clone)]
pub struct NodeRow {
    pub name: NodeName,
    pub machine: MachineName,
    pub kind: ServiceKind,
    pub command_endpoint: Endpoint,
    pub last_seen: Instant,
    /// §3 Node Lifecycle: "implicitly removed when a heartbeat timeout
    /// elapses (configurable; default infinite)". `None` means infinite.
    pub heartbeat_timeout: Option<Duration>,
}

impl NodeRow {
    pub fn is_alive(&self, now: Instant) -> bool {
        match self.heartbeat_timeout {
            None => true,
            Some(timeout) => now.saturating_duration_since(self.last_seen) < timeout,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelStatistics {
    pub bytes: u64,
    pub messages: u64,
}

#[derive(Debug, Clone)]
pub struct ChannelRow {
    pub key: ChannelKey,
    pub is_output: bool,
    pub data_type: String,
    pub transport_pref: TransportPref,
    pub in_use: bool,
    /// §9 Open Question decision: true only while the channel has never
    /// been the endpoint of a live connection; see DESIGN.md.
    pub modifiable: bool,
    pub statistics: ChannelStatistics,
    pub endpoint: Option<Endpoint>,
}

#[derive(Debug, Clone)]
pub struct ConnectionRow {
    pub from: ChannelKey,
    pub to: ChannelKey,
    pub transport: Transport,
    pub data_type: String,
}

#[derive(Debug, Clone)]
pub struct ApplicationRow {
    pub launcher_node: NodeName,
    pub short_name: String,
    pub description: String,
    pub executable_path: String,
    pub argument_template: Vec<String>,
    pub option_template: Vec<String>,
}

/// The full Registry schema: five tables with foreign keys as described
/// in §3 and §6.
#[derive(Debug, Default)]
pub struct Tables {
    pub machines: HashMap<MachineName, MachineRow>,
    pub nodes: HashMap<NodeName, NodeRow>,
    pub channels: HashMap<ChannelKey, ChannelRow>,
    /// Keyed by sink (`to`) so "an input channel cannot appear as the
    /// sink of two live connections" (§3 invariant 2) is enforced by the
    /// map itself: a second insert for the same sink is a collision the
    /// caller must check for before inserting.
    pub connections: HashMap<ChannelKey, ConnectionRow>,
    pub applications: HashMap<(NodeName, String), ApplicationRow>,
}

impl Tables {
    pub fn node_count_on_machine(&self, machine: &MachineName) -> usize {
        self.nodes.values().filter(|n| &n.machine == machine).count()
    }
}
