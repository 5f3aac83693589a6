//! The Registry core (§4.G): the authoritative tables and the
//! invariants across them. A single writer path per mutating operation,
//! serialized by `write_sequencer` so that a mutation's status event is
//! always published before the next mutation's, even though the table
//! lock itself is the non-async `parking_lot::RwLock` on
//! [`crate::tables::Tables`] (matching the teacher's lock choice for
//! hot in-process state).

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use nimo_types::{
    agree_transport, ChannelKey, ChannelPath, Endpoint, MachineName, NimoError, NodeName,
    ServiceKind, Transport, TransportPref,
};

use crate::statusbus::{Publisher, StatusEvent};
use crate::store::RegistryStore;
use crate::tables::{
    ApplicationRow, ChannelRow, ChannelStatistics, ConnectionRow, MachineRow, NodeRow, Tables,
};

pub struct Registry {
    store: Arc<dyn RegistryStore>,
    publisher: Option<Publisher>,
    /// Held for the duration of one mutate-then-publish operation so
    /// that two concurrent writers can't interleave their publishes out
    /// of order relative to their own mutation (§4.G ordering).
    write_sequencer: tokio::sync::Mutex<()>,
}

impl Registry {
    pub fn new(store: Arc<dyn RegistryStore>, publisher: Option<Publisher>) -> Self {
        Self {
            store,
            publisher,
            write_sequencer: tokio::sync::Mutex::new(()),
        }
    }

    /// Run `f` against the tables under the write lock, then publish the
    /// event it returns (if any) once the lock is released.
    async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Tables) -> Result<(T, Option<StatusEvent>), NimoError>,
    ) -> Result<T, NimoError> {
        let _sequencer = self.write_sequencer.lock().await;
        let (result, event) = {
            let mut tables = self.store.tables().write();
            f(&mut tables)?
        };
        if let (Some(publisher), Some(event)) = (&self.publisher, event) {
            publisher.publish(event).await;
        }
        Ok(result)
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> T {
        let tables = self.store.tables().read();
        f(&tables)
    }

    // ---------------------------------------------------------------
    // Machine
    // ---------------------------------------------------------------

    pub async fn add_machine(&self, name: MachineName, address: Ipv4Addr) -> Result<(), NimoError> {
        self.mutate(|tables| {
            if tables.machines.contains_key(&name) {
                return Err(NimoError::already_exists(format!(
                    "machine {name} already exists"
                )));
            }
            tables.machines.insert(
                name.clone(),
                MachineRow {
                    name: name.clone(),
                    address,
                },
            );
            Ok(((), Some(StatusEvent::MachineAdded(name))))
        })
        .await
    }

    pub fn get_machine_information(&self, name: &MachineName) -> Option<MachineRow> {
        self.read(|tables| tables.machines.get(name).cloned())
    }

    pub fn is_machine_present(&self, name: &MachineName) -> bool {
        self.read(|tables| tables.machines.contains_key(name))
    }

    pub fn get_names_of_machines(&self) -> Vec<MachineName> {
        self.read(|tables| tables.machines.keys().cloned().collect())
    }

    pub fn get_number_of_machines(&self) -> usize {
        self.read(|tables| tables.machines.len())
    }

    fn remove_machine_if_empty(tables: &mut Tables, machine: &MachineName) -> Option<StatusEvent> {
        if tables.node_count_on_machine(machine) == 0 && tables.machines.remove(machine).is_some() {
            Some(StatusEvent::MachineRemoved(machine.clone()))
        } else {
            None
        }
    }

    // ---------------------------------------------------------------
    // Node
    // ---------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub async fn add_node(
        &self,
        name: NodeName,
        machine: MachineName,
        kind: ServiceKind,
        command_endpoint: Endpoint,
        heartbeat_timeout: Option<Duration>,
    ) -> Result<(), NimoError> {
        self.mutate(|tables| {
            if tables.nodes.contains_key(&name) {
                return Err(NimoError::already_exists(format!(
                    "node {name} already exists"
                )));
            }
            tables.machines.entry(machine.clone()).or_insert_with(|| MachineRow {
                name: machine.clone(),
                address: command_endpoint.address,
            });
            tables.nodes.insert(
                name.clone(),
                NodeRow {
                    name: name.clone(),
                    machine,
                    kind,
                    command_endpoint,
                    last_seen: Instant::now(),
                    heartbeat_timeout,
                },
            );
            Ok(((), Some(StatusEvent::NodeAdded(name))))
        })
        .await
    }

    /// Cascading remove (§3 Node invariant): drops the node's channels
    /// and any connection referencing them, all inside one mutation so
    /// readers never observe an intermediate state (§4.G ordering).
    pub async fn remove_node(&self, name: &NodeName) -> Result<(), NimoError> {
        let name = name.clone();
        self.mutate(move |tables| {
            let node = tables
                .nodes
                .remove(&name)
                .ok_or_else(|| NimoError::not_found(format!("node {name} not found")))?;

            let channel_keys: Vec<ChannelKey> = tables
                .channels
                .keys()
                .filter(|k| k.node == name)
                .cloned()
                .collect();
            for key in &channel_keys {
                tables.channels.remove(key);
            }
            tables
                .connections
                .retain(|_, conn| !channel_keys.contains(&conn.from) && !channel_keys.contains(&conn.to));
            tables
                .applications
                .retain(|(launcher, _), _| launcher != &name);

            let machine_event = Self::remove_machine_if_empty(tables, &node.machine);
            // The spec names one event kind per removed node; cascaded
            // channel/connection removals are folded into this single
            // publish rather than firing one event per row, since §4.G
            // only promises ordering within one mutation, not a 1:1
            // event-per-row contract.
            let _ = machine_event;
            Ok(((), Some(StatusEvent::NodeRemoved(name.clone()))))
        })
        .await
    }

    pub fn get_node_information(&self, name: &NodeName) -> Option<NodeRow> {
        self.read(|tables| tables.nodes.get(name).cloned())
    }

    pub fn is_node_present(&self, name: &NodeName) -> bool {
        self.read(|tables| tables.nodes.contains_key(name))
    }

    pub fn get_names_of_nodes(&self) -> Vec<NodeName> {
        self.read(|tables| tables.nodes.keys().cloned().collect())
    }

    pub fn get_information_for_all_nodes(&self) -> Vec<NodeRow> {
        self.read(|tables| tables.nodes.values().cloned().collect())
    }

    pub fn get_number_of_nodes(&self) -> usize {
        self.read(|tables| tables.nodes.len())
    }

    pub fn get_number_of_nodes_on_machine(&self, machine: &MachineName) -> usize {
        self.read(|tables| tables.node_count_on_machine(machine))
    }

    pub fn get_names_of_nodes_on_machine(&self, machine: &MachineName) -> Vec<NodeName> {
        self.read(|tables| {
            tables
                .nodes
                .values()
                .filter(|n| &n.machine == machine)
                .map(|n| n.name.clone())
                .collect()
        })
    }

    /// Refresh a node's liveness timestamp. Not an RPC named in §4.G's
    /// surface, but needed by the UDP status-query path (SPEC_FULL §4.C)
    /// for the heartbeat mechanism recorded as a §9 Open Question
    /// decision.
    pub async fn touch_node(&self, name: &NodeName) -> Result<(), NimoError> {
        let name = name.clone();
        self.mutate(move |tables| {
            let node = tables
                .nodes
                .get_mut(&name)
                .ok_or_else(|| NimoError::not_found(format!("node {name} not found")))?;
            node.last_seen = Instant::now();
            Ok(((), None))
        })
        .await
    }

    // ---------------------------------------------------------------
    // Channel
    // ---------------------------------------------------------------

    pub async fn add_channel(
        &self,
        node: NodeName,
        path: ChannelPath,
        is_output: bool,
        data_type: String,
        transport_pref: TransportPref,
    ) -> Result<(), NimoError> {
        self.mutate(move |tables| {
            if !tables.nodes.contains_key(&node) {
                return Err(NimoError::not_found(format!("node {node} not found")));
            }
            let key = ChannelKey::new(node, path);
            if tables.channels.contains_key(&key) {
                return Err(NimoError::already_exists(format!(
                    "channel {key} already exists"
                )));
            }
            tables.channels.insert(
                key.clone(),
                ChannelRow {
                    key: key.clone(),
                    is_output,
                    data_type,
                    transport_pref,
                    in_use: false,
                    modifiable: true,
                    statistics: ChannelStatistics { bytes: 0, messages: 0 },
                    endpoint: None,
                },
            );
            Ok(((), Some(StatusEvent::ChannelAdded(key))))
        })
        .await
    }

    pub async fn remove_channel(&self, key: &ChannelKey) -> Result<(), NimoError> {
        let key = key.clone();
        self.mutate(move |tables| {
            let row = tables
                .channels
                .get(&key)
                .ok_or_else(|| NimoError::not_found(format!("channel {key} not found")))?;
            // §3 invariant 3: a channel marked in-use cannot be removed.
            if row.in_use {
                return Err(NimoError::channel_in_use(format!(
                    "channel {key} is in use"
                )));
            }
            tables.channels.remove(&key);
            tables
                .connections
                .retain(|_, conn| conn.from != key && conn.to != key);
            Ok(((), Some(StatusEvent::ChannelRemoved(key.clone()))))
        })
        .await
    }

    /// Cascaded removal used by `remove_node`'s internal logic and
    /// available directly for symmetry with `removeChannelsForNode` in
    /// §4.G's command surface. Ignores the in-use guard, matching node
    /// removal's unconditional cascade.
    pub async fn remove_channels_for_node(&self, node: &NodeName) -> Result<usize, NimoError> {
        let node = node.clone();
        self.mutate(move |tables| {
            let keys: Vec<ChannelKey> = tables
                .channels
                .keys()
                .filter(|k| k.node == node)
                .cloned()
                .collect();
            for key in &keys {
                tables.channels.remove(key);
            }
            tables
                .connections
                .retain(|_, conn| !keys.contains(&conn.from) && !keys.contains(&conn.to));
            let count = keys.len();
            Ok((count, None))
        })
        .await
    }

    pub fn is_channel_present(&self, key: &ChannelKey) -> bool {
        self.read(|tables| tables.channels.contains_key(key))
    }

    pub fn get_channel_information(&self, key: &ChannelKey) -> Option<ChannelRow> {
        self.read(|tables| tables.channels.get(key).cloned())
    }

    pub fn get_information_for_all_channels_on_node(&self, node: &NodeName) -> Vec<ChannelRow> {
        self.read(|tables| {
            tables
                .channels
                .values()
                .filter(|c| &c.key.node == node)
                .cloned()
                .collect()
        })
    }

    pub fn get_number_of_input_channels_on_node(&self, node: &NodeName) -> usize {
        self.read(|tables| {
            tables
                .channels
                .values()
                .filter(|c| &c.key.node == node && !c.is_output)
                .count()
        })
    }

    pub fn get_number_of_output_channels_on_node(&self, node: &NodeName) -> usize {
        self.read(|tables| {
            tables
                .channels
                .values()
                .filter(|c| &c.key.node == node && c.is_output)
                .count()
        })
    }

    pub async fn set_channel_in_use(&self, key: &ChannelKey, in_use: bool) -> Result<(), NimoError> {
        let key = key.clone();
        self.mutate(move |tables| {
            let row = tables
                .channels
                .get_mut(&key)
                .ok_or_else(|| NimoError::not_found(format!("channel {key} not found")))?;
            row.in_use = in_use;
            if in_use {
                row.modifiable = false;
            }
            Ok(((), None))
        })
        .await
    }

    /// Atomic test-and-set (§4.G, §8): returns the pre-state and sets
    /// in-use to `true` in the same write-lock acquisition, so two
    /// concurrent callers observe exactly one `false` and one `true`.
    pub async fn get_channel_in_use_and_set(&self, key: &ChannelKey) -> Result<bool, NimoError> {
        let key = key.clone();
        self.mutate(move |tables| {
            let row = tables
                .channels
                .get_mut(&key)
                .ok_or_else(|| NimoError::not_found(format!("channel {key} not found")))?;
            let previous = row.in_use;
            row.in_use = true;
            row.modifiable = false;
            Ok((previous, None))
        })
        .await
    }

    pub async fn clear_channel_in_use(&self, key: &ChannelKey) -> Result<(), NimoError> {
        self.set_channel_in_use(key, false).await
    }

    pub fn get_channel_statistics(&self, key: &ChannelKey) -> Option<ChannelStatistics> {
        self.read(|tables| tables.channels.get(key).map(|c| c.statistics))
    }

    pub async fn update_channel_statistics(
        &self,
        key: &ChannelKey,
        bytes_delta: u64,
    ) -> Result<(), NimoError> {
        let key = key.clone();
        self.mutate(move |tables| {
            let row = tables
                .channels
                .get_mut(&key)
                .ok_or_else(|| NimoError::not_found(format!("channel {key} not found")))?;
            row.statistics.bytes += bytes_delta;
            row.statistics.messages += 1;
            Ok(((), None))
        })
        .await
    }

    // ---------------------------------------------------------------
    // Connection
    // ---------------------------------------------------------------

    pub async fn add_connection(
        &self,
        from: ChannelKey,
        to: ChannelKey,
    ) -> Result<Transport, NimoError> {
        self.mutate(move |tables| {
            let source = tables
                .channels
                .get(&from)
                .ok_or_else(|| NimoError::not_found(format!("channel {from} not found")))?;
            if !source.is_output {
                return Err(NimoError::bad_argument(format!(
                    "{from} is not an output channel"
                )));
            }
            let sink = tables
                .channels
                .get(&to)
                .ok_or_else(|| NimoError::not_found(format!("channel {to} not found")))?;
            if sink.is_output {
                return Err(NimoError::bad_argument(format!(
                    "{to} is not an input channel"
                )));
            }

            // §3 invariant 1: data types must match exactly.
            if source.data_type != sink.data_type {
                return Err(NimoError::bad_argument(format!(
                    "data type mismatch: {} vs {}",
                    source.data_type, sink.data_type
                )));
            }

            let transport = agree_transport(source.transport_pref, sink.transport_pref)
                .ok_or_else(|| {
                    NimoError::transport_mismatch(format!(
                        "no common transport between {from} and {to}"
                    ))
                })?;

            // §3 invariant 2: an input channel cannot be the sink of two
            // live connections (also realized as a channelInUse error
            // when the sink is already in use per §8 scenario 4).
            if tables.connections.contains_key(&to) || sink.in_use {
                return Err(NimoError::channel_in_use(format!(
                    "{to} already has a live connection"
                )));
            }

            tables.connections.insert(
                to.clone(),
                ConnectionRow {
                    from: from.clone(),
                    to: to.clone(),
                    transport,
                    data_type: sink.data_type.clone(),
                },
            );
            if let Some(sink) = tables.channels.get_mut(&to) {
                sink.in_use = true;
                sink.modifiable = false;
            }
            if let Some(source) = tables.channels.get_mut(&from) {
                source.in_use = true;
            }

            Ok((
                transport,
                Some(StatusEvent::ConnectionAdded { from, to }),
            ))
        })
        .await
    }

    /// Removes the connection keyed by either endpoint, matching §4.G's
    /// `removeConnection(fromNode, fromPath) | (toNode, toPath)`.
    pub async fn remove_connection_by_endpoint(&self, endpoint: &ChannelKey) -> Result<(), NimoError> {
        let endpoint = endpoint.clone();
        self.mutate(move |tables| {
            let sink_key = if tables.connections.contains_key(&endpoint) {
                Some(endpoint.clone())
            } else {
                tables
                    .connections
                    .iter()
                    .find(|(_, conn)| conn.from == endpoint)
                    .map(|(to, _)| to.clone())
            };
            let Some(sink_key) = sink_key else {
                return Err(NimoError::not_found(format!(
                    "no connection touching {endpoint}"
                )));
            };
            let conn = tables.connections.remove(&sink_key).expect("checked above");
            if let Some(sink) = tables.channels.get_mut(&conn.to) {
                sink.in_use = false;
            }
            if let Some(source) = tables.channels.get_mut(&conn.from) {
                let still_connected = tables.connections.values().any(|c| c.from == conn.from);
                source.in_use = still_connected;
            }
            Ok((
                (),
                Some(StatusEvent::ConnectionRemoved {
                    from: conn.from,
                    to: conn.to,
                }),
            ))
        })
        .await
    }

    pub fn get_information_for_all_connections(&self) -> Vec<ConnectionRow> {
        self.read(|tables| tables.connections.values().cloned().collect())
    }

    pub fn get_information_for_all_connections_on_node(&self, node: &NodeName) -> Vec<ConnectionRow> {
        self.read(|tables| {
            tables
                .connections
                .values()
                .filter(|c| &c.from.node == node || &c.to.node == node)
                .cloned()
                .collect()
        })
    }

    pub fn get_number_of_connections(&self) -> usize {
        self.read(|tables| tables.connections.len())
    }

    // ---------------------------------------------------------------
    // Application
    // ---------------------------------------------------------------

    /// Replaces the full set of applications a launcher node publishes.
    /// Not itself one of §4.G's query-only Application operations — it's
    /// the write side a launcher context needs to populate the table
    /// that those queries read, mirroring `reloadAppList` (§4.I).
    pub async fn set_applications_for_node(
        &self,
        launcher_node: NodeName,
        apps: Vec<ApplicationRow>,
    ) -> Result<(), NimoError> {
        self.mutate(move |tables| {
            tables
                .applications
                .retain(|(node, _), _| node != &launcher_node);
            for app in apps {
                tables
                    .applications
                    .insert((launcher_node.clone(), app.short_name.clone()), app);
            }
            Ok(((), None))
        })
        .await
    }

    pub fn get_number_of_applications(&self) -> usize {
        self.read(|tables| tables.applications.len())
    }

    pub fn get_names_of_applications_on_node(&self, node: &NodeName) -> Vec<String> {
        self.read(|tables| {
            tables
                .applications
                .keys()
                .filter(|(n, _)| n == node)
                .map(|(_, short_name)| short_name.clone())
                .collect()
        })
    }

    pub fn get_information_for_all_applications_on_node(&self, node: &NodeName) -> Vec<ApplicationRow> {
        self.read(|tables| {
            tables
                .applications
                .iter()
                .filter(|((n, _), _)| n == node)
                .map(|(_, row)| row.clone())
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use nimo_types::ChannelPath;
    use std::net::Ipv4Addr;

    fn registry() -> Registry {
        Registry::new(Arc::new(MemoryStore::new()), None)
    }

    fn endpoint(port: u16) -> Endpoint {
        Endpoint::new(Ipv4Addr::new(10, 0, 0, 1), port)
    }

    #[tokio::test]
    async fn node_remove_cascades_channels_and_connections() {
        let reg = registry();
        reg.add_node(
            "N1".into(),
            "alpha".into(),
            ServiceKind::Filter,
            endpoint(40001),
            None,
        )
        .await
        .unwrap();
        reg.add_channel(
            "N1".into(),
            ChannelPath::parse("/out").unwrap(),
            true,
            "logic data".into(),
            TransportPref::Any,
        )
        .await
        .unwrap();
        reg.remove_node(&"N1".into()).await.unwrap();

        assert!(!reg.is_node_present(&"N1".into()));
        assert!(!reg.is_channel_present(&ChannelKey::new(
            "N1".into(),
            ChannelPath::parse("/out").unwrap()
        )));
    }

    #[tokio::test]
    async fn duplicate_channel_add_reports_already_exists() {
        let reg = registry();
        reg.add_node(
            "N1".into(),
            "alpha".into(),
            ServiceKind::Filter,
            endpoint(40001),
            None,
        )
        .await
        .unwrap();
        let path = ChannelPath::parse("/out").unwrap();
        reg.add_channel(
            "N1".into(),
            path.clone(),
            true,
            "logic data".into(),
            TransportPref::Any,
        )
        .await
        .unwrap();
        let err = reg
            .add_channel("N1".into(), path, true, "logic data".into(), TransportPref::Any)
            .await
            .unwrap_err();
        assert_eq!(err.kind, nimo_types::ErrorKind::AlreadyExists);
        assert_eq!(reg.get_number_of_output_channels_on_node(&"N1".into()), 1);
    }

    #[tokio::test]
    async fn second_connection_to_same_sink_is_channel_in_use() {
        let reg = registry();
        for (node, path, is_output) in
            [("N1", "/out", true), ("N2", "/in", false), ("N3", "/o", true)]
        {
            reg.add_node(
                node.into(),
                "alpha".into(),
                ServiceKind::Filter,
                endpoint(40000),
                None,
            )
            .await
            .unwrap();
            reg.add_channel(
                node.into(),
                ChannelPath::parse(path).unwrap(),
                is_output,
                "logic data".into(),
                TransportPref::Tcp,
            )
            .await
            .unwrap();
        }

        let n1_out = ChannelKey::new("N1".into(), ChannelPath::parse("/out").unwrap());
        let n2_in = ChannelKey::new("N2".into(), ChannelPath::parse("/in").unwrap());
        let n3_out = ChannelKey::new("N3".into(), ChannelPath::parse("/o").unwrap());

        let transport = reg.add_connection(n1_out, n2_in.clone()).await.unwrap();
        assert_eq!(transport, Transport::Tcp);

        let err = reg.add_connection(n3_out, n2_in).await.unwrap_err();
        assert_eq!(err.kind, nimo_types::ErrorKind::ChannelInUse);
    }

    #[tokio::test]
    async fn channel_in_use_and_set_is_atomic() {
        let reg = registry();
        reg.add_node(
            "N1".into(),
            "alpha".into(),
            ServiceKind::Filter,
            endpoint(40001),
            None,
        )
        .await
        .unwrap();
        let key = ChannelKey::new("N1".into(), ChannelPath::parse("/out").unwrap());
        reg.add_channel(
            "N1".into(),
            key.path.clone(),
            true,
            "logic data".into(),
            TransportPref::Any,
        )
        .await
        .unwrap();

        let first = reg.get_channel_in_use_and_set(&key).await.unwrap();
        let second = reg.get_channel_in_use_and_set(&key).await.unwrap();
        assert!(!first);
        assert!(second);
    }
}
