//! `Context` (§4.E): one per process, constructed at start-up, owning
//! identity, the channel map, and (when applicable) a Registry proxy.
//! A single struct parameterized by [`ContextKind`] rather than one
//! struct per kind — the differences between kinds are data (does it
//! hold channels? does it register a Node?), not behavior.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use nimo_proto::ShutdownFlag;
use nimo_registry_client::RegistryClient;
use nimo_types::{ChannelKey, ChannelPath, Endpoint, MachineName, NimoError, NodeName, ServiceKind};

use crate::any_channel::AnyChannel;

/// Which of the seven process roles in §4.E this context plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKind {
    Utility,
    Miscellaneous,
    Filter,
    Source,
    Sink,
    Service,
    Launcher,
    Registry,
}

impl ContextKind {
    pub fn registers_as_node(self) -> bool {
        !matches!(self, ContextKind::Utility | ContextKind::Miscellaneous)
    }

    pub fn holds_channels(self) -> bool {
        matches!(
            self,
            ContextKind::Filter | ContextKind::Source | ContextKind::Sink | ContextKind::Service
        )
    }

    pub fn service_kind(self) -> Option<ServiceKind> {
        Some(match self {
            ContextKind::Utility | ContextKind::Miscellaneous => return None,
            ContextKind::Filter => ServiceKind::Filter,
            ContextKind::Source => ServiceKind::Source,
            ContextKind::Sink => ServiceKind::Sink,
            ContextKind::Service => ServiceKind::Utility,
            ContextKind::Launcher => ServiceKind::Launcher,
            ContextKind::Registry => ServiceKind::Registry,
        })
    }

    /// `(maxIn, maxOut)`; `None` means unlimited. §4.E's table fixes
    /// which directions a kind may hold at all; within that, a context
    /// has no declared cap by default (`addChannel` only ever fails
    /// with `limitExceeded` for a kind that explicitly declares one —
    /// none do today, so this is future-facing policy, not dead code).
    pub fn channel_limits(self) -> (Option<usize>, Option<usize>) {
        match self {
            ContextKind::Source => (Some(0), None),
            ContextKind::Sink => (None, Some(0)),
            ContextKind::Filter | ContextKind::Service => (None, None),
            ContextKind::Utility
            | ContextKind::Miscellaneous
            | ContextKind::Launcher
            | ContextKind::Registry => (Some(0), Some(0)),
        }
    }
}

/// Everything a process owns by virtue of being part of the fabric:
/// identity, command port shutdown flag, Registry proxy, channel map.
pub struct Context {
    kind: ContextKind,
    tag: String,
    machine: MachineName,
    node_name: RwLock<Option<NodeName>>,
    registry: Option<Arc<RegistryClient>>,
    shutdown: ShutdownFlag,
    channels: RwLock<HashMap<ChannelPath, AnyChannel>>,
}

impl Context {
    pub fn new(kind: ContextKind, tag: impl Into<String>, machine: MachineName) -> Self {
        Self {
            kind,
            tag: tag.into(),
            machine,
            node_name: RwLock::new(None),
            registry: None,
            shutdown: ShutdownFlag::new(),
            channels: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_registry(mut self, client: Arc<RegistryClient>) -> Self {
        self.registry = Some(client);
        self
    }

    pub fn kind(&self) -> ContextKind {
        self.kind
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn machine(&self) -> &MachineName {
        &self.machine
    }

    pub fn node_name(&self) -> Option<NodeName> {
        self.node_name.read().clone()
    }

    pub fn registry(&self) -> Option<&Arc<RegistryClient>> {
        self.registry.as_ref()
    }

    pub fn shutdown_flag(&self) -> ShutdownFlag {
        self.shutdown.clone()
    }

    /// Registers this process as a Node (§4.E: every kind except
    /// `utility`/`miscellaneous` does this at start-up) and remembers
    /// its own name for later channel-key construction.
    pub async fn register_node(&self, name: NodeName, command_endpoint: Endpoint) -> Result<(), NimoError> {
        if !self.kind.registers_as_node() {
            return Err(NimoError::bad_argument(format!(
                "{:?} contexts do not register as a Node",
                self.kind
            )));
        }
        let service_kind = self
            .kind
            .service_kind()
            .expect("registers_as_node implies a ServiceKind exists");
        let registry = self
            .registry
            .as_ref()
            .ok_or_else(|| NimoError::internal("context has no Registry proxy"))?;
        registry
            .add_node(name.as_str(), self.machine.as_str(), service_kind, command_endpoint)
            .await?;
        *self.node_name.write() = Some(name);
        Ok(())
    }

    /// Inserts a channel into the local map, enforcing the kind's
    /// declared limits (§4.E "exceeding declared limits causes
    /// `addChannel` to fail with `limitExceeded`").
    pub fn insert_channel(&self, path: ChannelPath, channel: AnyChannel) -> Result<(), NimoError> {
        if !self.kind.holds_channels() {
            return Err(NimoError::bad_argument(format!(
                "{:?} contexts do not hold channels",
                self.kind
            )));
        }
        let (max_in, max_out) = self.kind.channel_limits();
        let mut channels = self.channels.write();
        let (current_in, current_out) = channels.values().fold((0usize, 0usize), |(i, o), c| {
            if c.is_output() {
                (i, o + 1)
            } else {
                (i + 1, o)
            }
        });
        if channel.is_output() {
            if max_out.is_some_and(|limit| current_out >= limit) {
                return Err(NimoError::limit_exceeded("output channel limit reached"));
            }
        } else if max_in.is_some_and(|limit| current_in >= limit) {
            return Err(NimoError::limit_exceeded("input channel limit reached"));
        }
        if channels.contains_key(&path) {
            return Err(NimoError::already_exists(format!("channel {path} already exists")));
        }
        channels.insert(path, channel);
        Ok(())
    }

    pub fn remove_channel(&self, path: &ChannelPath) -> Option<AnyChannel> {
        self.channels.write().remove(path)
    }

    pub fn channel_key(&self, path: ChannelPath) -> Option<ChannelKey> {
        self.node_name().map(|node| ChannelKey::new(node, path))
    }

    pub fn channel_paths(&self) -> Vec<ChannelPath> {
        self.channels.read().keys().cloned().collect()
    }

    pub fn with_channel<R>(&self, path: &ChannelPath, f: impl FnOnce(&AnyChannel) -> R) -> Option<R> {
        self.channels.read().get(path).map(f)
    }

    /// Stops every channel and marks the process as shutting down.
    /// Registry de-registration (`removeNode`) is the caller's
    /// responsibility, since only the caller knows whether this is a
    /// clean exit or a crash being handled by a supervisor.
    pub fn stop_all_channels(&self) {
        for channel in self.channels.read().values() {
            if let Err(e) = channel.stop() {
                tracing::warn!(error = %e, "channel stop failed during context shutdown");
            }
        }
    }
}
