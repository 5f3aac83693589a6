//! The status bus (§4.G "Status bus", §4.J): a best-effort fan-out of
//! model-change events over a well-known multicast UDP group, framed the
//! same way as every other Message (§4.B). Subscribers live in
//! `nimo-registry-client`; this module only publishes.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;

use tokio::net::UdpSocket;

use nimo_types::{ChannelKey, ChannelPath, MachineName, NimoError, NodeName};
use nimo_value::Value;

/// One of the eight event kinds enumerated in §4.G. Carries just enough
/// identity for a subscriber to know what to re-query over the RPC
/// surface — the bus is a hint, not a source of truth (§4.J).
#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    MachineAdded(MachineName),
    MachineRemoved(MachineName),
    NodeAdded(NodeName),
    NodeRemoved(NodeName),
    ChannelAdded(ChannelKey),
    ChannelRemoved(ChannelKey),
    ConnectionAdded { from: ChannelKey, to: ChannelKey },
    ConnectionRemoved { from: ChannelKey, to: ChannelKey },
}

impl StatusEvent {
    fn wire_key(&self) -> &'static str {
        match self {
            StatusEvent::MachineAdded(_) => "machineAdded",
            StatusEvent::MachineRemoved(_) => "machineRemoved",
            StatusEvent::NodeAdded(_) => "nodeAdded",
            StatusEvent::NodeRemoved(_) => "nodeRemoved",
            StatusEvent::ChannelAdded(_) => "channelAdded",
            StatusEvent::ChannelRemoved(_) => "channelRemoved",
            StatusEvent::ConnectionAdded { .. } => "connectionAdded",
            StatusEvent::ConnectionRemoved { .. } => "connectionRemoved",
        }
    }

    /// Render as the `[kind, ...identity]` array carried in the
    /// multicast Message.
    pub fn into_value(self) -> Value {
        let key = self.wire_key();
        let mut items = vec![Value::String(key.into())];
        match self {
            StatusEvent::MachineAdded(m) | StatusEvent::MachineRemoved(m) => {
                items.push(Value::String(m.as_str().to_owned()));
            }
            StatusEvent::NodeAdded(n) | StatusEvent::NodeRemoved(n) => {
                items.push(Value::String(n.as_str().to_owned()));
            }
            StatusEvent::ChannelAdded(c) | StatusEvent::ChannelRemoved(c) => {
                items.push(Value::String(c.node.as_str().to_owned()));
                items.push(Value::String(c.path.as_str().to_owned()));
            }
            StatusEvent::ConnectionAdded { from, to } | StatusEvent::ConnectionRemoved { from, to } => {
                items.push(Value::String(from.node.as_str().to_owned()));
                items.push(Value::String(from.path.as_str().to_owned()));
                items.push(Value::String(to.node.as_str().to_owned()));
                items.push(Value::String(to.path.as_str().to_owned()));
            }
        }
        Value::Array(items)
    }

    /// Reconstruct from the `[kind, ...identity]` array a subscriber
    /// reads off the multicast socket. Malformed datagrams (truncated,
    /// wrong arity, unknown kind) are rejected with `decodeFailed` —
    /// the bus is best-effort, so a subscriber just drops these (§4.J).
    pub fn from_value(value: Value) -> Result<Self, NimoError> {
        let Value::Array(items) = value else {
            return Err(NimoError::decode_failed("status event must be an array"));
        };
        let mut iter = items.into_iter();
        let key = match iter.next() {
            Some(Value::String(s)) => s,
            _ => return Err(NimoError::decode_failed("status event missing kind")),
        };
        let mut next_string = || match iter.next() {
            Some(Value::String(s)) => Ok(s),
            _ => Err(NimoError::decode_failed("status event missing field")),
        };
        let event = match key.as_str() {
            "machineAdded" => StatusEvent::MachineAdded(MachineName::new(next_string()?)),
            "machineRemoved" => StatusEvent::MachineRemoved(MachineName::new(next_string()?)),
            "nodeAdded" => StatusEvent::NodeAdded(NodeName::new(next_string()?)),
            "nodeRemoved" => StatusEvent::NodeRemoved(NodeName::new(next_string()?)),
            "channelAdded" | "channelRemoved" => {
                let node = NodeName::new(next_string()?);
                let path = ChannelPath::parse(next_string()?)?;
                let key_val = ChannelKey::new(node, path);
                if key == "channelAdded" {
                    StatusEvent::ChannelAdded(key_val)
                } else {
                    StatusEvent::ChannelRemoved(key_val)
                }
            }
            "connectionAdded" | "connectionRemoved" => {
                let from = ChannelKey::new(NodeName::new(next_string()?), ChannelPath::parse(next_string()?)?);
                let to = ChannelKey::new(NodeName::new(next_string()?), ChannelPath::parse(next_string()?)?);
                if key == "connectionAdded" {
                    StatusEvent::ConnectionAdded { from, to }
                } else {
                    StatusEvent::ConnectionRemoved { from, to }
                }
            }
            other => {
                return Err(NimoError::decode_failed(format!(
                    "unknown status event kind {other:?}"
                )))
            }
        };
        Ok(event)
    }
}

/// The default multicast group and port for the status bus (§6: "a
/// well-known multicast group and port (configurable)"). Chosen from the
/// administratively-scoped 239.x range; overridable via configuration.
pub const DEFAULT_MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 17, 10, 1);
pub const DEFAULT_MULTICAST_PORT: u16 = 9031;

/// Sends [`StatusEvent`]s to the multicast group. Built once at Registry
/// startup and invoked from inside the same write-lock critical section
/// that produced the change, so a single mutation's event always reaches
/// the wire before the next mutation's (§4.G).
pub struct Publisher {
    socket: Arc<UdpSocket>,
    target: SocketAddrV4,
}

impl Publisher {
    pub async fn bind(group: Ipv4Addr, port: u16) -> std::io::Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.set_multicast_ttl_v4(1)?;
        Ok(Self {
            socket: Arc::new(socket),
            target: SocketAddrV4::new(group, port),
        })
    }

    /// Best-effort send; publication failures are logged, never
    /// propagated to the caller of the Registry operation that produced
    /// the event (the bus is a hint, §4.J).
    pub async fn publish(&self, event: StatusEvent) {
        let value = event.into_value();
        match nimo_message::to_udp_wire(&value, nimo_message::DEFAULT_MAX_UDP_DATAGRAM) {
            Ok(wire) => {
                if let Err(e) = self.socket.send_to(&wire, self.target).await {
                    tracing::warn!(error = %e, "status bus publish failed");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "status event too large to publish");
            }
        }
    }
}
