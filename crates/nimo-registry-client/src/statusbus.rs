//! The status bus consumer (§4.J): joins the multicast group the
//! Registry publishes on and yields decoded [`StatusEvent`]s as a
//! `tokio_stream`-style async iterator. The bus is a hint, not a source
//! of truth — a subscriber that misses, duplicates, or reorders an event
//! is expected to find out the current state by re-querying the
//! Registry proxy rather than trusting the stream alone.

use std::net::{Ipv4Addr, SocketAddrV4};

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

pub use nimo_registry::StatusEvent;
use nimo_registry::{DEFAULT_MULTICAST_GROUP, DEFAULT_MULTICAST_PORT};

/// One incoming multicast datagram's worth of headroom. Status events are
/// tiny (a kind plus a couple of identifiers), so this is generous.
const RECV_BUFFER: usize = 2048;

/// Depth of the channel feeding the returned stream. Generous enough
/// that a slow consumer doesn't make the background reader block on a
/// best-effort bus.
const STREAM_BUFFER: usize = 64;

pub struct Subscriber {
    socket: UdpSocket,
}

impl Subscriber {
    pub async fn join(group: Ipv4Addr, port: u16) -> std::io::Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port)).await?;
        socket.join_multicast_v4(group, Ipv4Addr::UNSPECIFIED)?;
        Ok(Self { socket })
    }

    pub async fn join_default() -> std::io::Result<Self> {
        Self::join(DEFAULT_MULTICAST_GROUP, DEFAULT_MULTICAST_PORT).await
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddrV4> {
        match self.socket.local_addr()? {
            std::net::SocketAddr::V4(addr) => Ok(addr),
            std::net::SocketAddr::V6(_) => unreachable!("bound to an IPv4 wildcard address"),
        }
    }

    /// Turn this subscription into a stream of decoded events. The
    /// socket is read on a background task; malformed datagrams are
    /// logged and skipped rather than surfaced as an error, and the
    /// stream ends only if the socket itself fails.
    pub fn into_stream(self) -> ReceiverStream<StatusEvent> {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tokio::spawn(async move {
            let mut buf = [0u8; RECV_BUFFER];
            loop {
                let (len, _from) = match self.socket.recv_from(&mut buf).await {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::debug!(error = %e, "status bus socket failed, ending stream");
                        return;
                    }
                };
                let value = match nimo_message::from_udp_datagram(&buf[..len]) {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::debug!(error = %e, "malformed status bus datagram");
                        continue;
                    }
                };
                let event = match StatusEvent::from_value(value) {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::debug!(error = %e, "undecodable status event");
                        continue;
                    }
                };
                if tx.send(event).await.is_err() {
                    return;
                }
            }
        });
        ReceiverStream::new(rx)
    }
}
