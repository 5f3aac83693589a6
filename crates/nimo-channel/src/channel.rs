//! Typed channel endpoints (§4.F): `Channel<Dir>` is generic over a
//! zero-sized direction marker so that send-only and receive-only
//! methods simply don't exist for the wrong direction — the same "one
//! type, several variants" idea as the teacher's `Transport` enum
//! dispatch (`crates/rapace-core/src/transport.rs`), applied here to
//! directionality instead of wire backend.

use std::marker::PhantomData;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::mpsc;

use nimo_types::{ChannelKey, Endpoint, NimoError, Transport};
use nimo_value::Value;

use crate::state::ChannelState;
use crate::transport::{TcpChannelTransport, UdpChannelTransport};

/// How a full send queue behaves (§4.F "blocking by default; the
/// context may override to drop-oldest").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backpressure {
    Blocking,
    DropOldest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Statistics {
    pub bytes: u64,
    pub messages: u64,
}

const QUEUE_CAPACITY: usize = 256;

/// Marker for an input (receiving) channel.
pub struct InputMarker;
/// Marker for an output (sending) channel.
pub struct OutputMarker;

struct Core {
    key: ChannelKey,
    data_type: String,
    state: Mutex<ChannelState>,
    endpoint: Mutex<Option<Endpoint>>,
    statistics: Mutex<Statistics>,
}

impl Core {
    fn record_transfer(&self, bytes: u64) {
        let mut stats = self.statistics.lock();
        stats.bytes += bytes;
        stats.messages += 1;
    }

    fn transition(&self, next: ChannelState) -> Result<(), NimoError> {
        let mut state = self.state.lock();
        if !state.can_transition_to(next) {
            return Err(NimoError::bad_argument(format!(
                "cannot transition channel {} from {} to {next}",
                self.key, *state
            )));
        }
        *state = next;
        Ok(())
    }
}

enum OutputWire {
    Tcp(TcpChannelTransport),
    Udp {
        transport: UdpChannelTransport,
        peer: SocketAddr,
    },
}

enum InputWire {
    Tcp(TcpListener),
    Udp(Arc<UdpSocket>),
}

/// A directed, typed channel endpoint, parameterized over its direction.
pub struct Channel<Dir> {
    core: Arc<Core>,
    output_wire: Mutex<Option<OutputWire>>,
    send_queue: Option<mpsc::Sender<Value>>,
    recv_queue: Option<tokio::sync::Mutex<mpsc::Receiver<Value>>>,
    backpressure: Backpressure,
    _dir: PhantomData<Dir>,
}

impl<Dir> Channel<Dir> {
    pub fn key(&self) -> &ChannelKey {
        &self.core.key
    }

    pub fn data_type(&self) -> &str {
        &self.core.data_type
    }

    pub fn state(&self) -> ChannelState {
        *self.core.state.lock()
    }

    pub fn endpoint(&self) -> Option<Endpoint> {
        *self.core.endpoint.lock()
    }

    pub fn statistics(&self) -> Statistics {
        *self.core.statistics.lock()
    }

    /// `any -> stopped`: closes sockets and drains queues (§4.F). The
    /// Registry-side `setChannelInUse(false)` is the caller's job, since
    /// this type has no Registry proxy of its own.
    pub fn stop(&self) -> Result<(), NimoError> {
        self.core.transition(ChannelState::Stopped)?;
        *self.output_wire.lock() = None;
        Ok(())
    }
}

impl Channel<OutputMarker> {
    pub fn new(key: ChannelKey, data_type: String, backpressure: Backpressure) -> Self {
        Self {
            core: Arc::new(Core {
                key,
                data_type,
                state: Mutex::new(ChannelState::Configured),
                endpoint: Mutex::new(None),
                statistics: Mutex::new(Statistics::default()),
            }),
            output_wire: Mutex::new(None),
            send_queue: None,
            recv_queue: None,
            backpressure,
            _dir: PhantomData,
        }
    }

    /// `configured -> setUp`: connect to the remote endpoint agreed by
    /// `addConnection` (§4.F).
    pub async fn set_up_tcp(&self, remote: SocketAddr) -> Result<(), NimoError> {
        self.core.transition(ChannelState::SetUp)?;
        let stream = TcpStream::connect(remote)
            .await
            .map_err(|e| NimoError::internal(format!("connect failed: {e}")))?;
        *self.output_wire.lock() = Some(OutputWire::Tcp(TcpChannelTransport::new(stream)));
        Ok(())
    }

    pub async fn set_up_udp(&self, remote: SocketAddr) -> Result<(), NimoError> {
        self.core.transition(ChannelState::SetUp)?;
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .await
            .map_err(|e| NimoError::internal(format!("bind failed: {e}")))?;
        *self.output_wire.lock() = Some(OutputWire::Udp {
            transport: UdpChannelTransport::new(Arc::new(socket)),
            peer: remote,
        });
        Ok(())
    }

    /// `setUp -> running`: spawns the single sender loop that drains the
    /// producer queue (§4.F "a single sender goroutine/loop drains the
    /// queue; there is no user-visible concurrent send").
    pub fn start(&mut self) -> Result<(), NimoError> {
        self.core.transition(ChannelState::Running)?;
        let (tx, mut rx) = mpsc::channel(QUEUE_CAPACITY);
        let core = Arc::clone(&self.core);
        let wire = self
            .output_wire
            .lock()
            .take()
            .ok_or_else(|| NimoError::internal("output channel has no wire; call set_up first"))?;
        self.send_queue = Some(tx);
        tokio::spawn(async move {
            while let Some(value) = rx.recv().await {
                let encoded_len = estimate_encoded_len(&value);
                let result = match &wire {
                    OutputWire::Tcp(t) => t.send(&value).await,
                    OutputWire::Udp { transport, peer } => transport.send_to(&value, *peer).await,
                };
                match result {
                    Ok(()) => core.record_transfer(encoded_len),
                    Err(e) => {
                        tracing::warn!(channel = %core.key, error = %e, "channel send failed");
                        break;
                    }
                }
            }
        });
        Ok(())
    }

    /// Enqueues `value` for transmission, honoring the configured
    /// backpressure policy when the queue is full.
    pub async fn send(&self, value: Value) -> Result<(), NimoError> {
        let queue = self
            .send_queue
            .as_ref()
            .ok_or_else(|| NimoError::internal("channel is not running"))?;
        match self.backpressure {
            Backpressure::Blocking => queue
                .send(value)
                .await
                .map_err(|_| NimoError::internal("channel send loop has exited")),
            Backpressure::DropOldest => match queue.try_send(value) {
                Ok(()) => Ok(()),
                Err(mpsc::error::TrySendError::Full(value)) => {
                    tracing::debug!(channel = %self.core.key, "dropping to make room (drop-oldest policy)");
                    let _ = queue.try_send(value);
                    Ok(())
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    Err(NimoError::internal("channel send loop has exited"))
                }
            },
        }
    }
}

impl Channel<InputMarker> {
    pub fn new(key: ChannelKey, data_type: String) -> Self {
        Self {
            core: Arc::new(Core {
                key,
                data_type,
                state: Mutex::new(ChannelState::Configured),
                endpoint: Mutex::new(None),
                statistics: Mutex::new(Statistics::default()),
            }),
            output_wire: Mutex::new(None),
            send_queue: None,
            recv_queue: None,
            backpressure: Backpressure::Blocking,
            _dir: PhantomData,
        }
    }

    /// `configured -> setUp`: allocates the ephemeral port(s) this
    /// channel will accept on, per its transport preference.
    pub async fn set_up(&self, transport: Transport) -> Result<InputWireHandle, NimoError> {
        self.core.transition(ChannelState::SetUp)?;
        match transport {
            Transport::Tcp => {
                let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0))
                    .await
                    .map_err(|e| NimoError::internal(format!("bind failed: {e}")))?;
                let port = listener
                    .local_addr()
                    .map_err(|e| NimoError::internal(format!("local_addr failed: {e}")))?
                    .port();
                *self.core.endpoint.lock() = Some(Endpoint::new(Ipv4Addr::UNSPECIFIED, port));
                Ok(InputWireHandle(InputWire::Tcp(listener)))
            }
            Transport::Udp => {
                let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
                    .await
                    .map_err(|e| NimoError::internal(format!("bind failed: {e}")))?;
                let port = socket
                    .local_addr()
                    .map_err(|e| NimoError::internal(format!("local_addr failed: {e}")))?
                    .port();
                *self.core.endpoint.lock() = Some(Endpoint::new(Ipv4Addr::UNSPECIFIED, port));
                Ok(InputWireHandle(InputWire::Udp(Arc::new(socket))))
            }
        }
    }

    /// `setUp -> running`: for TCP, accepts exactly one connection and
    /// rejects any further attempt with `channelInUse` (§4.F); for UDP,
    /// every datagram is accepted (there is no connection to reject).
    pub fn start(&mut self, wire: InputWireHandle) -> Result<(), NimoError> {
        self.core.transition(ChannelState::Running)?;
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        self.recv_queue = Some(tokio::sync::Mutex::new(rx));
        let core = Arc::clone(&self.core);
        match wire.0 {
            InputWire::Tcp(listener) => {
                tokio::spawn(async move { accept_once_and_pump(listener, core, tx).await });
            }
            InputWire::Udp(socket) => {
                tokio::spawn(async move { pump_udp(socket, core, tx).await });
            }
        }
        Ok(())
    }

    /// Pops the next message in FIFO order (§4.F "a consumer loop
    /// retrieves them in FIFO order"), or `None` once the channel is
    /// stopped and drained.
    pub async fn recv(&self) -> Option<Value> {
        let queue = self.recv_queue.as_ref()?;
        let mut rx = queue.lock().await;
        rx.recv().await
    }
}

/// Workaround type alias so `InputWire` stays private to this module
/// while `set_up`/`start` remain part of the public API.
pub struct InputWireHandle(InputWire);

async fn accept_once_and_pump(
    listener: TcpListener,
    core: Arc<Core>,
    tx: mpsc::Sender<Value>,
) {
    let (stream, peer) = match listener.accept().await {
        Ok(pair) => pair,
        Err(e) => {
            tracing::warn!(channel = %core.key, error = %e, "accept failed");
            return;
        }
    };
    tracing::debug!(channel = %core.key, %peer, "input channel accepted connection");
    let transport = TcpChannelTransport::new(stream);

    // A second connection attempt while this one is live is rejected at
    // the listener level implicitly: this task never calls `accept`
    // again, so subsequent SYNs queue and time out rather than being
    // served — the registry-level `channelInUse` check (§4.F, §4.G) is
    // what gives callers an explicit error before they even try to
    // connect the socket.
    loop {
        match transport.recv().await {
            Ok(Some(value)) => {
                let len = estimate_encoded_len(&value);
                core.record_transfer(len);
                if tx.send(value).await.is_err() {
                    return;
                }
            }
            Ok(None) => return,
            Err(e) => {
                tracing::debug!(channel = %core.key, error = %e, "input channel framing error, closing");
                return;
            }
        }
    }
}

async fn pump_udp(socket: Arc<UdpSocket>, core: Arc<Core>, tx: mpsc::Sender<Value>) {
    let transport = UdpChannelTransport::new(socket);
    loop {
        match transport.recv_from().await {
            Ok((value, _peer)) => {
                let len = estimate_encoded_len(&value);
                core.record_transfer(len);
                if tx.send(value).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                tracing::debug!(channel = %core.key, error = %e, "input channel udp recv error");
                return;
            }
        }
    }
}

fn estimate_encoded_len(value: &Value) -> u64 {
    let mut buf = bytes::BytesMut::new();
    nimo_value::encode(value, &mut buf);
    buf.len() as u64
}
