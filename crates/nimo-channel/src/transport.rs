//! Data-plane transports (§4.F): TCP (line-split MIME, `$$$`-terminated)
//! and UDP (single datagram), both carrying [`nimo_value::Value`]
//! Messages (§4.B). Modeled on the teacher's split reader/writer
//! `StreamTransport` (`Arc<Inner>` holding a `tokio::sync::Mutex` per
//! half, cloneable handle, explicit `is_closed`), with varint framing
//! swapped for the MIME/sentinel framing this wire format actually uses.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::Mutex as AsyncMutex;

use nimo_types::NimoError;
use nimo_value::Value;

/// A stream-oriented data-plane transport: accumulates MIME lines to the
/// `$$$` sentinel, same parser the command port uses (§4.B "the same
/// parser handles both transports").
#[derive(Clone)]
pub struct TcpChannelTransport {
    inner: Arc<TcpInner>,
}

struct TcpInner {
    reader: AsyncMutex<BufReader<tokio::net::tcp::OwnedReadHalf>>,
    writer: AsyncMutex<tokio::net::tcp::OwnedWriteHalf>,
    closed: AtomicBool,
}

impl TcpChannelTransport {
    pub fn new(stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            inner: Arc::new(TcpInner {
                reader: AsyncMutex::new(BufReader::new(read_half)),
                writer: AsyncMutex::new(write_half),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub async fn send(&self, value: &Value) -> Result<(), NimoError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(NimoError::internal("channel transport is closed"));
        }
        let wire = nimo_message::to_tcp_wire(value);
        let mut writer = self.inner.writer.lock().await;
        writer
            .write_all(&wire)
            .await
            .map_err(|e| NimoError::internal(format!("channel write failed: {e}")))
    }

    /// Reads until the next complete Message, or `Ok(None)` on a clean
    /// EOF (the peer closed the connection, not a framing error).
    pub async fn recv(&self) -> Result<Option<Value>, NimoError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Ok(None);
        }
        let mut reader = self.inner.reader.lock().await;
        let mut accumulator = nimo_message::LineAccumulator::new();
        let mut line = String::new();
        loop {
            line.clear();
            let n = reader
                .read_line(&mut line)
                .await
                .map_err(|e| NimoError::internal(format!("channel read failed: {e}")))?;
            if n == 0 {
                return Ok(None);
            }
            if let Some(blob) = accumulator.feed_line(line.trim_end_matches(['\n', '\r'])) {
                let value = nimo_message::from_wire_blob(&blob)?;
                return Ok(Some(value));
            }
        }
    }

    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

/// A single-datagram transport (§4.B "a single message fits in one
/// datagram; no sentinel is used").
#[derive(Clone)]
pub struct UdpChannelTransport {
    socket: Arc<UdpSocket>,
}

impl UdpChannelTransport {
    pub fn new(socket: Arc<UdpSocket>) -> Self {
        Self { socket }
    }

    pub async fn send_to(&self, value: &Value, target: SocketAddr) -> Result<(), NimoError> {
        let datagram = nimo_message::to_udp_wire(value, nimo_message::DEFAULT_MAX_UDP_DATAGRAM)?;
        self.socket
            .send_to(&datagram, target)
            .await
            .map_err(|e| NimoError::internal(format!("channel udp send failed: {e}")))?;
        Ok(())
    }

    /// Returns the decoded value and the sender's address, so an input
    /// channel can tag each received message (§4.F "tagged with the
    /// sender's IPv4 address and port for UDP").
    pub async fn recv_from(&self) -> Result<(Value, SocketAddr), NimoError> {
        let mut buf = vec![0u8; 65536];
        let (n, peer) = self
            .socket
            .recv_from(&mut buf)
            .await
            .map_err(|e| NimoError::internal(format!("channel udp recv failed: {e}")))?;
        let value = nimo_message::from_udp_datagram(&buf[..n])?;
        Ok((value, peer))
    }
}
