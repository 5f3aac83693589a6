//! The command port: a TCP listener (optionally also reachable via UDP
//! for small status queries) that dispatches requests through a frozen
//! [`HandlerTable`] (§4.C).

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::Semaphore;

use nimo_types::NimoError;
use nimo_value::Value;

use crate::handler::HandlerTable;
use crate::shutdown::ShutdownFlag;
use crate::wire::{Request, Response};

/// How many command handlers may run concurrently. Realizes "a worker
/// from a bounded pool" (§4.C) as a semaphore-gated tokio task spawn
/// rather than a literal OS thread pool.
const DEFAULT_MAX_CONCURRENT_HANDLERS: usize = 64;

pub struct CommandEngine {
    handlers: Arc<HandlerTable>,
    shutdown: ShutdownFlag,
    permits: Arc<Semaphore>,
}

impl CommandEngine {
    pub fn new(handlers: HandlerTable, shutdown: ShutdownFlag) -> Self {
        Self {
            handlers: Arc::new(handlers),
            shutdown,
            permits: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT_HANDLERS)),
        }
    }

    /// Bind the TCP command port and serve until the shutdown flag is
    /// set. Returns the bound local address so the caller can register
    /// it with the Registry.
    pub async fn bind_tcp(&self, addr: SocketAddr) -> std::io::Result<(SocketAddr, TcpListener)> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        Ok((local_addr, listener))
    }

    /// Accept loop for the TCP command port. Runs until `shutdown` is
    /// requested or the listener errors.
    pub async fn serve_tcp(&self, listener: TcpListener) {
        loop {
            if self.shutdown.should_stop() {
                return;
            }
            let (stream, peer) = match listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!(error = %e, "command port accept failed");
                    continue;
                }
            };
            let handlers = Arc::clone(&self.handlers);
            let shutdown = self.shutdown.clone();
            let permits = Arc::clone(&self.permits);
            tokio::spawn(async move {
                if let Err(e) = serve_connection(stream, handlers, shutdown, permits).await {
                    tracing::debug!(peer = %peer, error = %e, "command connection closed");
                }
            });
        }
    }

    /// Serve the UDP command port: one datagram in, one datagram out,
    /// same request/response contract as TCP (§4.C). Takes the socket
    /// behind an `Arc` since each datagram is handled on its own task.
    pub async fn serve_udp(&self, socket: Arc<UdpSocket>) {
        let mut buf = vec![0u8; 65536];
        loop {
            if self.shutdown.should_stop() {
                return;
            }
            let (n, peer) = match socket.recv_from(&mut buf).await {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!(error = %e, "command port udp recv failed");
                    continue;
                }
            };
            let datagram = buf[..n].to_vec();
            let handlers = Arc::clone(&self.handlers);
            let permits = Arc::clone(&self.permits);
            let socket_for_reply = Arc::clone(&socket);
            tokio::spawn(async move {
                let _permit = permits.acquire().await;
                let response = match nimo_message::from_udp_datagram(&datagram) {
                    Ok(value) => dispatch(&handlers, value).await,
                    Err(e) => {
                        tracing::debug!(peer = %peer, error = %e, "malformed udp request, dropping");
                        return;
                    }
                };
                if let Ok(wire) = nimo_message::to_udp_wire(
                    &response,
                    nimo_message::DEFAULT_MAX_UDP_DATAGRAM,
                ) {
                    let _ = socket_for_reply.send_to(&wire, peer).await;
                }
            });
        }
    }
}

async fn dispatch(handlers: &HandlerTable, request_value: Value) -> Value {
    let request = match Request::from_value(request_value) {
        Ok(req) => req,
        Err(e) => return Response::err(0, "?", &e).into_value(),
    };
    let response = match handlers.get(&request.key) {
        Some(handler) => match handler(request.args).await {
            Ok(payload) => Response::ok(request.id, request.key, payload),
            Err(e) => Response::err(request.id, request.key, &e),
        },
        None => Response::unknown_request(request.id, request.key),
    };
    response.into_value()
}

async fn serve_connection(
    stream: TcpStream,
    handlers: Arc<HandlerTable>,
    shutdown: ShutdownFlag,
    permits: Arc<Semaphore>,
) -> Result<(), NimoError> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut accumulator = nimo_message::LineAccumulator::new();
    let mut line = String::new();

    loop {
        if shutdown.should_stop() {
            return Ok(());
        }
        line.clear();
        let n = reader
            .read_line(&mut line)
            .await
            .map_err(|e| NimoError::internal(format!("read failed: {e}")))?;
        if n == 0 {
            return Ok(());
        }
        let Some(blob) = accumulator.feed_line(line.trim_end_matches(['\n', '\r'])) else {
            continue;
        };
        let request_value = match nimo_message::from_wire_blob(&blob) {
            Ok(v) => v,
            Err(_) => {
                // Framing failure: drop the connection, process survives (§7).
                return Ok(());
            }
        };

        let _permit = permits
            .acquire()
            .await
            .map_err(|_| NimoError::internal("handler semaphore closed"))?;
        let response_value = dispatch(&handlers, request_value).await;
        let wire = nimo_message::to_tcp_wire(&response_value);
        write_half
            .write_all(&wire)
            .await
            .map_err(|e| NimoError::internal(format!("write failed: {e}")))?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::HandlerTableBuilder;
    use std::net::{IpAddr, Ipv4Addr};
    use tokio::net::TcpStream as ClientStream;

    #[tokio::test]
    async fn round_trip_over_loopback() {
        let handlers = HandlerTableBuilder::new()
            .on("ping.", |_args| Ok(Some(Value::Logical(true))))
            .build();
        let engine = Arc::new(CommandEngine::new(handlers, ShutdownFlag::new()));

        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0);
        let (local_addr, listener) = engine.bind_tcp(addr).await.unwrap();
        let engine_clone = Arc::clone(&engine);
        tokio::spawn(async move { engine_clone.serve_tcp(listener).await });

        let client = ClientStream::connect(local_addr).await.unwrap();
        let mut reader = BufReader::new(client);
        let resp = crate::client::call(&mut reader, Request::new(1, "ping.", vec![]))
            .await
            .unwrap();
        assert!(resp.ok);
        assert_eq!(resp.payload, Some(Value::Logical(true)));
    }

    #[tokio::test]
    async fn unknown_request_is_reported() {
        let handlers = HandlerTableBuilder::new().build();
        let engine = Arc::new(CommandEngine::new(handlers, ShutdownFlag::new()));
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0);
        let (local_addr, listener) = engine.bind_tcp(addr).await.unwrap();
        let engine_clone = Arc::clone(&engine);
        tokio::spawn(async move { engine_clone.serve_tcp(listener).await });

        let client = ClientStream::connect(local_addr).await.unwrap();
        let mut reader = BufReader::new(client);
        let resp = crate::client::call(&mut reader, Request::new(1, "bogus?", vec![]))
            .await
            .unwrap();
        assert!(!resp.ok);
        assert_eq!(resp.failure_reason.as_deref(), Some("unknown request"));
    }
}
