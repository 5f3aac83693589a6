//! The Registry proxy (§4.H): one persistent command-port connection,
//! multiplexed by request id. Mirrors the correlation-table pattern
//! implied by §4.C ("correlation by request key") and the teacher's
//! `RpcSession` (`crates/rapace-core`) — a background reader task fans
//! incoming responses out to waiting callers via oneshot channels keyed
//! by request id, while callers never touch the socket directly.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use nimo_proto::{Request, Response};
use nimo_types::{ChannelKey, Endpoint, NimoError, ServiceKind, Transport, TransportPref};
use nimo_value::Value;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Response>>>>;

/// One row of a launcher's application catalogue (§4.I), as pushed to
/// the Registry by `set_applications_for_node`. Kept here rather than
/// borrowed from `nimo-launcher` since that crate depends on this one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherAppEntry {
    pub short_name: String,
    pub description: String,
    pub executable_path: String,
    pub argument_template: Vec<String>,
    pub option_template: Vec<String>,
}

/// Default deadline for a single RPC round trip before it fails with
/// `timeout` (§5 "RPC calls take a deadline").
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

pub struct RegistryClient {
    write_half: tokio::sync::Mutex<tokio::net::tcp::OwnedWriteHalf>,
    pending: PendingMap,
    next_id: AtomicU64,
    reader_task: JoinHandle<()>,
    call_timeout: Duration,
}

impl Drop for RegistryClient {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

impl RegistryClient {
    pub async fn connect(endpoint: Endpoint) -> Result<Self, NimoError> {
        let addr: SocketAddr = endpoint.socket_addr().into();
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| NimoError::internal(format!("connect to Registry failed: {e}")))?;
        let (read_half, write_half) = stream.into_split();

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let reader_pending = Arc::clone(&pending);
        let reader_task = tokio::spawn(async move { read_loop(read_half, reader_pending).await });

        Ok(Self {
            write_half: tokio::sync::Mutex::new(write_half),
            pending,
            next_id: AtomicU64::new(1),
            reader_task,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        })
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// One request/response round trip over the shared connection.
    /// Fails with `timeout` (§5, §7) if no response arrives within
    /// `call_timeout`; the caller must not assume the request wasn't
    /// applied on a timeout.
    pub async fn call(&self, key: &str, args: Vec<Value>) -> Result<Option<Value>, NimoError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        let wire = nimo_message::to_tcp_wire(&Request::new(id, key, args).into_value());
        {
            let mut writer = self.write_half.lock().await;
            writer
                .write_all(&wire)
                .await
                .map_err(|e| NimoError::internal(format!("write failed: {e}")))?;
        }

        let response = match tokio::time::timeout(self.call_timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                self.pending.lock().remove(&id);
                return Err(NimoError::internal("Registry connection closed"));
            }
            Err(_) => {
                self.pending.lock().remove(&id);
                return Err(NimoError::timeout(format!("no response to {key} within deadline")));
            }
        };

        if response.ok {
            Ok(response.payload)
        } else {
            let reason = response.failure_reason.unwrap_or_else(|| "request failed".into());
            Err(NimoError::from_wire_reason(&reason))
        }
    }

    async fn call_unit(&self, key: &str, args: Vec<Value>) -> Result<(), NimoError> {
        self.call(key, args).await.map(|_| ())
    }

    // -- typed wrappers (§4.H) -----------------------------------------

    /// Confirm the Registry is alive and answering, the way the `check`
    /// CLI tool does (§6 scenario 1: exit `0` while running, `2` once
    /// stopped). There's no dedicated liveness key on the wire — a cheap
    /// existing query doubles as the probe, since any successful
    /// round trip proves the connection and the handler loop are both up.
    pub async fn check(&self) -> Result<(), NimoError> {
        self.call_unit("getNumberOfMachines?", vec![]).await
    }

    pub async fn stop(&self) -> Result<(), NimoError> {
        self.call_unit("stop.", vec![]).await
    }

    pub async fn add_machine(&self, name: &str, address: std::net::Ipv4Addr) -> Result<(), NimoError> {
        self.call_unit(
            "addMachine.",
            vec![Value::String(name.into()), Value::Address(address)],
        )
        .await
    }

    pub async fn add_node(
        &self,
        name: &str,
        machine: &str,
        kind: ServiceKind,
        endpoint: Endpoint,
    ) -> Result<(), NimoError> {
        self.call_unit(
            "addNode.",
            vec![
                Value::String(name.into()),
                Value::String(machine.into()),
                Value::String(kind.as_str().into()),
                Value::Address(endpoint.address),
                Value::Integer(endpoint.port as i64),
            ],
        )
        .await
    }

    pub async fn remove_node(&self, name: &str) -> Result<(), NimoError> {
        self.call_unit("removeNode.", vec![Value::String(name.into())]).await
    }

    pub async fn get_names_of_nodes(&self) -> Result<Vec<String>, NimoError> {
        let payload = self.call("getNamesOfNodes?", vec![]).await?;
        Ok(as_string_array(payload))
    }

    pub async fn add_channel(
        &self,
        node: &str,
        path: &str,
        is_output: bool,
        data_type: &str,
        transport: TransportPref,
    ) -> Result<(), NimoError> {
        self.call_unit(
            "addChannel.",
            vec![
                Value::String(node.into()),
                Value::String(path.into()),
                Value::Logical(is_output),
                Value::String(data_type.into()),
                Value::String(transport.as_str().into()),
            ],
        )
        .await
    }

    pub async fn remove_channel(&self, node: &str, path: &str) -> Result<(), NimoError> {
        self.call_unit(
            "removeChannel.",
            vec![Value::String(node.into()), Value::String(path.into())],
        )
        .await
    }

    pub async fn get_number_of_output_channels_on_node(&self, node: &str) -> Result<i64, NimoError> {
        let payload = self
            .call("getNumberOfOutputChannelsOnNode?", vec![Value::String(node.into())])
            .await?;
        as_integer(payload)
    }

    pub async fn add_connection(
        &self,
        from: &ChannelKey,
        to: &ChannelKey,
    ) -> Result<Transport, NimoError> {
        let payload = self
            .call(
                "addConnection.",
                vec![
                    Value::String(from.node.as_str().into()),
                    Value::String(from.path.as_str().into()),
                    Value::String(to.node.as_str().into()),
                    Value::String(to.path.as_str().into()),
                ],
            )
            .await?;
        match payload {
            Some(Value::String(s)) if s == "tcp" => Ok(Transport::Tcp),
            Some(Value::String(s)) if s == "udp" => Ok(Transport::Udp),
            other => Err(NimoError::internal(format!(
                "addConnection returned unexpected payload: {other:?}"
            ))),
        }
    }

    pub async fn remove_connection(&self, endpoint: &ChannelKey) -> Result<(), NimoError> {
        self.call_unit(
            "removeConnection.",
            vec![
                Value::String(endpoint.node.as_str().into()),
                Value::String(endpoint.path.as_str().into()),
            ],
        )
        .await
    }

    pub async fn get_number_of_connections(&self) -> Result<i64, NimoError> {
        let payload = self.call("getNumberOfConnections?", vec![]).await?;
        as_integer(payload)
    }

    pub async fn get_channel_in_use_and_set(&self, node: &str, path: &str) -> Result<bool, NimoError> {
        let payload = self
            .call(
                "getChannelInUseAndSet.",
                vec![Value::String(node.into()), Value::String(path.into())],
            )
            .await?;
        match payload {
            Some(Value::Logical(b)) => Ok(b),
            other => Err(NimoError::internal(format!(
                "getChannelInUseAndSet returned unexpected payload: {other:?}"
            ))),
        }
    }

    /// Pushes the launcher's current application catalogue (§4.I,
    /// `reloadAppList`'s replace semantics): the Registry drops every
    /// prior row for `launcher_node` and inserts these in one write.
    pub async fn set_applications_for_node(
        &self,
        launcher_node: &str,
        apps: &[LauncherAppEntry],
    ) -> Result<(), NimoError> {
        let entries = apps
            .iter()
            .map(|app| {
                Value::Array(vec![
                    Value::String(app.short_name.clone()),
                    Value::String(app.description.clone()),
                    Value::String(app.executable_path.clone()),
                    Value::Array(app.argument_template.iter().map(|s| Value::String(s.clone())).collect()),
                    Value::Array(app.option_template.iter().map(|s| Value::String(s.clone())).collect()),
                ])
            })
            .collect();
        self.call_unit(
            "setApplicationsForNode.",
            vec![Value::String(launcher_node.into()), Value::Array(entries)],
        )
        .await
    }

    pub async fn get_channel_statistics(&self, node: &str, path: &str) -> Result<Option<(u64, u64)>, NimoError> {
        let payload = self
            .call(
                "getChannelStatistics?",
                vec![Value::String(node.into()), Value::String(path.into())],
            )
            .await?;
        let Some(Value::Array(items)) = payload else {
            return Err(NimoError::internal("getChannelStatistics: malformed payload"));
        };
        let mut iter = items.into_iter();
        let found = matches!(iter.next(), Some(Value::Logical(true)));
        if !found {
            return Ok(None);
        }
        let Some(Value::Map(map)) = iter.next() else {
            return Err(NimoError::internal("getChannelStatistics: missing row"));
        };
        let bytes = match map.get(&nimo_value::Key::String("bytes".into())) {
            Some(Value::Integer(n)) => *n as u64,
            _ => 0,
        };
        let messages = match map.get(&nimo_value::Key::String("messages".into())) {
            Some(Value::Integer(n)) => *n as u64,
            _ => 0,
        };
        Ok(Some((bytes, messages)))
    }
}

fn as_string_array(payload: Option<Value>) -> Vec<String> {
    match payload {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn as_integer(payload: Option<Value>) -> Result<i64, NimoError> {
    match payload {
        Some(Value::Integer(n)) => Ok(n),
        other => Err(NimoError::internal(format!(
            "expected an integer payload, got {other:?}"
        ))),
    }
}

async fn read_loop(read_half: tokio::net::tcp::OwnedReadHalf, pending: PendingMap) {
    let mut reader = BufReader::new(read_half);
    let mut accumulator = nimo_message::LineAccumulator::new();
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => return,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(error = %e, "Registry connection read error");
                return;
            }
        }
        let Some(blob) = accumulator.feed_line(line.trim_end_matches(['\n', '\r'])) else {
            continue;
        };
        let value = match nimo_message::from_wire_blob(&blob) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(error = %e, "Registry connection framing error");
                return;
            }
        };
        let response = match Response::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(error = %e, "malformed Registry response");
                continue;
            }
        };
        if let Some(tx) = pending.lock().remove(&response.id) {
            let _ = tx.send(response);
        }
    }
}
