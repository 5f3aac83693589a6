//! Client-side helpers for one request/response round trip over an
//! already-connected TCP stream (§4.C). Used by the Registry proxy
//! (§4.H), the launcher client, and CLI tools alike.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use nimo_types::NimoError;
use nimo_value::Value;

use crate::wire::{Request, Response};

/// Write `req` to `stream` and wait for the matching response line
/// sequence, terminated by the `$$$` sentinel.
///
/// Per §5 ("requests from one client to one server are processed and
/// replied to in arrival order"), this does not attempt to multiplex
/// several in-flight requests over one connection — that's the proxy's
/// job (§4.H) built on top of this primitive plus the `id` correlation
/// field.
pub async fn call<S>(stream: &mut BufReader<S>, req: Request) -> Result<Response, NimoError>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let wire = nimo_message::to_tcp_wire(&req.into_value());
    stream
        .write_all(&wire)
        .await
        .map_err(|e| NimoError::internal(format!("write failed: {e}")))?;
    stream
        .flush()
        .await
        .map_err(|e| NimoError::internal(format!("flush failed: {e}")))?;

    let mut accumulator = nimo_message::LineAccumulator::new();
    let mut line = String::new();
    loop {
        line.clear();
        let n = stream
            .read_line(&mut line)
            .await
            .map_err(|e| NimoError::internal(format!("read failed: {e}")))?;
        if n == 0 {
            return Err(NimoError::internal("connection closed before sentinel"));
        }
        if let Some(blob) = accumulator.feed_line(line.trim_end_matches(['\n', '\r'])) {
            let value = nimo_message::from_wire_blob(&blob)?;
            return Response::from_value(value);
        }
    }
}

/// Convenience for fire-and-forget style calls that only care about
/// success/failure, discarding the payload.
pub async fn call_simple<S>(
    stream: &mut BufReader<S>,
    id: u64,
    key: &str,
    args: Vec<Value>,
) -> Result<Option<Value>, NimoError>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let resp = call(stream, Request::new(id, key, args)).await?;
    if resp.ok {
        Ok(resp.payload)
    } else {
        let reason = resp.failure_reason.unwrap_or_else(|| "request failed".into());
        Err(NimoError::from_wire_reason(&reason))
    }
}
