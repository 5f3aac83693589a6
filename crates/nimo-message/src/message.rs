//! The high-level `Message` API: wraps [`nimo_value::Value`] encode/decode
//! with framing and MIME transport for both TCP and UDP (§4.B).

use bytes::{Bytes, BytesMut};
use nimo_types::{ErrorKind, NimoError};
use nimo_value::Value;

use crate::frame;
use crate::mime;

/// A datagram larger than this is rejected at send time with
/// `messageTooLarge`, matching "Messages exceeding the MTU are rejected
/// at send time" (§4.B). Conservative default chosen to fit inside a
/// standard Ethernet MTU after IP/UDP headers.
pub const DEFAULT_MAX_UDP_DATAGRAM: usize = 1472;

fn to_framed_bytes(value: &Value) -> Vec<u8> {
    let mut payload = BytesMut::new();
    nimo_value::encode(value, &mut payload);
    frame::wrap(&payload)
}

/// Render `value` as the bytes to write on a TCP command or data
/// connection: MIME lines terminated by the `$$$` sentinel.
pub fn to_tcp_wire(value: &Value) -> Vec<u8> {
    mime::encode_tcp(&to_framed_bytes(value)).into_bytes()
}

/// Render `value` as a single UDP datagram. Fails with
/// `messageTooLarge` if the result would exceed `max_datagram`.
pub fn to_udp_wire(value: &Value, max_datagram: usize) -> Result<Vec<u8>, NimoError> {
    let datagram = mime::encode_udp(&to_framed_bytes(value));
    if datagram.len() > max_datagram {
        return Err(NimoError::message_too_large(format!(
            "encoded message is {} bytes, exceeds limit of {}",
            datagram.len(),
            max_datagram
        )));
    }
    Ok(datagram)
}

/// Parse a base64 blob (already delimited by sentinel or datagram
/// boundary) into a [`Value`].
pub fn from_wire_blob(blob: &str) -> Result<Value, NimoError> {
    let framed = mime::decode_blob(blob)
        .map_err(|e| NimoError::new(ErrorKind::DecodeFailed, e.to_string()))?;
    let payload =
        frame::unwrap(&framed).map_err(|e| NimoError::new(ErrorKind::DecodeFailed, e.to_string()))?;
    let mut bytes = Bytes::from(payload);
    nimo_value::decode(&mut bytes).map_err(|e| NimoError::new(ErrorKind::DecodeFailed, e.to_string()))
}

/// Parse a complete UDP datagram directly.
pub fn from_udp_datagram(datagram: &[u8]) -> Result<Value, NimoError> {
    let text = std::str::from_utf8(datagram)
        .map_err(|e| NimoError::new(ErrorKind::DecodeFailed, e.to_string()))?;
    from_wire_blob(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nimo_value::Value;

    #[test]
    fn tcp_wire_roundtrip_via_accumulator() {
        let msg = Value::Array(vec![
            Value::String("addNode?".into()),
            Value::String("N1".into()),
        ]);
        let wire = to_tcp_wire(&msg);
        let text = String::from_utf8(wire).unwrap();

        let mut acc = crate::mime::LineAccumulator::new();
        let mut blob = None;
        for line in text.lines() {
            if let Some(b) = acc.feed_line(line) {
                blob = Some(b);
                break;
            }
        }
        let decoded = from_wire_blob(&blob.unwrap()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn udp_wire_roundtrip() {
        let msg = Value::Logical(true);
        let datagram = to_udp_wire(&msg, DEFAULT_MAX_UDP_DATAGRAM).unwrap();
        let decoded = from_udp_datagram(&datagram).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn udp_wire_rejects_oversized_message() {
        let msg = Value::Blob(vec![0u8; 4096]);
        let err = to_udp_wire(&msg, DEFAULT_MAX_UDP_DATAGRAM).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MessageTooLarge);
    }
}
