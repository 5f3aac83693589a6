//! Escaping, checksum, and start/end-of-message framing (§4.B).
//!
//! A frame is `START_OF_MESSAGE || escape(payload) || escape(checksum) ||
//! END_OF_MESSAGE`. Escaping inverts the high bit of any byte that
//! collides with `START_OF_MESSAGE`, `END_OF_MESSAGE`, or `ESCAPE`, and
//! prefixes it with an escape byte, so the parser never has to guess
//! where the envelope ends.

use nimo_value::{END_OF_MESSAGE, ESCAPE, START_OF_MESSAGE};

/// Checksum over the unescaped payload: a wrapping byte sum, matching
/// the "trailing one-byte checksum" described in §4.B. There is no
/// cryptographic requirement on this value — it only needs to catch
/// accidental corruption in transit.
fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

fn needs_escape(byte: u8) -> bool {
    byte == START_OF_MESSAGE || byte == END_OF_MESSAGE || byte == ESCAPE
}

fn push_escaped(out: &mut Vec<u8>, byte: u8) {
    if needs_escape(byte) {
        out.push(ESCAPE);
        out.push(byte ^ 0x80);
    } else {
        out.push(byte);
    }
}

/// Wrap `payload` (the encoded [`nimo_value::Value`] bytes) into a
/// framed, escaped, checksummed Message.
pub fn wrap(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 4);
    out.push(START_OF_MESSAGE);
    for &b in payload {
        push_escaped(&mut out, b);
    }
    push_escaped(&mut out, checksum(payload));
    out.push(END_OF_MESSAGE);
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    MissingStart,
    MissingEnd,
    TruncatedEscape,
    ChecksumMismatch,
    Empty,
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameError::MissingStart => write!(f, "frame missing start-of-message byte"),
            FrameError::MissingEnd => write!(f, "frame missing end-of-message byte"),
            FrameError::TruncatedEscape => write!(f, "frame ends mid-escape-sequence"),
            FrameError::ChecksumMismatch => write!(f, "frame checksum does not match payload"),
            FrameError::Empty => write!(f, "frame is empty"),
        }
    }
}
impl std::error::Error for FrameError {}

/// Unwrap a framed byte sequence, verifying the checksum, and return the
/// inner payload bytes (the encoded `Value`).
pub fn unwrap(framed: &[u8]) -> Result<Vec<u8>, FrameError> {
    if framed.is_empty() {
        return Err(FrameError::Empty);
    }
    if framed[0] != START_OF_MESSAGE {
        return Err(FrameError::MissingStart);
    }
    if framed[framed.len() - 1] != END_OF_MESSAGE {
        return Err(FrameError::MissingEnd);
    }
    let mut unescaped = Vec::with_capacity(framed.len());
    let mut i = 1;
    let body_end = framed.len() - 1;
    while i < body_end {
        let b = framed[i];
        if b == ESCAPE {
            i += 1;
            if i >= body_end {
                return Err(FrameError::TruncatedEscape);
            }
            unescaped.push(framed[i] ^ 0x80);
        } else {
            unescaped.push(b);
        }
        i += 1;
    }
    if unescaped.is_empty() {
        return Err(FrameError::Empty);
    }
    let (payload, checksum_byte) = unescaped.split_at(unescaped.len() - 1);
    if checksum(payload) != checksum_byte[0] {
        return Err(FrameError::ChecksumMismatch);
    }
    Ok(payload.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_plain_payload() {
        let payload = b"hello world".to_vec();
        let framed = wrap(&payload);
        assert_eq!(unwrap(&framed).unwrap(), payload);
    }

    #[test]
    fn roundtrip_payload_containing_reserved_bytes() {
        let payload = vec![START_OF_MESSAGE, END_OF_MESSAGE, ESCAPE, 0x00, 0xFF];
        let framed = wrap(&payload);
        // no unescaped reserved byte may appear in the body
        for &b in &framed[1..framed.len() - 1] {
            if b == START_OF_MESSAGE || b == END_OF_MESSAGE {
                panic!("unescaped reserved byte leaked into frame body");
            }
        }
        assert_eq!(unwrap(&framed).unwrap(), payload);
    }

    #[test]
    fn every_byte_value_escapes_losslessly() {
        let payload: Vec<u8> = (0u16..=255).map(|b| b as u8).collect();
        let framed = wrap(&payload);
        assert_eq!(unwrap(&framed).unwrap(), payload);
    }

    #[test]
    fn rejects_bad_checksum() {
        let payload = b"abc".to_vec();
        let mut framed = wrap(&payload);
        let last = framed.len() - 2;
        framed[last] ^= 0xFF;
        assert_eq!(unwrap(&framed), Err(FrameError::ChecksumMismatch));
    }

    #[test]
    fn rejects_missing_terminators() {
        assert_eq!(unwrap(&[]), Err(FrameError::Empty));
        assert_eq!(unwrap(&[0x00, END_OF_MESSAGE]), Err(FrameError::MissingStart));
        assert_eq!(unwrap(&[START_OF_MESSAGE, 0x00]), Err(FrameError::MissingEnd));
    }
}
