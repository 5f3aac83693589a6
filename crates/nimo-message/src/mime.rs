//! MIME-base64 transport over TCP (line-split, `$$$`-terminated) and UDP
//! (single datagram), sharing one parser (§4.B).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// The literal sentinel that terminates a TCP message.
pub const SENTINEL: &str = "$$$";

/// MIME lines are wrapped at this width, the conventional RFC 2045 line
/// length.
const LINE_WIDTH: usize = 76;

/// Base64-encode `framed` bytes and split into `LINE_WIDTH`-wide lines,
/// each terminated by `\n`.
pub fn encode_lines(framed: &[u8]) -> String {
    let b64 = STANDARD.encode(framed);
    let mut out = String::with_capacity(b64.len() + b64.len() / LINE_WIDTH + 1);
    for chunk in b64.as_bytes().chunks(LINE_WIDTH) {
        out.push_str(std::str::from_utf8(chunk).expect("base64 output is ascii"));
        out.push('\n');
    }
    out
}

/// Encode `framed` bytes for transmission over a TCP command or data
/// connection: MIME lines followed by the `$$$` sentinel on its own
/// line.
pub fn encode_tcp(framed: &[u8]) -> String {
    let mut out = encode_lines(framed);
    out.push_str(SENTINEL);
    out.push('\n');
    out
}

/// Encode `framed` bytes for transmission as a single UDP datagram: MIME
/// text with no sentinel, since the datagram boundary delimits the
/// message.
pub fn encode_udp(framed: &[u8]) -> Vec<u8> {
    STANDARD.encode(framed).into_bytes()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeDecodeError(pub String);

impl std::fmt::Display for MimeDecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MIME decode error: {}", self.0)
    }
}
impl std::error::Error for MimeDecodeError {}

/// Decode a blob of concatenated base64 lines (whitespace-tolerant) back
/// into the framed bytes. Used by both transports once their respective
/// delimiter (sentinel line, or datagram boundary) has been stripped.
pub fn decode_blob(text: &str) -> Result<Vec<u8>, MimeDecodeError> {
    let mut cleaned = String::with_capacity(text.len());
    for ch in text.chars() {
        if !ch.is_whitespace() {
            cleaned.push(ch);
        }
    }
    STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| MimeDecodeError(e.to_string()))
}

/// Accumulates TCP lines until the `$$$` sentinel is seen, then hands
/// back the concatenated base64 blob for [`decode_blob`].
#[derive(Debug, Default)]
pub struct LineAccumulator {
    blob: String,
}

impl LineAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line (without its trailing newline). Returns the
    /// accumulated base64 blob once the sentinel line is seen, resetting
    /// internal state for the next message.
    pub fn feed_line(&mut self, line: &str) -> Option<String> {
        if line.trim_end() == SENTINEL {
            Some(std::mem::take(&mut self.blob))
        } else {
            self.blob.push_str(line.trim());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tcp_roundtrip_through_accumulator() {
        let framed = b"the quick brown fox jumps over the lazy dog, a classic pangram used for testing".to_vec();
        let encoded = encode_tcp(&framed);

        let mut acc = LineAccumulator::new();
        let mut blob = None;
        for line in encoded.lines() {
            if let Some(b) = acc.feed_line(line) {
                blob = Some(b);
                break;
            }
        }
        let blob = blob.expect("sentinel reached");
        assert_eq!(decode_blob(&blob).unwrap(), framed);
    }

    #[test]
    fn udp_roundtrip_single_datagram() {
        let framed = b"tiny".to_vec();
        let datagram = encode_udp(&framed);
        let text = String::from_utf8(datagram).unwrap();
        assert_eq!(decode_blob(&text).unwrap(), framed);
    }
}
