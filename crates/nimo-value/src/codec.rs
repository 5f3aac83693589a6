//! Binary encode/decode for [`Value`] (§4.A).
//!
//! The format is tag-prefixed and length-prefixed: one tag byte encodes
//! both the value's kind and a size class for whatever variable-length
//! data follows it, so decoding never has to guess how much to read.
//! Encode/decode are flat functions over `&mut BytesMut` / `Bytes`, not
//! trait methods on `Value` — matching the Design Notes' "this removes
//! virtual dispatch on the hot path and makes the wire codec a flat
//! table" and the teacher's own flat `encode`/`decode` free functions in
//! `src/codec.rs`.
//!
//! Tag layout: the upper nibble selects the kind, the lower nibble
//! selects a size class (meaning depends on kind). Tags `0xA0`, `0xB0`,
//! `0xC0` are reserved for message framing (§4.B) and can never be
//! produced by a value tag, since no value kind occupies upper nibbles
//! `0xA`–`0xF`.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::net::Ipv4Addr;

use crate::value::{Flaw, Key, KeyKind, Map, Set, Value};

/// Reserved outside the kind-tag space; see module docs.
pub const START_OF_MESSAGE: u8 = 0xA0;
pub const END_OF_MESSAGE: u8 = 0xB0;
pub const ESCAPE: u8 = 0xC0;

const KIND_LOGICAL: u8 = 0x0;
const KIND_INTEGER: u8 = 0x1;
const KIND_DOUBLE: u8 = 0x2;
const KIND_STRING: u8 = 0x3;
const KIND_BLOB: u8 = 0x4;
const KIND_ADDRESS: u8 = 0x5;
const KIND_ARRAY: u8 = 0x6;
const KIND_MAP: u8 = 0x7;
const KIND_SET: u8 = 0x8;
const KIND_INVALID: u8 = 0x9;

fn tag(kind: u8, size_class: u8) -> u8 {
    (kind << 4) | (size_class & 0x0F)
}

fn split_tag(byte: u8) -> (u8, u8) {
    (byte >> 4, byte & 0x0F)
}

/// A decode failure: a description and the byte offset it happened at,
/// matching the `Invalid`/`Flaw` value kind's shape (§4.A).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    pub description: String,
    pub position: usize,
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "decode error at {}: {}", self.position, self.description)
    }
}
impl std::error::Error for DecodeError {}

fn err(buf: &Bytes, start_remaining: usize, description: impl Into<String>) -> DecodeError {
    DecodeError {
        description: description.into(),
        position: start_remaining - buf.remaining(),
    }
}

// ---- size classes -----------------------------------------------------

fn len_size_class(n: u64) -> u8 {
    if n <= u8::MAX as u64 {
        0
    } else if n <= u16::MAX as u64 {
        1
    } else if n <= u32::MAX as u64 {
        2
    } else {
        3
    }
}

fn put_sized_len(out: &mut BytesMut, n: u64, class: u8) {
    match class {
        0 => out.put_u8(n as u8),
        1 => out.put_u16(n as u16),
        2 => out.put_u32(n as u32),
        _ => out.put_u64(n),
    }
}

fn get_sized_len(buf: &mut Bytes, class: u8, origin: &Bytes) -> Result<u64, DecodeError> {
    let needed = 1usize << class;
    if buf.remaining() < needed {
        return Err(err(buf, origin.remaining(), "truncated length"));
    }
    Ok(match class {
        0 => buf.get_u8() as u64,
        1 => buf.get_u16() as u64,
        2 => buf.get_u32() as u64,
        _ => buf.get_u64(),
    })
}

fn integer_size_class(v: i64) -> u8 {
    if v >= i8::MIN as i64 && v <= i8::MAX as i64 {
        0
    } else if v >= i16::MIN as i64 && v <= i16::MAX as i64 {
        1
    } else if v >= i32::MIN as i64 && v <= i32::MAX as i64 {
        2
    } else {
        3
    }
}

fn put_integer(out: &mut BytesMut, v: i64, class: u8) {
    match class {
        0 => out.put_i8(v as i8),
        1 => out.put_i16(v as i16),
        2 => out.put_i32(v as i32),
        _ => out.put_i64(v),
    }
}

fn get_integer(buf: &mut Bytes, class: u8, origin: &Bytes) -> Result<i64, DecodeError> {
    let needed = 1usize << class;
    if buf.remaining() < needed {
        return Err(err(buf, origin.remaining(), "truncated integer"));
    }
    Ok(match class {
        0 => buf.get_i8() as i64,
        1 => buf.get_i16() as i64,
        2 => buf.get_i32() as i64,
        _ => buf.get_i64(),
    })
}

fn key_kind_byte(kind: KeyKind) -> u8 {
    match kind {
        KeyKind::Logical => 0,
        KeyKind::Integer => 1,
        KeyKind::String => 2,
    }
}

fn key_kind_from_byte(b: u8) -> Option<KeyKind> {
    match b {
        0 => Some(KeyKind::Logical),
        1 => Some(KeyKind::Integer),
        2 => Some(KeyKind::String),
        _ => None,
    }
}

// ---- encode -------------------------------------------------------------

/// Encode `value` onto the end of `out`.
pub fn encode(value: &Value, out: &mut BytesMut) {
    match value {
        Value::Logical(b) => out.put_u8(tag(KIND_LOGICAL, if *b { 1 } else { 0 })),
        Value::Integer(v) => {
            let class = integer_size_class(*v);
            out.put_u8(tag(KIND_INTEGER, class));
            put_integer(out, *v, class);
        }
        Value::Double(v) => {
            out.put_u8(tag(KIND_DOUBLE, 0));
            out.put_slice(&v.to_bits().to_be_bytes());
        }
        Value::String(s) => {
            let bytes = s.as_bytes();
            let class = len_size_class(bytes.len() as u64);
            out.put_u8(tag(KIND_STRING, class));
            put_sized_len(out, bytes.len() as u64, class);
            out.put_slice(bytes);
        }
        Value::Blob(b) => {
            let class = len_size_class(b.len() as u64);
            out.put_u8(tag(KIND_BLOB, class));
            put_sized_len(out, b.len() as u64, class);
            out.put_slice(b);
        }
        Value::Address(addr) => {
            out.put_u8(tag(KIND_ADDRESS, 0));
            out.put_slice(&addr.octets());
        }
        Value::Array(items) => {
            let class = len_size_class(items.len() as u64);
            out.put_u8(tag(KIND_ARRAY, class));
            put_sized_len(out, items.len() as u64, class);
            for item in items {
                encode(item, out);
            }
        }
        Value::Map(map) => {
            let class = len_size_class(map.len() as u64);
            out.put_u8(tag(KIND_MAP, class));
            out.put_u8(map.key_kind().map(key_kind_byte).unwrap_or(0));
            put_sized_len(out, map.len() as u64, class);
            for (k, v) in map.iter() {
                encode_key(k, out);
                encode(v, out);
            }
        }
        Value::Set(set) => {
            let class = len_size_class(set.len() as u64);
            out.put_u8(tag(KIND_SET, class));
            out.put_u8(set.key_kind().map(key_kind_byte).unwrap_or(0));
            put_sized_len(out, set.len() as u64, class);
            for k in set.iter() {
                encode_key(k, out);
            }
        }
        Value::Invalid(flaw) => {
            out.put_u8(tag(KIND_INVALID, if flaw.position.is_some() { 1 } else { 0 }));
            encode(&Value::String(flaw.description.clone()), out);
            if let Some(pos) = flaw.position {
                encode(&Value::Integer(pos as i64), out);
            }
        }
    }
}

fn encode_key(key: &Key, out: &mut BytesMut) {
    match key {
        Key::Logical(b) => encode(&Value::Logical(*b), out),
        Key::Integer(v) => encode(&Value::Integer(*v), out),
        Key::String(s) => encode(&Value::String(s.clone()), out),
    }
}

/// Convenience: encode into a freshly allocated buffer.
pub fn encode_to_vec(value: &Value) -> Vec<u8> {
    let mut buf = BytesMut::new();
    encode(value, &mut buf);
    buf.to_vec()
}

// ---- decode -------------------------------------------------------------

/// Decode one [`Value`] from the front of `buf`, advancing it past the
/// consumed bytes.
pub fn decode(buf: &mut Bytes) -> Result<Value, DecodeError> {
    let origin = buf.clone();
    if buf.remaining() < 1 {
        return Err(err(buf, origin.remaining(), "empty input"));
    }
    let tag_byte = buf.get_u8();
    let (kind, size_class) = split_tag(tag_byte);
    match kind {
        KIND_LOGICAL => Ok(Value::Logical(size_class != 0)),
        KIND_INTEGER => Ok(Value::Integer(get_integer(buf, size_class, &origin)?)),
        KIND_DOUBLE => {
            if buf.remaining() < 8 {
                return Err(err(buf, origin.remaining(), "truncated double"));
            }
            let mut raw = [0u8; 8];
            buf.copy_to_slice(&mut raw);
            Ok(Value::Double(f64::from_bits(u64::from_be_bytes(raw))))
        }
        KIND_STRING => {
            let len = get_sized_len(buf, size_class, &origin)? as usize;
            if buf.remaining() < len {
                return Err(err(buf, origin.remaining(), "truncated string"));
            }
            let bytes = buf.copy_to_bytes(len);
            String::from_utf8(bytes.to_vec())
                .map(Value::String)
                .map_err(|_| err(buf, origin.remaining(), "invalid utf-8 in string"))
        }
        KIND_BLOB => {
            let len = get_sized_len(buf, size_class, &origin)? as usize;
            if buf.remaining() < len {
                return Err(err(buf, origin.remaining(), "truncated blob"));
            }
            Ok(Value::Blob(buf.copy_to_bytes(len).to_vec()))
        }
        KIND_ADDRESS => {
            if buf.remaining() < 4 {
                return Err(err(buf, origin.remaining(), "truncated address"));
            }
            let mut octets = [0u8; 4];
            buf.copy_to_slice(&mut octets);
            Ok(Value::Address(Ipv4Addr::from(octets)))
        }
        KIND_ARRAY => {
            let count = get_sized_len(buf, size_class, &origin)? as usize;
            let mut items = Vec::with_capacity(count.min(1 << 16));
            for _ in 0..count {
                items.push(decode(buf)?);
            }
            Ok(Value::Array(items))
        }
        KIND_MAP => {
            if buf.remaining() < 1 {
                return Err(err(buf, origin.remaining(), "missing map key kind"));
            }
            let key_kind_b = buf.get_u8();
            let count = get_sized_len(buf, size_class, &origin)? as usize;
            let mut map = Map::new();
            for _ in 0..count {
                let key = decode_key(buf, key_kind_b, &origin)?;
                let value = decode(buf)?;
                map.insert(key, value)
                    .map_err(|_| err(buf, origin.remaining(), "mixed key kinds in map"))?;
            }
            Ok(Value::Map(map))
        }
        KIND_SET => {
            if buf.remaining() < 1 {
                return Err(err(buf, origin.remaining(), "missing set key kind"));
            }
            let key_kind_b = buf.get_u8();
            let count = get_sized_len(buf, size_class, &origin)? as usize;
            let mut set = Set::new();
            for _ in 0..count {
                let key = decode_key(buf, key_kind_b, &origin)?;
                set.insert(key)
                    .map_err(|_| err(buf, origin.remaining(), "mixed key kinds in set"))?;
            }
            Ok(Value::Set(set))
        }
        KIND_INVALID => {
            let description = match decode(buf)? {
                Value::String(s) => s,
                _ => return Err(err(buf, origin.remaining(), "malformed invalid description")),
            };
            let position = if size_class != 0 {
                match decode(buf)? {
                    Value::Integer(n) => Some(n as usize),
                    _ => return Err(err(buf, origin.remaining(), "malformed invalid position")),
                }
            } else {
                None
            };
            Ok(Value::Invalid(Flaw {
                description,
                position,
            }))
        }
        _ => Err(err(buf, origin.remaining(), format!("unknown tag {tag_byte:#04x}"))),
    }
}

fn decode_key(buf: &mut Bytes, key_kind_b: u8, origin: &Bytes) -> Result<Key, DecodeError> {
    let kind =
        key_kind_from_byte(key_kind_b).ok_or_else(|| err(buf, origin.remaining(), "bad key kind"))?;
    match decode(buf)? {
        Value::Logical(b) if kind == KeyKind::Logical => Ok(Key::Logical(b)),
        Value::Integer(v) if kind == KeyKind::Integer => Ok(Key::Integer(v)),
        Value::String(s) if kind == KeyKind::String => Ok(Key::String(s)),
        _ => Err(err(buf, origin.remaining(), "key kind mismatch")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Key, Map, Set};

    fn roundtrip(v: Value) {
        let encoded = encode_to_vec(&v);
        let mut bytes = Bytes::from(encoded);
        let decoded = decode(&mut bytes).expect("decode");
        assert!(v.bit_eq(&decoded), "{v:?} != {decoded:?}");
        assert!(bytes.is_empty(), "leftover bytes after decode");
    }

    #[test]
    fn roundtrip_scalars() {
        roundtrip(Value::Logical(true));
        roundtrip(Value::Logical(false));
        roundtrip(Value::Integer(0));
        roundtrip(Value::Integer(-1));
        roundtrip(Value::Integer(i64::MIN));
        roundtrip(Value::Integer(i64::MAX));
        roundtrip(Value::Double(0.0));
        roundtrip(Value::Double(-0.0));
        roundtrip(Value::Double(f64::NAN));
        roundtrip(Value::Double(f64::INFINITY));
        roundtrip(Value::String(String::new()));
        roundtrip(Value::String("hello, nImO".into()));
        roundtrip(Value::Blob(vec![]));
        roundtrip(Value::Blob((0u8..=255).collect()));
        roundtrip(Value::Address(Ipv4Addr::new(10, 0, 0, 1)));
    }

    #[test]
    fn nan_bit_pattern_preserved() {
        let quiet_nan = f64::from_bits(0x7ff8_0000_0000_0001);
        let encoded = encode_to_vec(&Value::Double(quiet_nan));
        let mut bytes = Bytes::from(encoded);
        let decoded = decode(&mut bytes).unwrap();
        match decoded {
            Value::Double(d) => assert_eq!(d.to_bits(), quiet_nan.to_bits()),
            _ => panic!("wrong kind"),
        }
    }

    #[test]
    fn roundtrip_array_and_containers() {
        roundtrip(Value::Array(vec![
            Value::Integer(1),
            Value::Logical(true),
            Value::String("x".into()),
        ]));

        let mut map = Map::new();
        map.insert(Key::String("a".into()), Value::Integer(1)).unwrap();
        map.insert(Key::String("b".into()), Value::Integer(2)).unwrap();
        roundtrip(Value::Map(map));

        let mut set = Set::new();
        set.insert(Key::Integer(1)).unwrap();
        set.insert(Key::Integer(2)).unwrap();
        roundtrip(Value::Set(set));
    }

    #[test]
    fn roundtrip_invalid() {
        roundtrip(Value::Invalid(Flaw::new("bad thing")));
        roundtrip(Value::Invalid(Flaw::at("bad thing", 42)));
    }

    #[test]
    fn decode_rejects_truncated_input() {
        let mut bytes = Bytes::from(vec![tag(KIND_INTEGER, 3)]);
        assert!(decode(&mut bytes).is_err());
    }

    #[test]
    fn decode_rejects_unknown_tag() {
        let mut bytes = Bytes::from(vec![0xFF]);
        assert!(decode(&mut bytes).is_err());
    }

    #[test]
    fn large_string_uses_wider_size_class() {
        let big = "x".repeat(70_000);
        roundtrip(Value::String(big));
    }
}
