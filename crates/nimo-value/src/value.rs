//! The closed value universe (§4.A).
//!
//! `Value` is a flat tagged union rather than a class hierarchy: the
//! Design Notes (§9 "Polymorphism of values") call for exactly this —
//! no virtual dispatch on the hot path, a flat table for the wire codec.

use std::net::Ipv4Addr;

/// A key usable in a [`Map`] or [`Set`]: logical, integer, or string
/// only, per §4.A ("keys restricted to logical/integer/string").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    Logical(bool),
    Integer(i64),
    String(String),
}

/// Which kind of key a [`Map`] or [`Set`] has committed to. All keys in
/// one container share a kind (§4.A).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    Logical,
    Integer,
    String,
}

impl Key {
    pub fn kind(&self) -> KeyKind {
        match self {
            Key::Logical(_) => KeyKind::Logical,
            Key::Integer(_) => KeyKind::Integer,
            Key::String(_) => KeyKind::String,
        }
    }
}

/// A flaw produced when decoding or validation fails (§4.A `invalid/flaw`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flaw {
    pub description: String,
    pub position: Option<usize>,
}

impl Flaw {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            position: None,
        }
    }

    pub fn at(description: impl Into<String>, position: usize) -> Self {
        Self {
            description: description.into(),
            position: Some(position),
        }
    }
}

/// A map keyed by logical, integer, or string values, all of one kind.
///
/// Backed by a `Vec` of sorted-by-insertion `(Key, Value)` pairs rather
/// than a `BTreeMap` so that the encoder can walk entries in the exact
/// order they were inserted — the binary format doesn't require sorted
/// keys, just a stable element count and concatenation (§4.A).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Map {
    kind: Option<KeyKind>,
    entries: Vec<(Key, Value)>,
}

impl Map {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a key/value pair. Returns an error description if `key`'s
    /// kind doesn't match the kind already committed to by this map.
    pub fn insert(&mut self, key: Key, value: Value) -> Result<Option<Value>, KeyKindMismatch> {
        match self.kind {
            None => self.kind = Some(key.kind()),
            Some(kind) if kind == key.kind() => {}
            Some(kind) => {
                return Err(KeyKindMismatch {
                    expected: kind,
                    found: key.kind(),
                })
            }
        }
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            Ok(Some(std::mem::replace(&mut slot.1, value)))
        } else {
            self.entries.push((key, value));
            Ok(None)
        }
    }

    pub fn get(&self, key: &Key) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn key_kind(&self) -> Option<KeyKind> {
        self.kind
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Key, Value)> {
        self.entries.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyKindMismatch {
    pub expected: KeyKind,
    pub found: KeyKind,
}

/// A set of keys of one kind, same restriction as [`Map`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Set {
    kind: Option<KeyKind>,
    entries: Vec<Key>,
}

impl Set {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: Key) -> Result<bool, KeyKindMismatch> {
        match self.kind {
            None => self.kind = Some(key.kind()),
            Some(kind) if kind == key.kind() => {}
            Some(kind) => {
                return Err(KeyKindMismatch {
                    expected: kind,
                    found: key.kind(),
                })
            }
        }
        if self.entries.contains(&key) {
            Ok(false)
        } else {
            self.entries.push(key);
            Ok(true)
        }
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn key_kind(&self) -> Option<KeyKind> {
        self.kind
    }

    pub fn iter(&self) -> impl Iterator<Item = &Key> {
        self.entries.iter()
    }
}

/// The closed value universe (§4.A).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Logical(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Blob(Vec<u8>),
    Address(Ipv4Addr),
    Array(Vec<Value>),
    Map(Map),
    Set(Set),
    Invalid(Flaw),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Logical(_) => "logical",
            Value::Integer(_) => "integer",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Blob(_) => "blob",
            Value::Address(_) => "address",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
            Value::Invalid(_) => "invalid",
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Value::Invalid(_))
    }

    /// Bit-identical comparison for doubles, structural for everything
    /// else — used by the round-trip tests in §8 ("for doubles,
    /// bit-identical round-trip (NaN bit pattern preserved)").
    pub fn bit_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.bit_eq(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|bv| v.bit_eq(bv)))
            }
            _ => self == other,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Logical(v)
    }
}
impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}
impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}
impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}
impl From<Ipv4Addr> for Value {
    fn from(v: Ipv4Addr) -> Self {
        Value::Address(v)
    }
}
