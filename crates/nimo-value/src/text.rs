//! Textual rendering of [`Value`], for logs and human interfaces only.
//!
//! Per §4.A: "Textual form ... is not self-delimiting and MUST NOT be
//! used on the wire." There is deliberately no corresponding parser in
//! this crate.

use std::fmt;

use crate::value::{Key, Map, Set, Value};

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Logical(b) => write!(f, "{b}"),
            Key::Integer(v) => write!(f, "{v}"),
            Key::String(s) => write!(f, "{s:?}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Logical(b) => write!(f, "{b}"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Blob(bytes) => {
                write!(f, "blob<{}>[", bytes.len())?;
                for (i, b) in bytes.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{b:02x}")?;
                }
                write!(f, "]")
            }
            Value::Address(addr) => write!(f, "{addr}"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(map) => fmt_map(map, f),
            Value::Set(set) => fmt_set(set, f),
            Value::Invalid(flaw) => match flaw.position {
                Some(pos) => write!(f, "<invalid: {} @ {}>", flaw.description, pos),
                None => write!(f, "<invalid: {}>", flaw.description),
            },
        }
    }
}

fn fmt_map(map: &Map, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{{")?;
    for (i, (k, v)) in map.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{k}: {v}")?;
    }
    write!(f, "}}")
}

fn fmt_set(set: &Set, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{{")?;
    for (i, k) in set.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{k}")?;
    }
    write!(f, "}}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Key, Map};

    #[test]
    fn displays_scalars() {
        assert_eq!(Value::Integer(42).to_string(), "42");
        assert_eq!(Value::Logical(true).to_string(), "true");
        assert_eq!(Value::String("hi".into()).to_string(), "\"hi\"");
    }

    #[test]
    fn displays_map() {
        let mut map = Map::new();
        map.insert(Key::String("a".into()), Value::Integer(1)).unwrap();
        assert_eq!(Value::Map(map).to_string(), "{\"a\": 1}");
    }
}
