//! Channel transport preference and agreement (§3 Channel, §4.F).

use std::fmt;

/// A channel's transport preference, or the agreed transport of a live
/// connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportPref {
    Any,
    Tcp,
    Udp,
}

impl TransportPref {
    pub fn as_str(self) -> &'static str {
        match self {
            TransportPref::Any => "any",
            TransportPref::Tcp => "tcp",
            TransportPref::Udp => "udp",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "any" => TransportPref::Any,
            "tcp" => TransportPref::Tcp,
            "udp" => TransportPref::Udp,
            _ => return None,
        })
    }
}

impl fmt::Display for TransportPref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The concrete transport chosen for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Tcp,
    Udp,
}

impl Transport {
    pub fn as_str(self) -> &'static str {
        match self {
            Transport::Tcp => "tcp",
            Transport::Udp => "udp",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Intersect two endpoints' transport preferences per §4.F:
/// "the Registry intersects the two endpoints' preferences. If the
/// intersection is empty, `addConnection` fails with `transportMismatch`.
/// If `any ∩ any`, TCP is chosen; otherwise the non-`any` choice wins."
pub fn agree_transport(a: TransportPref, b: TransportPref) -> Option<Transport> {
    use TransportPref::*;
    match (a, b) {
        (Any, Any) => Some(Transport::Tcp),
        (Any, Tcp) | (Tcp, Any) | (Tcp, Tcp) => Some(Transport::Tcp),
        (Any, Udp) | (Udp, Any) | (Udp, Udp) => Some(Transport::Udp),
        (Tcp, Udp) | (Udp, Tcp) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_any_picks_tcp() {
        assert_eq!(
            agree_transport(TransportPref::Any, TransportPref::Any),
            Some(Transport::Tcp)
        );
    }

    #[test]
    fn non_any_wins() {
        assert_eq!(
            agree_transport(TransportPref::Any, TransportPref::Udp),
            Some(Transport::Udp)
        );
    }

    #[test]
    fn mismatch_is_empty() {
        assert_eq!(agree_transport(TransportPref::Tcp, TransportPref::Udp), None);
    }
}
