//! The `ServiceKind` enum (§3 Node, §4.E Execution contexts).

use std::fmt;

/// What kind of node a process registers itself as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    Filter,
    Source,
    Sink,
    Utility,
    Launcher,
    Registry,
    Miscellaneous,
}

impl ServiceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceKind::Filter => "filter",
            ServiceKind::Source => "source",
            ServiceKind::Sink => "sink",
            ServiceKind::Utility => "utility",
            ServiceKind::Launcher => "launcher",
            ServiceKind::Registry => "registry",
            ServiceKind::Miscellaneous => "miscellaneous",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "filter" => ServiceKind::Filter,
            "source" => ServiceKind::Source,
            "sink" => ServiceKind::Sink,
            "utility" => ServiceKind::Utility,
            "launcher" => ServiceKind::Launcher,
            "registry" => ServiceKind::Registry,
            "miscellaneous" => ServiceKind::Miscellaneous,
            _ => return None,
        })
    }

    /// Whether this kind participates in the data plane at all (§4.E).
    pub fn holds_channels(self) -> bool {
        matches!(
            self,
            ServiceKind::Filter | ServiceKind::Source | ServiceKind::Sink
        )
    }

    /// Whether this kind registers itself as a Node (§4.E table).
    pub fn registers_as_node(self) -> bool {
        !matches!(self, ServiceKind::Utility | ServiceKind::Miscellaneous)
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
