//! The channel setup/start/stop state machine (§4.F).

use std::fmt;

/// `configured -> setUp -> running -> stopped` (terminal), per §4.F.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Configured,
    SetUp,
    Running,
    Stopped,
}

impl ChannelState {
    /// Whether `self -> next` is one of the transitions §4.F names.
    /// `any -> stopped` is always legal, matching "closes sockets,
    /// drains queues" regardless of which state teardown starts from.
    pub fn can_transition_to(self, next: ChannelState) -> bool {
        use ChannelState::*;
        matches!(
            (self, next),
            (Configured, SetUp) | (SetUp, Running) | (_, Stopped)
        )
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChannelState::Configured => "configured",
            ChannelState::SetUp => "setUp",
            ChannelState::Running => "running",
            ChannelState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_transitions() {
        assert!(ChannelState::Configured.can_transition_to(ChannelState::SetUp));
        assert!(ChannelState::SetUp.can_transition_to(ChannelState::Running));
        assert!(ChannelState::Running.can_transition_to(ChannelState::Stopped));
        assert!(!ChannelState::Configured.can_transition_to(ChannelState::Running));
    }
}
