//! A context's channel map holds channels of both directions side by
//! side under one key space, so it needs a direction-erased wrapper
//! around `nimo_channel::Channel<Dir>` — the generic type itself stays
//! direction-safe; only the map's storage needs an enum.

use nimo_channel::{Channel, InputMarker, OutputMarker};
use nimo_types::{ChannelKey, NimoError};

pub enum AnyChannel {
    Input(Channel<InputMarker>),
    Output(Channel<OutputMarker>),
}

impl AnyChannel {
    pub fn key(&self) -> &ChannelKey {
        match self {
            AnyChannel::Input(c) => c.key(),
            AnyChannel::Output(c) => c.key(),
        }
    }

    pub fn is_output(&self) -> bool {
        matches!(self, AnyChannel::Output(_))
    }

    pub fn as_input(&self) -> Option<&Channel<InputMarker>> {
        match self {
            AnyChannel::Input(c) => Some(c),
            AnyChannel::Output(_) => None,
        }
    }

    pub fn as_output(&self) -> Option<&Channel<OutputMarker>> {
        match self {
            AnyChannel::Output(c) => Some(c),
            AnyChannel::Input(_) => None,
        }
    }

    pub fn stop(&self) -> Result<(), NimoError> {
        match self {
            AnyChannel::Input(c) => c.stop(),
            AnyChannel::Output(c) => c.stop(),
        }
    }
}
