//! The channel layer (§4.F): typed endpoints, the `configured -> setUp
//! -> running -> stopped` state machine, TCP/UDP data-plane transports,
//! and per-channel send/receive queues.

mod channel;
mod state;
mod transport;

pub use channel::{
    Backpressure, Channel, InputMarker, InputWireHandle, OutputMarker, Statistics,
};
pub use state::ChannelState;
pub use transport::{TcpChannelTransport, UdpChannelTransport};
