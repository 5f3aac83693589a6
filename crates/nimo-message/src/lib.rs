//! Message framing (§4.B): wraps a [`nimo_value::Value`] in
//! start/end-of-message tags and a checksum, then carries it as
//! MIME-base64 over TCP (line-split, `$$$`-terminated) or UDP (single
//! datagram).

mod frame;
mod message;
mod mime;

pub use frame::{unwrap as unwrap_frame, wrap as wrap_frame, FrameError};
pub use message::{
    from_udp_datagram, from_wire_blob, to_tcp_wire, to_udp_wire, DEFAULT_MAX_UDP_DATAGRAM,
};
pub use mime::{decode_blob, encode_tcp, encode_udp, LineAccumulator, MimeDecodeError, SENTINEL};
