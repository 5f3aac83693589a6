//! Shared identifiers, enums, and error taxonomy used across every nImO
//! crate. Kept dependency-free so it can sit at the bottom of the build
//! graph.

mod endpoint;
mod error;
mod ids;
mod service_kind;
mod transport;

pub use endpoint::Endpoint;
pub use error::{ErrorKind, NimoError, Result};
pub use ids::{ChannelKey, ChannelPath, MachineName, NodeName};
pub use service_kind::ServiceKind;
pub use transport::{agree_transport, Transport, TransportPref};
