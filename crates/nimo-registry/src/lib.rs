//! The nImO Registry (§4.G): authoritative fleet data model, the
//! invariants across it, and the status bus that announces its changes.

mod handlers;
mod registry;
mod statusbus;
mod store;
mod tables;

pub use handlers::build_handlers;
pub use registry::Registry;
pub use statusbus::{Publisher, StatusEvent, DEFAULT_MULTICAST_GROUP, DEFAULT_MULTICAST_PORT};
pub use store::{MemoryStore, RegistryStore};
pub use tables::{
    ApplicationRow, ChannelRow, ChannelStatistics, ConnectionRow, MachineRow, NodeRow, Tables,
};
