//! The Registry proxy and status bus consumer (§4.H, §4.J): everything a
//! node needs to talk to a Registry it didn't start itself, found via
//! `nimo-discovery` and driven over one multiplexed command connection.

mod client;
mod statusbus;

pub use client::{LauncherAppEntry, RegistryClient};
pub use statusbus::{StatusEvent, Subscriber};
