//! The command/response engine (§4.C): request/response wire shapes, a
//! frozen handler table, and the TCP/UDP command port that dispatches
//! through it.

mod client;
mod engine;
mod handler;
mod shutdown;
mod wire;

pub use client::{call, call_simple};
pub use engine::CommandEngine;
pub use handler::{HandlerFn, HandlerFuture, HandlerTable, HandlerTableBuilder};
pub use shutdown::ShutdownFlag;
pub use wire::{Request, Response};
