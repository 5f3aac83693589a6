//! Execution contexts (§4.E): the identity, channel map, and Registry
//! proxy every nImO process constructs once at start-up. The ambient
//! config-file loader (§6) lives here too since every binary needs it.

mod any_channel;
mod config;
mod context;
mod logging;

pub use any_channel::AnyChannel;
pub use config::{AppConfigEntry, LauncherSection, NimoConfig, NodeSection, RegistrySection};
pub use context::{Context, ContextKind};
pub use logging::{init_for_service, init_for_tool};
