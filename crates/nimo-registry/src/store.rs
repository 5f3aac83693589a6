//! The durable-store abstraction (§1, §4.G, §6): "a durable key-value
//! table is assumed; its schema is specified, its storage engine is
//! not." `RegistryStore` is the seam a future on-disk backend would
//! implement; the only shipped implementation keeps `Tables` in memory.

use parking_lot::RwLock;

use crate::tables::Tables;

pub trait RegistryStore: Send + Sync {
    fn tables(&self) -> &RwLock<Tables>;
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RegistryStore for MemoryStore {
    fn tables(&self) -> &RwLock<Tables> {
        &self.tables
    }
}
