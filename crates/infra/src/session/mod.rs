//! Session store adapters

pub mod file;

use std::sync::Arc;

use ecm_core::ports::SessionStore;
use ecm_core::session::MemorySessionStore;
use ecm_domain::{Result, SessionConfig};

pub use file::FileSessionStore;

/// Store for the configured storage path, in memory when none is set
pub fn open_store(config: &SessionConfig) -> Result<Arc<dyn SessionStore>> {
    match &config.storage_path {
        Some(path) => Ok(Arc::new(FileSessionStore::open(path)?)),
        None => Ok(Arc::new(MemorySessionStore::new())),
    }
}
