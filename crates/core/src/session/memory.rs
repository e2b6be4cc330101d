//! In-memory session store

use std::collections::HashMap;

use ecm_domain::{Result, StorageScope};
use parking_lot::RwLock;

use crate::ports::SessionStore;

/// Session store keeping both scopes in memory
///
/// Persistent-scope values live only as long as the process; use a
/// file-backed store when they must survive restarts.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: RwLock<HashMap<(StorageScope, String), String>>,
}

impl MemorySessionStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every session-scoped entry
    pub fn clear_scope(&self, scope: StorageScope) {
        self.entries.write().retain(|(entry_scope, _), _| *entry_scope != scope);
    }

    /// Entries across both scopes
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether neither scope holds an entry
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, scope: StorageScope, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(&(scope, key.to_string())).cloned())
    }

    fn set(&self, scope: StorageScope, key: &str, value: &str) -> Result<()> {
        self.entries.write().insert((scope, key.to_string()), value.to_string());
        Ok(())
    }

    fn remove(&self, scope: StorageScope, key: &str) -> Result<()> {
        self.entries.write().remove(&(scope, key.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes_are_independent() {
        let store = MemorySessionStore::new();
        store.set(StorageScope::Session, "k", "session").unwrap();
        store.set(StorageScope::Persistent, "k", "persistent").unwrap();

        assert_eq!(store.get(StorageScope::Session, "k").unwrap().as_deref(), Some("session"));
        store.clear_scope(StorageScope::Session);
        assert_eq!(store.get(StorageScope::Session, "k").unwrap(), None);
        assert_eq!(
            store.get(StorageScope::Persistent, "k").unwrap().as_deref(),
            Some("persistent")
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let store = MemorySessionStore::new();
        store.remove(StorageScope::Session, "missing").unwrap();
        assert!(store.is_empty());
    }
}
