//! File-backed session store
//!
//! Persistent-scope entries are kept in a JSON object on disk and survive
//! restarts. Session-scope entries live in memory for the process lifetime,
//! matching a browser tab's session storage.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use ecm_core::ports::SessionStore;
use ecm_core::session::MemorySessionStore;
use ecm_domain::{EcmError, Result, StorageScope};
use parking_lot::Mutex;
use tracing::{debug, warn};

/// Session store backed by a JSON file for the persistent scope
pub struct FileSessionStore {
    path: PathBuf,
    persistent: Mutex<BTreeMap<String, String>>,
    session: MemorySessionStore,
}

impl FileSessionStore {
    /// Open the store at `path`, loading existing persistent entries
    ///
    /// A missing file starts empty. A file that is not a JSON object of
    /// strings is rejected rather than overwritten.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let persistent = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents).map_err(|err| {
                EcmError::Storage(format!("corrupt session file {}: {err}", path.display()))
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                return Err(EcmError::Storage(format!(
                    "failed to read session file {}: {err}",
                    path.display()
                )))
            }
        };

        debug!(path = %path.display(), entries = persistent.len(), "opened session store");
        Ok(Self { path, persistent: Mutex::new(persistent), session: MemorySessionStore::new() })
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the persistent entries through a temp file and rename
    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| {
                EcmError::Storage(format!("failed to create {}: {err}", parent.display()))
            })?;
        }

        let contents = serde_json::to_string_pretty(entries)?;
        let staging = self.path.with_extension("tmp");
        fs::write(&staging, contents)
            .and_then(|()| fs::rename(&staging, &self.path))
            .map_err(|err| {
                warn!(path = %self.path.display(), error = %err, "failed to persist session store");
                EcmError::Storage(format!("failed to write {}: {err}", self.path.display()))
            })
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, scope: StorageScope, key: &str) -> Result<Option<String>> {
        match scope {
            StorageScope::Session => self.session.get(scope, key),
            StorageScope::Persistent => Ok(self.persistent.lock().get(key).cloned()),
        }
    }

    fn set(&self, scope: StorageScope, key: &str, value: &str) -> Result<()> {
        match scope {
            StorageScope::Session => self.session.set(scope, key, value),
            StorageScope::Persistent => {
                let mut entries = self.persistent.lock();
                entries.insert(key.to_string(), value.to_string());
                self.flush(&entries)
            }
        }
    }

    fn remove(&self, scope: StorageScope, key: &str) -> Result<()> {
        match scope {
            StorageScope::Session => self.session.remove(scope, key),
            StorageScope::Persistent => {
                let mut entries = self.persistent.lock();
                if entries.remove(key).is_none() {
                    return Ok(());
                }
                self.flush(&entries)
            }
        }
    }
}
