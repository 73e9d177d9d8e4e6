//! Token storage
//!
//! Two scopes hold the authentication token: a persistent one that survives
//! restarts and a session-scoped one that does not. [`TokenStore`] is the only
//! place that decides which scope a token lives in.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// String key/value storage, shaped after the browser `Storage` interface.
///
/// Operations never fail from the caller's point of view. Backends that can
/// fail log the problem and carry on.
pub trait Storage: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str);
    fn remove_item(&self, key: &str);
}

/// In-process storage, gone when the process exits
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }

    fn remove_item(&self, key: &str) {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

/// Storage backed by a JSON object on disk
///
/// Every write rewrites the whole file. A missing or unreadable file reads as
/// empty.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> HashMap<String, String> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %self.path.display(), "Ignoring unreadable storage file: {e}");
                HashMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                warn!(path = %self.path.display(), "Failed to read storage file: {e}");
                HashMap::new()
            }
        }
    }

    fn save(&self, items: &HashMap<String, String>) {
        let result = (|| -> std::io::Result<()> {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let content = serde_json::to_string_pretty(items)?;
            std::fs::write(&self.path, content)
        })();

        if let Err(e) = result {
            warn!(path = %self.path.display(), "Failed to write storage file: {e}");
        }
    }

    fn update(&self, f: impl FnOnce(&mut HashMap<String, String>) -> bool) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut items = self.load();
        if f(&mut items) {
            self.save(&items);
        }
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.load().remove(key)
    }

    fn set_item(&self, key: &str, value: &str) {
        self.update(|items| {
            items.insert(key.to_string(), value.to_string());
            true
        });
    }

    fn remove_item(&self, key: &str) {
        self.update(|items| items.remove(key).is_some());
    }
}

/// Storage key names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    pub token: String,
    pub validation_token: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            token: "token".to_string(),
            validation_token: "validationToken".to_string(),
        }
    }
}

/// Decides where the authentication token lives
#[derive(Clone)]
pub struct TokenStore {
    persistent: Arc<dyn Storage>,
    session: Arc<dyn Storage>,
    keys: StorageKeys,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

impl TokenStore {
    pub fn new(
        persistent: Arc<dyn Storage>,
        session: Arc<dyn Storage>,
        keys: StorageKeys,
    ) -> Self {
        Self {
            persistent,
            session,
            keys,
        }
    }

    /// Store with both scopes in memory
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(MemoryStorage::new()),
            StorageKeys::default(),
        )
    }

    pub fn persistent(&self) -> &dyn Storage {
        self.persistent.as_ref()
    }

    pub fn session(&self) -> &dyn Storage {
        self.session.as_ref()
    }

    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    /// Store `token` in exactly one scope, removing any copy from the other
    pub fn set_token(&self, token: &str, persist: bool) {
        let (target, other) = if persist {
            (&self.persistent, &self.session)
        } else {
            (&self.session, &self.persistent)
        };
        target.set_item(&self.keys.token, token);
        other.remove_item(&self.keys.token);
        debug!(persist, "Stored authentication token");
    }

    /// Session scope first, then persistent. Empty values count as absent.
    pub fn get_token(&self) -> Option<String> {
        self.session
            .get_item(&self.keys.token)
            .filter(|t| !t.is_empty())
            .or_else(|| {
                self.persistent
                    .get_item(&self.keys.token)
                    .filter(|t| !t.is_empty())
            })
    }

    /// Clear the token from both scopes
    pub fn remove_token(&self) {
        self.session.remove_item(&self.keys.token);
        self.persistent.remove_item(&self.keys.token);
        debug!("Removed authentication token");
    }

    pub fn get_validation_token(&self) -> Option<String> {
        self.persistent
            .get_item(&self.keys.validation_token)
            .filter(|t| !t.is_empty())
    }

    pub fn set_validation_token(&self, token: &str) {
        self.persistent.set_item(&self.keys.validation_token, token);
    }

    pub fn remove_validation_token(&self) {
        self.persistent.remove_item(&self.keys.validation_token);
    }
}
