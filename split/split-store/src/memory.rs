//! In-memory object store double.

use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use hashbrown::HashMap;

use crate::error::{StoreError, StoreResult};
use crate::store::{content_type_for, ObjectStat, ObjectStore};

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    modified: SystemTime,
    content_type: String,
}

/// Hashmap-backed store for tests and local runs.
///
/// Pre-signed URLs use a `memory://` scheme and exist only so callers can
/// exercise the presign path.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, StoredObject>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    ///
    /// # Panics
    ///
    /// Panics if the interior lock is poisoned.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn len(&self) -> usize {
        self.objects.lock().expect("store lock").len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn locked(&self) -> StoreResult<std::sync::MutexGuard<'_, HashMap<String, StoredObject>>> {
        self.objects
            .lock()
            .map_err(|_| StoreError::Io(std::io::Error::other("store lock poisoned")))
    }
}

impl ObjectStore for MemoryStore {
    fn put(&self, key: &str, bytes: &[u8]) -> StoreResult<()> {
        if key.is_empty() {
            return Err(StoreError::invalid_key(key));
        }
        self.locked()?.insert(
            key.to_string(),
            StoredObject {
                bytes: bytes.to_vec(),
                modified: SystemTime::now(),
                content_type: content_type_for(key).to_string(),
            },
        );
        Ok(())
    }

    fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        self.locked()?
            .get(key)
            .map(|o| o.bytes.clone())
            .ok_or_else(|| StoreError::not_found(key))
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.locked()?.contains_key(key))
    }

    fn presign_get(&self, key: &str, ttl: Duration) -> StoreResult<String> {
        if !self.exists(key)? {
            return Err(StoreError::not_found(key));
        }
        Ok(format!("memory://{key}?expires={}", ttl.as_secs()))
    }

    fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut keys: Vec<String> = self
            .locked()?
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort_unstable();
        Ok(keys)
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.locked()?.remove(key);
        Ok(())
    }

    fn delete_prefix(&self, prefix: &str) -> StoreResult<usize> {
        let mut objects = self.locked()?;
        let before = objects.len();
        objects.retain(|k, _| !k.starts_with(prefix));
        Ok(before - objects.len())
    }

    fn stat(&self, key: &str) -> StoreResult<ObjectStat> {
        self.locked()?
            .get(key)
            .map(|o| ObjectStat {
                size: o.bytes.len() as u64,
                last_modified: o.modified,
                content_type: o.content_type.clone(),
            })
            .ok_or_else(|| StoreError::not_found(key))
    }

    fn expire_older_than(&self, age: Duration) -> StoreResult<usize> {
        let cutoff = SystemTime::now()
            .checked_sub(age)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let mut objects = self.locked()?;
        let before = objects.len();
        objects.retain(|_, o| o.modified > cutoff);
        Ok(before - objects.len())
    }
}
