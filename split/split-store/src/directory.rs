//! Filesystem-backed object store.

use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::store::{content_type_for, ObjectStat, ObjectStore};

/// Object store rooted at a local directory.
///
/// Keys map one-to-one onto relative file paths under the root; parent
/// directories are created on demand. Suitable for single-node deployments
/// and local development.
#[derive(Debug)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Open (and create if needed) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the root cannot be created.
    pub fn new(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Root directory of this store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to a path, rejecting escapes from the root.
    fn resolve(&self, key: &str) -> StoreResult<PathBuf> {
        if key.is_empty() {
            return Err(StoreError::invalid_key(key));
        }
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(StoreError::invalid_key(key));
        }
        Ok(self.root.join(relative))
    }

    fn walk(&self, dir: &Path, keys: &mut Vec<String>) -> StoreResult<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                self.walk(&path, keys)?;
            } else if let Ok(relative) = path.strip_prefix(&self.root) {
                keys.push(relative.to_string_lossy().replace('\\', "/"));
            }
        }
        Ok(())
    }
}

impl ObjectStore for DirectoryStore {
    fn put(&self, key: &str, bytes: &[u8]) -> StoreResult<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, bytes)?;
        debug!(key, bytes = bytes.len(), "object stored");
        Ok(())
    }

    fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        let path = self.resolve(key)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::not_found(key))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.resolve(key)?.is_file())
    }

    fn presign_get(&self, key: &str, ttl: Duration) -> StoreResult<String> {
        let path = self.resolve(key)?;
        if !path.is_file() {
            return Err(StoreError::not_found(key));
        }
        Ok(format!(
            "file://{}?expires={}",
            path.display(),
            ttl.as_secs()
        ))
    }

    fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut keys = Vec::new();
        if self.root.is_dir() {
            self.walk(&self.root.clone(), &mut keys)?;
        }
        keys.retain(|k| k.starts_with(prefix));
        keys.sort_unstable();
        Ok(keys)
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        let path = self.resolve(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn delete_prefix(&self, prefix: &str) -> StoreResult<usize> {
        let keys = self.list(prefix)?;
        for key in &keys {
            self.delete(key)?;
        }
        Ok(keys.len())
    }

    fn stat(&self, key: &str) -> StoreResult<ObjectStat> {
        let path = self.resolve(key)?;
        let metadata = match std::fs::metadata(&path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::not_found(key));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(ObjectStat {
            size: metadata.len(),
            last_modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            content_type: content_type_for(key).to_string(),
        })
    }

    fn expire_older_than(&self, age: Duration) -> StoreResult<usize> {
        let cutoff = SystemTime::now()
            .checked_sub(age)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let mut removed = 0;
        for key in self.list("")? {
            let stat = match self.stat(&key) {
                Ok(stat) => stat,
                Err(StoreError::NotFound { .. }) => continue,
                Err(e) => return Err(e),
            };
            if stat.last_modified <= cutoff {
                self.delete(&key)?;
                removed += 1;
            }
        }
        debug!(removed, "expired objects reclaimed");
        Ok(removed)
    }
}
