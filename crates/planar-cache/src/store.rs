//! Persistent stores for plan snapshots.
//!
//! [`PlanStore`] is the byte-level persistence seam: the planner only
//! ever saves and loads opaque blobs under string keys. [`FsStore`]
//! backs them with files in a directory; [`MemStore`] keeps them in
//! memory for tests.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

/// Byte-level key/value persistence.
pub trait PlanStore {
    /// Persist `bytes` under `key`, replacing any previous value.
    fn save(&self, key: &str, bytes: &[u8]) -> io::Result<()>;

    /// Load the bytes under `key`; `None` if the key was never saved.
    fn load(&self, key: &str) -> io::Result<Option<Vec<u8>>>;
}

impl<S: PlanStore + ?Sized> PlanStore for std::sync::Arc<S> {
    fn save(&self, key: &str, bytes: &[u8]) -> io::Result<()> {
        (**self).save(key, bytes)
    }

    fn load(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        (**self).load(key)
    }
}

/// Directory-backed store: each key is one file under the root.
#[derive(Debug)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Create a store rooted at `root`. The directory is created on the
    /// first save.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl PlanStore for FsStore {
    fn save(&self, key: &str, bytes: &[u8]) -> io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::write(self.root.join(key), bytes)
    }

    fn load(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        match std::fs::read(self.root.join(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// In-memory store for tests.
#[derive(Debug, Default)]
pub struct MemStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl PlanStore for MemStore {
    fn save(&self, key: &str, bytes: &[u8]) -> io::Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn load(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_store_round_trips() {
        let store = MemStore::default();
        assert_eq!(store.load("k").unwrap(), None);
        store.save("k", b"abc").unwrap();
        assert_eq!(store.load("k").unwrap().as_deref(), Some(&b"abc"[..]));
    }

    #[test]
    fn fs_store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path().join("plans"));
        assert_eq!(store.load("k.json").unwrap(), None);
        store.save("k.json", b"{}").unwrap();
        assert_eq!(store.load("k.json").unwrap().as_deref(), Some(&b"{}"[..]));
    }
}
