use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use thiserror::Error;

#[derive(Debug, Error)]
#[error("a run for '{0}' is already in progress")]
pub struct DirectoryBusy(pub PathBuf);

/// Registry of directories that currently have a download running.
///
/// Clones share the same registry.
#[derive(Debug, Clone, Default)]
pub struct DirectoryLocks(Arc<Mutex<HashSet<PathBuf>>>);

impl DirectoryLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `dir` as busy until the returned guard is dropped.
    pub fn try_acquire(&self, dir: &Path) -> Result<DirectoryGuard, DirectoryBusy> {
        let key = Self::key(dir);
        let mut busy = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !busy.insert(key.clone()) {
            return Err(DirectoryBusy(key));
        }
        tracing::trace!("acquired lock for {}", key.display());
        Ok(DirectoryGuard {
            locks: self.clone(),
            key,
        })
    }

    pub fn is_busy(&self, dir: &Path) -> bool {
        let key = Self::key(dir);
        let busy = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        busy.contains(&key)
    }

    fn key(dir: &Path) -> PathBuf {
        // the directory might not exist yet, so canonicalize is not an option
        std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf())
    }
}

#[derive(Debug)]
pub struct DirectoryGuard {
    locks: DirectoryLocks,
    key: PathBuf,
}

impl DirectoryGuard {
    pub fn path(&self) -> &Path {
        &self.key
    }
}

impl Drop for DirectoryGuard {
    fn drop(&mut self) {
        let mut busy = self
            .locks
            .0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        busy.remove(&self.key);
        tracing::trace!("released lock for {}", self.key.display());
    }
}
