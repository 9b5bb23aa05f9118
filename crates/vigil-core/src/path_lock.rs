//! # Per-Path Locking
//!
//! Serializes the backup → fix → verify window for a given file so two hook
//! invocations on the same path cannot interleave writes. Entries are
//! reference counted and removed when the last guard drops, keeping the
//! registry bounded.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

struct LockEntry {
    mutex: Arc<Mutex<()>>,
    refs: usize,
}

/// Process-wide registry of per-path exclusive locks.
#[derive(Clone, Default)]
pub struct PathLockRegistry {
    locks: Arc<DashMap<PathBuf, LockEntry>>,
}

impl PathLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the exclusive lock for `path`, waiting if another invocation
    /// holds it.
    pub async fn lock(&self, path: &Path) -> PathLockGuard {
        let mutex = {
            let mut entry = self
                .locks
                .entry(path.to_path_buf())
                .or_insert_with(|| LockEntry {
                    mutex: Arc::new(Mutex::new(())),
                    refs: 0,
                });
            entry.refs += 1;
            entry.mutex.clone()
        };

        let guard = mutex.lock_owned().await;
        PathLockGuard {
            locks: self.locks.clone(),
            path: path.to_path_buf(),
            _guard: Some(guard),
        }
    }

    /// Number of paths currently tracked (held or awaited).
    pub fn active_paths(&self) -> usize {
        self.locks.len()
    }
}

/// Held lock for one path; releasing it decrements the entry refcount and
/// frees the slot when nobody else is waiting.
pub struct PathLockGuard {
    locks: Arc<DashMap<PathBuf, LockEntry>>,
    path: PathBuf,
    _guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for PathLockGuard {
    fn drop(&mut self) {
        self._guard.take();
        let mut remove = false;
        if let Some(mut entry) = self.locks.get_mut(&self.path) {
            entry.refs = entry.refs.saturating_sub(1);
            remove = entry.refs == 0;
        }
        if remove {
            self.locks.remove_if(&self.path, |_, entry| entry.refs == 0);
        }
    }
}
