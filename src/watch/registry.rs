// SPDX-License-Identifier: Apache-2.0

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use super::op::Op;

/// Set of canonical paths currently under observation.
///
/// Shared between [`WatchHandle`](super::WatchHandle) clones and the watcher
/// loop. The lock is never held across an OS call.
#[derive(Debug, Clone, Default)]
pub(crate) struct Registry {
    paths: Arc<Mutex<HashSet<PathBuf>>>,
}

impl Registry {
    fn lock(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        match self.paths.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub(crate) fn contains(&self, path: &Path) -> bool {
        self.lock().contains(path)
    }

    /// Insert `path`, returning false if it was already present.
    pub(crate) fn reserve(&self, path: &Path) -> bool {
        self.lock().insert(path.to_path_buf())
    }

    /// Remove `path`, returning false if it was absent.
    pub(crate) fn release(&self, path: &Path) -> bool {
        self.lock().remove(path)
    }

    /// [`Op::DIR_CHILD`] when `path` itself is not registered but its parent
    /// is, empty otherwise.
    pub(crate) fn classify(&self, path: &Path) -> Op {
        let paths = self.lock();
        if paths.contains(path) {
            return Op::empty();
        }
        match path.parent() {
            Some(parent) if paths.contains(parent) => Op::DIR_CHILD,
            _ => Op::empty(),
        }
    }

    pub(crate) fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.lock().iter().cloned().collect();
        paths.sort();
        paths
    }
}
