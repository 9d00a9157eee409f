// SPDX-License-Identifier: Apache-2.0

//! Native file system backend using the `notify` crate.
//!
//! Uses OS-level file system notifications:
//! - Linux: inotify
//! - macOS: FSEvents
//! - Windows: ReadDirectoryChangesW

use std::path::Path;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};

use super::error::WatchError;
use super::traits::{RawEvent, WatchBackend};
use crate::bounded_channel::BoundedSender;

/// Native backend forwarding every notification to the watcher loop.
pub struct NotifyBackend {
    watcher: RecommendedWatcher,
}

impl NotifyBackend {
    /// Create the OS watcher. Notifications are pushed into `raw_tx`,
    /// blocking notify's thread while the loop is behind.
    pub fn new(raw_tx: BoundedSender<RawEvent>) -> Result<Self, WatchError> {
        let watcher = notify::recommended_watcher(move |res: RawEvent| {
            // The loop has exited; nothing left to deliver to.
            let _ = raw_tx.send_blocking(res);
        })
        .map_err(|e| WatchError::Init(e.to_string()))?;

        Ok(Self { watcher })
    }
}

impl WatchBackend for NotifyBackend {
    fn watch(&mut self, path: &Path) -> Result<(), WatchError> {
        self.watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(WatchError::Watch)
    }

    fn unwatch(&mut self, path: &Path) -> Result<(), WatchError> {
        self.watcher.unwatch(path).map_err(WatchError::Watch)
    }

    fn backend_name(&self) -> &'static str {
        #[cfg(target_os = "linux")]
        {
            "inotify"
        }
        #[cfg(target_os = "macos")]
        {
            "FSEvents"
        }
        #[cfg(target_os = "windows")]
        {
            "ReadDirectoryChangesW"
        }
        #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
        {
            "native"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounded_channel::bounded;
    use std::fs::File;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_notify_backend_create() {
        let (tx, _rx) = bounded(16);
        assert!(NotifyBackend::new(tx).is_ok());
    }

    #[test]
    fn test_watch_missing_path_fails() {
        let temp_dir = TempDir::new().unwrap();
        let (tx, _rx) = bounded(16);
        let mut backend = NotifyBackend::new(tx).unwrap();

        let missing = temp_dir.path().join("does-not-exist");
        assert!(backend.watch(&missing).is_err());
    }

    #[tokio::test]
    async fn test_notify_backend_detects_file_create() {
        let temp_dir = TempDir::new().unwrap();
        let (tx, mut rx) = bounded(64);
        let mut backend = NotifyBackend::new(tx).unwrap();
        backend.watch(temp_dir.path()).unwrap();

        File::create(temp_dir.path().join("Journal.01.01.log")).unwrap();

        // FSEvents on macOS can have noticeable latency
        let raw = tokio::time::timeout(Duration::from_secs(2), rx.next())
            .await
            .expect("no notification within timeout")
            .expect("raw channel closed");
        let event = raw.unwrap();
        assert!(event
            .paths
            .iter()
            .any(|p| p.file_name().unwrap() == "Journal.01.01.log"));
    }

    #[test]
    fn test_backend_name() {
        let (tx, _rx) = bounded(16);
        let backend = NotifyBackend::new(tx).unwrap();
        let name = backend.backend_name();
        assert!(!name.is_empty());

        #[cfg(target_os = "linux")]
        assert_eq!(name, "inotify");
    }
}
