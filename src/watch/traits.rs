// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use super::error::WatchError;

/// A raw notification as delivered by the OS layer.
pub type RawEvent = Result<notify::Event, notify::Error>;

/// The OS notification facility behind [`DirWatcher`](super::DirWatcher).
///
/// Backends deliver raw notifications through the sender handed to the
/// connect function passed to [`DirWatcher::run`](super::DirWatcher::run).
/// They do not deduplicate registrations; the watcher does that.
pub trait WatchBackend: Send {
    /// Start watching `path` (non-recursively).
    fn watch(&mut self, path: &Path) -> Result<(), WatchError>;

    /// Stop watching `path`.
    fn unwatch(&mut self, path: &Path) -> Result<(), WatchError>;

    /// Name of the backend for logging.
    fn backend_name(&self) -> &'static str;
}
