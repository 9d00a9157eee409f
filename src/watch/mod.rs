// SPDX-License-Identifier: Apache-2.0

//! Deduplicating directory watcher.
//!
//! [`DirWatcher`] owns the OS notification backend and turns its raw
//! notifications into [`Event`]s: one per path, with an [`Op`] bitmask and
//! the [`Op::DIR_CHILD`] flag set for children of a watched directory.
//! Paths are registered through a [`WatchHandle`]; registering the same path
//! twice only issues one OS call.
//!
//! The OS layer sits behind [`WatchBackend`]. [`NotifyBackend`] is the
//! production implementation (inotify, FSEvents, ReadDirectoryChangesW).

mod error;
mod native;
mod op;
mod registry;
mod traits;
mod watcher;

pub use error::WatchError;
pub use native::NotifyBackend;
pub use op::Op;
pub use traits::{RawEvent, WatchBackend};
pub use watcher::{DirWatcher, Event, WatchHandle};
