// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use crate::bounded_channel::SendError;

/// Error type for directory watcher operations
#[derive(Debug)]
pub enum WatchError {
    /// Failed to initialize the OS notification backend
    Init(String),
    /// The OS refused to add or remove a watch
    Watch(notify::Error),
    /// Path could not be made absolute
    Io(std::io::Error),
    /// The watcher loop is no longer running
    Closed,
    /// Shutdown fired while the request was pending
    Shutdown,
}

impl fmt::Display for WatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchError::Init(msg) => write!(f, "watcher initialization failed: {}", msg),
            WatchError::Watch(e) => write!(f, "watch failed: {}", e),
            WatchError::Io(e) => write!(f, "IO error: {}", e),
            WatchError::Closed => write!(f, "watcher loop closed"),
            WatchError::Shutdown => write!(f, "shutdown in progress"),
        }
    }
}

impl std::error::Error for WatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WatchError::Watch(e) => Some(e),
            WatchError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for WatchError {
    fn from(e: std::io::Error) -> Self {
        WatchError::Io(e)
    }
}

impl From<notify::Error> for WatchError {
    fn from(e: notify::Error) -> Self {
        WatchError::Watch(e)
    }
}

impl From<SendError> for WatchError {
    fn from(e: SendError) -> Self {
        match e {
            SendError::Disconnected => WatchError::Closed,
            SendError::Shutdown => WatchError::Shutdown,
        }
    }
}
