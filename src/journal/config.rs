// SPDX-License-Identifier: Apache-2.0

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::tail::StartAt;

/// Default capacity of the record output queue
pub const DEFAULT_QUEUE_SIZE: usize = 10;

/// Journal directory relative to the user's home directory
pub const DEFAULT_JOURNAL_SUBDIR: [&str; 3] =
    ["Saved Games", "Frontier Developments", "Elite Dangerous"];

/// Configuration for the journal watcher
#[derive(Debug, Clone)]
pub struct JournalConfig {
    /// Directory holding the journal and snapshot files
    pub directory: PathBuf,

    /// Journal event names to forward. Empty forwards everything.
    /// Snapshot records are never filtered.
    pub event_filter: HashSet<String>,

    /// Capacity of the record output queue
    pub queue_size: usize,

    /// Where to start reading the journal selected at startup.
    /// Journals created later are always read from the beginning.
    pub start_at: StartAt,
}

impl JournalConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            event_filter: HashSet::new(),
            queue_size: DEFAULT_QUEUE_SIZE,
            start_at: StartAt::default(),
        }
    }

    pub fn with_event_filter<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.event_filter = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size;
        self
    }

    pub fn with_start_at(mut self, start_at: StartAt) -> Self {
        self.start_at = start_at;
        self
    }

    /// Whether a journal event named `name` passes the filter.
    pub fn accepts(&self, name: &str) -> bool {
        self.event_filter.is_empty() || self.event_filter.contains(name)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.queue_size == 0 {
            return Err(Error::Config("Queue size must be at least 1".to_string()));
        }

        check_directory(&self.directory)
    }
}

fn check_directory(dir: &Path) -> Result<()> {
    match std::fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(Error::NotADirectory(dir.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(Error::DirectoryNotFound(dir.to_path_buf()))
        }
        Err(e) => Err(Error::Io(e)),
    }
}

/// The game's journal directory under the user's home directory.
pub fn default_directory() -> Option<PathBuf> {
    dirs::home_dir().map(|home| DEFAULT_JOURNAL_SUBDIR.iter().fold(home, |p, c| p.join(c)))
}
