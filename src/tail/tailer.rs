// SPDX-License-Identifier: Apache-2.0

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};

use super::open::open_shared;

/// Where a freshly opened [`Tailer`] starts reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StartAt {
    /// Deliver the existing backlog
    #[default]
    Beginning,
    /// Skip existing content and only deliver lines appended later
    End,
}

impl std::str::FromStr for StartAt {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "beginning" => Ok(StartAt::Beginning),
            "end" => Ok(StartAt::End),
            _ => Err(format!(
                "Invalid start position '{}'. Valid options: beginning, end",
                s
            )),
        }
    }
}

/// Reads complete lines from a growing file, one batch per notification.
pub struct Tailer {
    /// Canonical path of the file
    path: PathBuf,
    /// Buffered reader, `None` once closed
    reader: Option<BufReader<File>>,
    /// Offset just past the last delivered line
    offset: u64,
}

impl Tailer {
    /// Open `path` with the cursor at byte 0.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::resume(path, 0)
    }

    pub fn open_at(path: impl AsRef<Path>, start_at: StartAt) -> io::Result<Self> {
        let mut tailer = Self::open(path)?;
        if start_at == StartAt::End {
            if let Some(reader) = tailer.reader.as_mut() {
                let file = reader.get_mut();
                let len = file.metadata()?.len();
                tailer.offset = end_of_last_line(file, len)?;
            }
        }
        Ok(tailer)
    }

    /// Reopen `path` at a previously confirmed offset.
    pub fn resume(path: impl AsRef<Path>, offset: u64) -> io::Result<Self> {
        let path = std::fs::canonicalize(path.as_ref())?;
        let file = open_shared(&path)?;
        debug!(path = %path.display(), offset, "Opened file for tailing");

        Ok(Self {
            path,
            reader: Some(BufReader::new(file)),
            offset,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }

    /// Offset just past the last delivered line.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    /// Feed every complete line available to `handler`.
    ///
    /// Lines are passed without their `\n` (and without a trailing `\r`).
    /// Returns `Continue(())` once caught up, leaving any unterminated
    /// remainder unread, or the `Break` value the handler stopped with. On a
    /// read error the cursor stays at the last delivered line.
    pub fn process_lines<B, F>(&mut self, mut handler: F) -> io::Result<ControlFlow<B>>
    where
        F: FnMut(&[u8]) -> ControlFlow<B>,
    {
        let path = &self.path;
        let Some(reader) = self.reader.as_mut() else {
            return Err(io::Error::other(format!(
                "tailer for {} is closed",
                path.display()
            )));
        };

        let len = reader.get_ref().metadata()?.len();
        if len < self.offset {
            warn!(
                path = %path.display(),
                offset = self.offset,
                len,
                "File shrank below read offset, restarting from the beginning"
            );
            self.offset = 0;
        }
        reader.seek(SeekFrom::Start(self.offset))?;

        let mut line = Vec::new();
        loop {
            line.clear();
            let read = match reader.read_until(b'\n', &mut line) {
                Ok(read) => read,
                Err(e) => {
                    // Best effort; the next call seeks again anyway
                    let _ = reader.seek(SeekFrom::Start(self.offset));
                    return Err(e);
                }
            };

            if read == 0 {
                return Ok(ControlFlow::Continue(()));
            }

            if line.last() != Some(&b'\n') {
                trace!(
                    path = %path.display(),
                    offset = self.offset,
                    pending = read,
                    "Partial line, waiting for the rest"
                );
                reader.seek(SeekFrom::Start(self.offset))?;
                return Ok(ControlFlow::Continue(()));
            }

            self.offset += read as u64;

            let mut content = &line[..line.len() - 1];
            if let Some(stripped) = content.strip_suffix(b"\r") {
                content = stripped;
            }

            if let ControlFlow::Break(b) = handler(content) {
                return Ok(ControlFlow::Break(b));
            }
        }
    }

    /// Collect every complete line currently available.
    pub fn read_lines(&mut self) -> io::Result<Vec<String>> {
        let mut lines = Vec::new();
        let _: ControlFlow<()> = self.process_lines(|line| {
            lines.push(String::from_utf8_lossy(line).into_owned());
            ControlFlow::Continue(())
        })?;
        Ok(lines)
    }

    /// Release the file handle. Safe to call more than once.
    pub fn close(&mut self) {
        if self.reader.take().is_some() {
            debug!(path = %self.path.display(), offset = self.offset, "Closed tailed file");
        }
    }
}

/// Offset just past the last `\n` before `len`, or 0 if there is none.
fn end_of_last_line(file: &mut File, len: u64) -> io::Result<u64> {
    const CHUNK: u64 = 4096;

    let mut buf = vec![0; CHUNK as usize];
    let mut end = len;
    while end > 0 {
        let start = end.saturating_sub(CHUNK);
        let chunk = &mut buf[..(end - start) as usize];
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(chunk)?;
        if let Some(pos) = chunk.iter().rposition(|&b| b == b'\n') {
            return Ok(start + pos as u64 + 1);
        }
        end = start;
    }
    Ok(0)
}

impl std::fmt::Debug for Tailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tailer")
            .field("path", &self.path)
            .field("offset", &self.offset)
            .field("open", &self.reader.is_some())
            .finish()
    }
}
