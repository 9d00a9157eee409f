// SPDX-License-Identifier: Apache-2.0

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

/// Open `path` for reading without blocking the writer.
///
/// On Windows the handle is opened with read, write and delete sharing so
/// the game can keep appending to and rotating the file.
#[cfg(windows)]
pub(crate) fn open_shared(path: &Path) -> io::Result<File> {
    use std::os::windows::fs::OpenOptionsExt;

    const FILE_SHARE_READ: u32 = 0x0000_0001;
    const FILE_SHARE_WRITE: u32 = 0x0000_0002;
    const FILE_SHARE_DELETE: u32 = 0x0000_0004;

    OpenOptions::new()
        .read(true)
        .share_mode(FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE)
        .open(path)
}

#[cfg(not(windows))]
pub(crate) fn open_shared(path: &Path) -> io::Result<File> {
    OpenOptions::new().read(true).open(path)
}
