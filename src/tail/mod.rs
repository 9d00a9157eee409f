// SPDX-License-Identifier: Apache-2.0

//! Incremental line reader for append-only files.
//!
//! A [`Tailer`] remembers the byte offset just past the last complete line it
//! delivered. A trailing line without its `\n` is left unread until the
//! writer finishes it, so partial writes are never delivered and never lost.

mod open;
mod tailer;

pub use tailer::{StartAt, Tailer};
