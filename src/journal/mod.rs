// SPDX-License-Identifier: Apache-2.0

//! Journal directory watching.
//!
//! [`JournalWatcher`] keeps one [`Tailer`](crate::tail::Tailer) on the newest
//! `Journal.<n>.<n>.log` file, re-reads snapshot files such as `Status.json`
//! whenever the game rewrites them, and publishes every decoded [`Record`] on
//! a bounded queue in the order the changes were detected.

pub mod config;
pub mod decode;
pub mod naming;
pub mod record;
pub mod sniff;
mod watcher;

pub use config::JournalConfig;
pub use decode::{DecodeError, Decoder, JournalDecoder};
pub use naming::{is_journal_file, SnapshotKind};
pub use record::{NamedEvent, Record};
pub use watcher::JournalWatcher;
