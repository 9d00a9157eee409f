// SPDX-License-Identifier: Apache-2.0

//! Watches an Elite Dangerous journal directory and turns filesystem change
//! notifications into an ordered stream of decoded records.
//!
//! The pieces, leaves first:
//! - [`shutdown`]: the single cooperative shutdown signal
//! - [`tail`]: incremental line reader tolerant of partial writes
//! - [`watch`]: deduplicating directory watcher over `notify`
//! - [`journal`]: current-journal selection, routing and record decoding

pub mod actions;
pub mod bounded_channel;
pub mod error;
pub mod init;
pub mod journal;
pub mod shutdown;
pub mod tail;
pub mod watch;

pub use error::{Error, Result};
pub use shutdown::Shutdown;

/// Error type for task results and kill causes.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
