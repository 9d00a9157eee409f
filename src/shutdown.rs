// SPDX-License-Identifier: Apache-2.0

//! Process-wide shutdown signal.
//!
//! Every blocking operation in the watcher selects on [`Shutdown::dying`] so
//! that a single [`Shutdown::kill`] unwinds all tasks:
//!
//! ```ignore
//! select! {
//!     item = rx.next() => { /* ... */ }
//!     _ = shutdown.dying() => return,
//! }
//! ```

use std::error::Error;
use std::sync::{Arc, Mutex};

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, info};

use crate::BoxError;

/// The reason recorded by the first call to [`Shutdown::kill`].
pub type KillCause = Arc<dyn Error + Send + Sync>;

/// Single-fire broadcast shutdown signal. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
    cause: Arc<Mutex<Option<KillCause>>>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves once [`kill`](Self::kill) has been called, and stays resolved.
    pub fn dying(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    pub fn is_dying(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Kill the run, waking every waiter on [`dying`](Self::dying).
    ///
    /// Only the first cause is kept; later calls are logged and ignored.
    pub fn kill<E: Into<BoxError>>(&self, cause: E) {
        let cause: KillCause = Arc::from(cause.into());

        let mut slot = match self.cause.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(first) = slot.as_ref() {
            debug!(cause = %cause, first = %first, "Shutdown already in progress, ignoring kill");
            return;
        }
        info!(cause = %cause, "Shutdown");
        *slot = Some(cause);
        drop(slot);

        self.token.cancel();
    }

    /// The cause passed to the first [`kill`](Self::kill), if any.
    pub fn cause(&self) -> Option<KillCause> {
        match self.cause.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
