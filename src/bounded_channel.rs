// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use flume::{Receiver, Sender};
use tokio::select;

use crate::shutdown::Shutdown;

pub struct BoundedSender<T> {
    tx: Sender<T>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum SendError {
    /// The receiving side has been dropped.
    Disconnected,
    /// The shutdown signal fired while the send was waiting for capacity.
    Shutdown,
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::Disconnected => write!(f, "channel disconnected"),
            SendError::Shutdown => write!(f, "shutdown in progress"),
        }
    }
}

impl std::error::Error for SendError {}

/// Outcome of a non-blocking send that could not be completed.
#[derive(Debug, PartialEq, Eq)]
pub enum TrySendError {
    Full,
    Disconnected,
}

impl<T> BoundedSender<T> {
    pub async fn send(&self, item: T) -> Result<(), SendError> {
        match self.tx.send_async(item).await {
            Ok(()) => Ok(()),
            Err(_e) => Err(SendError::Disconnected), // receiver closed
        }
    }

    /// Blocking send - blocks until there is capacity in the channel.
    /// Use this from non-async contexts (e.g., notify's callback thread).
    pub fn send_blocking(&self, item: T) -> Result<(), SendError> {
        match self.tx.send(item) {
            Ok(()) => Ok(()),
            Err(_e) => Err(SendError::Disconnected), // receiver closed
        }
    }

    /// Send, waiting for capacity unless `shutdown` fires first.
    ///
    /// A full channel is backpressure; the only ways out are a free slot,
    /// a dropped receiver, or shutdown.
    pub async fn send_until(&self, item: T, shutdown: &Shutdown) -> Result<(), SendError> {
        if shutdown.is_dying() {
            return Err(SendError::Shutdown);
        }

        let send_fut = self.tx.send_async(item);
        tokio::pin!(send_fut);

        select! {
            result = &mut send_fut => result.map_err(|_| SendError::Disconnected),
            _ = shutdown.dying() => Err(SendError::Shutdown),
        }
    }

    /// Non-blocking send. A full channel returns [`TrySendError::Full`] and
    /// drops `item`, which callers use to coalesce repeated signals.
    pub fn try_send(&self, item: T) -> Result<(), TrySendError> {
        match self.tx.try_send(item) {
            Ok(()) => Ok(()),
            Err(flume::TrySendError::Full(_)) => Err(TrySendError::Full),
            Err(flume::TrySendError::Disconnected(_)) => Err(TrySendError::Disconnected),
        }
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

impl<T> Clone for BoundedSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> fmt::Debug for BoundedSender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedSender")
            .field("len", &self.tx.len())
            .field("capacity", &self.tx.capacity())
            .finish()
    }
}

pub struct BoundedReceiver<T> {
    rx: Receiver<T>,
}

impl<T> BoundedReceiver<T> {
    /// Next item, or `None` once every sender is gone and the queue is empty.
    pub async fn next(&mut self) -> Option<T> {
        match self.rx.recv_async().await {
            Ok(item) => Some(item),
            Err(_e) => None, // disconnected
        }
    }

    /// Non-blocking receive - returns immediately.
    /// Returns None if no item is available or channel is disconnected.
    pub fn try_recv(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl<T> fmt::Debug for BoundedReceiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedReceiver")
            .field("len", &self.rx.len())
            .finish()
    }
}

pub fn bounded<T>(size: usize) -> (BoundedSender<T>, BoundedReceiver<T>) {
    let (tx, rx) = flume::bounded::<T>(size);

    let sender = BoundedSender { tx };
    let receiver = BoundedReceiver { rx };

    (sender, receiver)
}

#[cfg(test)]
mod tests {
    use super::{SendError, TrySendError, bounded};
    use crate::shutdown::Shutdown;
    use tokio_test::{assert_err, assert_ok, assert_pending, assert_ready, task::spawn};

    #[tokio::test]
    async fn basics() {
        let (tx, mut rx) = bounded(3);

        let msg = 10;

        let mut send1 = spawn(async { tx.send(msg).await });
        let mut recv1 = spawn(async { rx.next().await });

        assert!(!send1.is_woken());
        assert!(!recv1.is_woken());

        assert_pending!(recv1.poll());

        assert_ok!(assert_ready!(send1.poll()));

        assert!(recv1.is_woken());

        assert_eq!(Some(msg), assert_ready!(recv1.poll()));
    }

    #[tokio::test]
    async fn send_after_receiver_dropped() {
        let (tx, rx) = bounded::<u32>(1);
        drop(rx);

        assert_eq!(tx.send(1).await, Err(SendError::Disconnected));
        assert_eq!(tx.try_send(1), Err(TrySendError::Disconnected));
    }

    #[test]
    fn try_send_coalesces_when_full() {
        let (tx, rx) = bounded::<()>(1);

        assert_ok!(tx.try_send(()));
        assert_eq!(tx.try_send(()), Err(TrySendError::Full));
        assert_eq!(tx.try_send(()), Err(TrySendError::Full));

        assert_eq!(rx.len(), 1);
        assert!(rx.try_recv().is_some());
        assert!(rx.try_recv().is_none());
    }

    #[tokio::test]
    async fn send_until_unblocks_on_shutdown() {
        let (tx, _rx) = bounded::<u32>(1);
        let shutdown = Shutdown::new();
        assert_ok!(tx.try_send(1));

        let mut blocked = spawn(tx.send_until(2, &shutdown));
        assert_pending!(blocked.poll());

        shutdown.kill("test");

        assert!(blocked.is_woken());
        let res = assert_ready!(blocked.poll());
        assert_eq!(assert_err!(res), SendError::Shutdown);
    }

    #[tokio::test]
    async fn send_until_refuses_after_shutdown() {
        let (tx, rx) = bounded::<u32>(4);
        let shutdown = Shutdown::new();
        shutdown.kill("test");

        assert_eq!(tx.send_until(1, &shutdown).await, Err(SendError::Shutdown));
        assert!(rx.is_empty());
    }

    #[tokio::test]
    async fn send_until_delivers_when_capacity_frees() {
        let (tx, mut rx) = bounded::<u32>(1);
        let shutdown = Shutdown::new();
        assert_ok!(tx.try_send(1));

        let mut blocked = spawn(tx.send_until(2, &shutdown));
        assert_pending!(blocked.poll());

        assert_eq!(rx.next().await, Some(1));
        assert!(blocked.is_woken());
        assert_ok!(assert_ready!(blocked.poll()));
        assert_eq!(rx.next().await, Some(2));
    }
}
