// SPDX-License-Identifier: Apache-2.0

use std::path::{self, Path, PathBuf};

use tokio::select;
use tokio::sync::oneshot;
use tracing::{debug, error, info, trace, warn};

use super::error::WatchError;
use super::op::Op;
use super::registry::Registry;
use super::traits::{RawEvent, WatchBackend};
use crate::bounded_channel::{bounded, BoundedReceiver, BoundedSender, SendError};
use crate::shutdown::Shutdown;

/// Capacity of the queue between the OS backend and the watcher loop.
const RAW_QUEUE_SIZE: usize = 256;

/// A normalized filesystem event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Absolute path the event refers to
    pub path: PathBuf,
    pub op: Op,
}

type Reply = oneshot::Sender<Result<(), WatchError>>;

enum Request {
    Add(PathBuf, Reply),
    Remove(PathBuf, Reply),
}

/// Directory watcher loop.
///
/// Created together with a [`WatchHandle`] for registering paths and the
/// receiving end of the normalized event queue. Nothing is observed until
/// [`run`](Self::run) is polled.
pub struct DirWatcher {
    registry: Registry,
    requests: BoundedReceiver<Request>,
    events: BoundedSender<Event>,
}

/// Cloneable handle for adding and removing watched paths.
#[derive(Clone)]
pub struct WatchHandle {
    registry: Registry,
    requests: BoundedSender<Request>,
}

impl DirWatcher {
    pub fn new(event_capacity: usize) -> (DirWatcher, WatchHandle, BoundedReceiver<Event>) {
        let registry = Registry::default();
        let (req_tx, req_rx) = bounded(16);
        let (event_tx, event_rx) = bounded(event_capacity);

        let watcher = DirWatcher {
            registry: registry.clone(),
            requests: req_rx,
            events: event_tx,
        };
        let handle = WatchHandle {
            registry,
            requests: req_tx,
        };

        (watcher, handle, event_rx)
    }

    /// Run the watcher loop until the raw notification source closes, the
    /// event consumer goes away, or `shutdown` fires.
    ///
    /// `connect` builds the OS backend from the raw notification sender. If
    /// it fails, `shutdown` is killed and the error returned.
    pub async fn run<B, F>(self, connect: F, shutdown: Shutdown) -> Result<(), WatchError>
    where
        B: WatchBackend,
        F: FnOnce(BoundedSender<RawEvent>) -> Result<B, WatchError>,
    {
        let DirWatcher {
            registry,
            mut requests,
            events,
        } = self;

        let (raw_tx, mut raw_rx) = bounded(RAW_QUEUE_SIZE);
        let mut backend = match connect(raw_tx) {
            Ok(backend) => backend,
            Err(e) => {
                error!(error = %e, "Failed to start directory watcher");
                shutdown.kill(format!("directory watcher setup failed: {}", e));
                return Err(e);
            }
        };

        info!(backend = backend.backend_name(), "Directory watcher started");

        let mut requests_open = true;
        'events: loop {
            select! {
                request = requests.next(), if requests_open => match request {
                    Some(request) => handle_request(&mut backend, request),
                    // Every handle dropped, keep delivering events
                    None => requests_open = false,
                },
                raw = raw_rx.next() => match raw {
                    Some(Ok(raw)) => {
                        for event in normalize(&registry, raw) {
                            trace!(path = %event.path.display(), op = %event.op, "Filesystem event");
                            match events.send_until(event, &shutdown).await {
                                Ok(()) => {}
                                Err(SendError::Shutdown) => break 'events,
                                Err(SendError::Disconnected) => {
                                    debug!("Event consumer gone, stopping directory watcher");
                                    break 'events;
                                }
                            }
                        }
                    }
                    Some(Err(e)) => warn!(error = %e, "Watch backend reported an error"),
                    None => {
                        debug!("Raw notification source closed");
                        break;
                    }
                },
                _ = shutdown.dying() => break,
            }
        }

        debug!("Directory watcher stopped");
        Ok(())
    }
}

fn handle_request<B: WatchBackend>(backend: &mut B, request: Request) {
    match request {
        Request::Add(path, reply) => {
            let result = backend.watch(&path);
            match &result {
                Ok(()) => debug!(path = %path.display(), "Watching path"),
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to watch path"),
            }
            let _ = reply.send(result);
        }
        Request::Remove(path, reply) => {
            let result = backend.unwatch(&path);
            match &result {
                Ok(()) => debug!(path = %path.display(), "Stopped watching path"),
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to unwatch path"),
            }
            let _ = reply.send(result);
        }
    }
}

/// One event per path, skipping kinds that map to no operation.
fn normalize(registry: &Registry, raw: notify::Event) -> Vec<Event> {
    let op = Op::from_kind(&raw.kind);
    if op.is_empty() {
        trace!(kind = ?raw.kind, "Ignoring notification");
        return Vec::new();
    }

    raw.paths
        .into_iter()
        .map(|path| {
            let path = path::absolute(&path).unwrap_or(path);
            let op = op | registry.classify(&path);
            Event { path, op }
        })
        .collect()
}

/// Canonical form of `path`, so aliases of one directory share an entry.
/// Paths that no longer exist are only made absolute.
fn resolve(path: &Path) -> std::io::Result<PathBuf> {
    match std::fs::canonicalize(path) {
        Ok(path) => Ok(path),
        Err(_) => path::absolute(path),
    }
}

impl WatchHandle {
    /// Start watching `path`. Adding a path that is already watched returns
    /// immediately without touching the OS layer.
    pub async fn add_watch(&self, path: impl AsRef<Path>) -> Result<(), WatchError> {
        let path = resolve(path.as_ref())?;
        if !self.registry.reserve(&path) {
            return Ok(());
        }

        let result = self.request(Request::Add, path.clone()).await;
        if result.is_err() {
            self.registry.release(&path);
        }
        result
    }

    /// Stop watching `path`. Removing a path that is not watched is a no-op.
    pub async fn remove_watch(&self, path: impl AsRef<Path>) -> Result<(), WatchError> {
        let path = resolve(path.as_ref())?;
        if !self.registry.release(&path) {
            return Ok(());
        }

        self.request(Request::Remove, path).await
    }

    pub fn is_watched(&self, path: impl AsRef<Path>) -> bool {
        match resolve(path.as_ref()) {
            Ok(path) => self.registry.contains(&path),
            Err(_) => false,
        }
    }

    /// Currently watched paths, sorted.
    pub fn watched(&self) -> Vec<PathBuf> {
        self.registry.paths()
    }

    async fn request(
        &self,
        make: fn(PathBuf, Reply) -> Request,
        path: PathBuf,
    ) -> Result<(), WatchError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.requests.send(make(path, reply_tx)).await?;
        reply_rx.await.map_err(|_| WatchError::Closed)?
    }
}
