// SPDX-License-Identifier: Apache-2.0

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::select;
use tracing::{debug, error, info, trace, warn};

use super::config::JournalConfig;
use super::decode::{Decoder, JournalDecoder};
use super::naming::{is_journal_file, lower_base_name, SnapshotKind};
use super::record::{NamedEvent, Record};
use super::sniff;
use crate::bounded_channel::{bounded, BoundedReceiver, BoundedSender, SendError, TrySendError};
use crate::error::{Error, Result};
use crate::shutdown::Shutdown;
use crate::tail::{StartAt, Tailer};
use crate::watch::{DirWatcher, Event, NotifyBackend, Op, RawEvent, WatchBackend, WatchError};

/// Capacity of the normalized event queue between the directory watcher and
/// the router.
const EVENT_QUEUE_SIZE: usize = 64;

/// Watches a journal directory and publishes decoded records.
///
/// Runs three tasks: the directory watcher loop, a router turning filesystem
/// events into control signals, and a dispatch loop on a blocking thread
/// doing all file reads serially.
pub struct JournalWatcher<D = JournalDecoder> {
    config: JournalConfig,
    decoder: Arc<D>,
    records: BoundedSender<Record>,
    shutdown: Shutdown,
}

impl JournalWatcher<JournalDecoder> {
    pub fn new(config: JournalConfig, shutdown: Shutdown) -> (Self, BoundedReceiver<Record>) {
        Self::with_decoder(config, JournalDecoder, shutdown)
    }
}

impl<D: Decoder + 'static> JournalWatcher<D> {
    pub fn with_decoder(
        config: JournalConfig,
        decoder: D,
        shutdown: Shutdown,
    ) -> (Self, BoundedReceiver<Record>) {
        let (records_tx, records_rx) = bounded(config.queue_size);
        let watcher = Self {
            config,
            decoder: Arc::new(decoder),
            records: records_tx,
            shutdown,
        };
        (watcher, records_rx)
    }

    /// Run with the platform's native notification backend.
    pub async fn run_native(self) -> Result<()> {
        self.run(NotifyBackend::new).await
    }

    /// Run until shutdown.
    ///
    /// Setup errors (missing directory, backend or watch registration
    /// failure) kill the shutdown signal and are returned.
    pub async fn run<B, F>(self, connect: F) -> Result<()>
    where
        B: WatchBackend + 'static,
        F: FnOnce(BoundedSender<RawEvent>) -> std::result::Result<B, WatchError> + Send + 'static,
    {
        let JournalWatcher {
            config,
            decoder,
            records,
            shutdown,
        } = self;

        if let Err(e) = config.validate() {
            error!(directory = %config.directory.display(), error = %e, "Invalid journal watcher configuration");
            shutdown.kill(format!("setup failed: {}", e));
            return Err(e);
        }

        let (dir_watcher, watch_handle, events) = DirWatcher::new(EVENT_QUEUE_SIZE);
        let watcher_task = tokio::spawn(dir_watcher.run(connect, shutdown.clone()));

        if let Err(e) = watch_handle.add_watch(&config.directory).await {
            error!(directory = %config.directory.display(), error = %e, "Failed to watch journal directory");
            shutdown.kill(format!("setup failed: {}", e));
            // Surface the backend setup error rather than the closed loop
            return match watcher_task.await {
                Ok(Err(setup)) => Err(Error::Watch(setup)),
                _ => Err(Error::Watch(e)),
            };
        }

        info!(
            directory = %config.directory.display(),
            filter = ?config.event_filter,
            queue_size = config.queue_size,
            "Watching journal directory"
        );

        let (new_journal_tx, new_journal_rx) = bounded(1);
        let (grew_tx, grew_rx) = bounded(1);
        let (snapshot_tx, snapshot_rx) = bounded(1);

        let router = Router {
            new_journal: new_journal_tx,
            grew: grew_tx,
            snapshot_written: snapshot_tx,
            shutdown: shutdown.clone(),
        };
        let router_task = tokio::spawn(router.run(events));

        let control = Control {
            new_journal: new_journal_rx,
            grew: grew_rx,
            snapshot_written: snapshot_rx,
        };
        let dispatch = Dispatch::new(config, decoder, records, shutdown.clone(), Handle::current());
        let dispatch_task = tokio::task::spawn_blocking(move || dispatch.run(control));

        if let Err(e) = dispatch_task.await {
            error!(error = %e, "Journal dispatch loop panicked");
        }
        if !shutdown.is_dying() {
            shutdown.kill("journal dispatch loop stopped");
        }

        if let Err(e) = router_task.await {
            error!(error = %e, "Journal event router panicked");
        }
        match watcher_task.await {
            Ok(result) => result?,
            Err(e) => error!(error = %e, "Directory watcher task panicked"),
        }

        info!("Journal watcher stopped");
        Ok(())
    }
}

/// Turns normalized filesystem events into dispatch control signals.
struct Router {
    new_journal: BoundedSender<PathBuf>,
    grew: BoundedSender<()>,
    snapshot_written: BoundedSender<PathBuf>,
    shutdown: Shutdown,
}

impl Router {
    async fn run(self, mut events: BoundedReceiver<Event>) {
        loop {
            let event = select! {
                event = events.next() => match event {
                    Some(event) => event,
                    None => break,
                },
                _ = self.shutdown.dying() => break,
            };

            if let ControlFlow::Break(e) = self.route(event).await {
                debug!(error = %e, "Journal event router stopping");
                break;
            }
        }
        debug!("Journal event router stopped");
    }

    async fn route(&self, event: Event) -> ControlFlow<SendError> {
        if !event.op.contains(Op::DIR_CHILD) {
            trace!(path = %event.path.display(), op = %event.op, "Ignoring event on watched directory");
            return ControlFlow::Continue(());
        }

        if event.op.contains(Op::WRITE) {
            if SnapshotKind::from_path(&event.path).is_some() {
                return send(
                    self.snapshot_written
                        .send_until(event.path, &self.shutdown)
                        .await,
                );
            }
            if is_journal_file(&event.path) {
                return match self.grew.try_send(()) {
                    // A pass is already pending and will catch up
                    Ok(()) | Err(TrySendError::Full) => ControlFlow::Continue(()),
                    Err(TrySendError::Disconnected) => ControlFlow::Break(SendError::Disconnected),
                };
            }
            debug!(path = %event.path.display(), "Ignoring write to unknown file");
        } else if event.op.contains(Op::CREATE) && is_journal_file(&event.path) {
            return send(self.new_journal.send_until(event.path, &self.shutdown).await);
        }

        ControlFlow::Continue(())
    }
}

fn send(result: std::result::Result<(), SendError>) -> ControlFlow<SendError> {
    match result {
        Ok(()) => ControlFlow::Continue(()),
        Err(e) => ControlFlow::Break(e),
    }
}

struct Control {
    new_journal: BoundedReceiver<PathBuf>,
    grew: BoundedReceiver<()>,
    snapshot_written: BoundedReceiver<PathBuf>,
}

enum Signal {
    NewJournal(PathBuf),
    Grew,
    SnapshotWritten(PathBuf),
    Stop,
}

/// Decodes, filters and publishes records.
struct Publisher<D> {
    config: JournalConfig,
    decoder: Arc<D>,
    records: BoundedSender<Record>,
    shutdown: Shutdown,
    runtime: Handle,
}

impl<D: Decoder> Publisher<D> {
    /// Whether the event filter drops `name`. Unnamed events are kept.
    fn rejects(&self, name: &str) -> bool {
        !name.is_empty() && !self.config.accepts(name)
    }

    fn journal_line(&self, line: &[u8]) -> ControlFlow<SendError> {
        if line.iter().all(u8::is_ascii_whitespace) {
            return ControlFlow::Continue(());
        }

        let filtering = !self.config.event_filter.is_empty();
        let sniffed = if filtering {
            match sniff::event_name(line).filter(|name| !name.is_empty()) {
                Some(name) if self.rejects(name) => {
                    trace!(event = name, "Filtered journal line");
                    return ControlFlow::Continue(());
                }
                sniffed => sniffed.is_some(),
            }
        } else {
            false
        };

        let record = match self.decoder.decode_line(line) {
            Ok(record) => record,
            Err(e) => {
                debug!(error = %e, "Dropping undecodable journal line");
                return ControlFlow::Continue(());
            }
        };

        if filtering && !sniffed && self.rejects(record.name()) {
            trace!(event = record.name(), "Filtered journal record");
            return ControlFlow::Continue(());
        }

        self.publish(record)
    }

    fn snapshot_file(&self, path: &Path) -> ControlFlow<SendError> {
        match self.decoder.decode_snapshot_file(path) {
            Ok(record) => self.publish(record),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Dropping unreadable snapshot");
                ControlFlow::Continue(())
            }
        }
    }

    /// Blocks while the output queue is full, unless shutdown fires.
    fn publish(&self, record: Record) -> ControlFlow<SendError> {
        trace!(event = record.name(), "Publishing record");
        send(
            self.runtime
                .block_on(self.records.send_until(record, &self.shutdown)),
        )
    }
}

/// Current journal selection and the serial read loop. Runs on a blocking
/// thread.
struct Dispatch<D> {
    publisher: Publisher<D>,
    current: Option<Tailer>,
    /// Path and offset of a journal torn down by a read error
    lost: Option<(PathBuf, u64)>,
}

impl<D: Decoder> Dispatch<D> {
    fn new(
        config: JournalConfig,
        decoder: Arc<D>,
        records: BoundedSender<Record>,
        shutdown: Shutdown,
        runtime: Handle,
    ) -> Self {
        Self {
            publisher: Publisher {
                config,
                decoder,
                records,
                shutdown,
                runtime,
            },
            current: None,
            lost: None,
        }
    }

    fn run(mut self, mut control: Control) {
        if let ControlFlow::Break(e) = self.start() {
            debug!(error = %e, "Journal dispatch stopping");
            return;
        }

        loop {
            let shutdown = &self.publisher.shutdown;
            let signal = self.publisher.runtime.block_on(async {
                select! {
                    Some(path) = control.new_journal.next() => Signal::NewJournal(path),
                    Some(()) = control.grew.next() => Signal::Grew,
                    Some(path) = control.snapshot_written.next() => Signal::SnapshotWritten(path),
                    _ = shutdown.dying() => Signal::Stop,
                    else => Signal::Stop,
                }
            });

            let flow = match signal {
                Signal::NewJournal(path) => {
                    self.maybe_set_journal(&path, StartAt::Beginning);
                    self.tail_journal()
                }
                Signal::Grew => {
                    if self.current.is_none() {
                        self.rescan(StartAt::Beginning);
                    }
                    self.tail_journal()
                }
                Signal::SnapshotWritten(path) => self.publisher.snapshot_file(&path),
                Signal::Stop => break,
            };

            if let ControlFlow::Break(e) = flow {
                debug!(error = %e, "Journal dispatch stopping");
                break;
            }
        }

        if let Some(mut tailer) = self.current.take() {
            tailer.close();
        }
        debug!("Journal dispatch loop stopped");
    }

    /// Publish every existing snapshot, then select and drain the newest
    /// journal.
    fn start(&mut self) -> ControlFlow<SendError> {
        let directory = self.publisher.config.directory.clone();
        match scan_directory(&directory) {
            Ok(scan) => {
                for path in scan.snapshots {
                    self.publisher.snapshot_file(&path)?;
                }
                if let Some(journal) = scan.latest_journal {
                    self.maybe_set_journal(&journal, self.publisher.config.start_at);
                }
            }
            Err(e) => warn!(directory = %directory.display(), error = %e, "Failed to scan journal directory"),
        }

        self.tail_journal()
    }

    fn rescan(&mut self, start_at: StartAt) {
        let directory = &self.publisher.config.directory;
        match scan_directory(directory) {
            Ok(scan) => {
                if let Some(journal) = scan.latest_journal {
                    self.maybe_set_journal(&journal, start_at);
                }
            }
            Err(e) => warn!(directory = %directory.display(), error = %e, "Failed to rescan journal directory"),
        }
    }

    /// Switch to `path` if its name sorts after the current journal's.
    fn maybe_set_journal(&mut self, path: &Path, start_at: StartAt) -> bool {
        let Some(candidate) = lower_base_name(path) else {
            return false;
        };

        if let Some(current) = self.current.as_mut() {
            let current_name = lower_base_name(current.path()).unwrap_or_default();
            if candidate <= current_name {
                debug!(
                    path = %path.display(),
                    current = %current.path().display(),
                    "Not switching to older journal"
                );
                return false;
            }
            current.close();
            self.current = None;
        }

        let resume_at = match self.lost.take() {
            Some((lost, offset)) if lower_base_name(&lost).as_deref() == Some(candidate.as_str()) => {
                Some(offset)
            }
            other => {
                self.lost = other;
                None
            }
        };

        let opened = match resume_at {
            Some(offset) => Tailer::resume(path, offset),
            None => Tailer::open_at(path, start_at),
        };

        match opened {
            Ok(tailer) => {
                info!(path = %tailer.path().display(), offset = tailer.offset(), "Selected journal");
                self.current = Some(tailer);
                true
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to open journal");
                false
            }
        }
    }

    fn tail_journal(&mut self) -> ControlFlow<SendError> {
        let Some(tailer) = self.current.as_mut() else {
            return ControlFlow::Continue(());
        };

        let publisher = &self.publisher;
        match tailer.process_lines(|line| publisher.journal_line(line)) {
            Ok(flow) => flow,
            Err(e) => {
                warn!(
                    path = %tailer.path().display(),
                    offset = tailer.offset(),
                    error = %e,
                    "Failed to read journal, closing it until the next change"
                );
                tailer.close();
                self.lost = Some((tailer.path().to_path_buf(), tailer.offset()));
                self.current = None;
                ControlFlow::Continue(())
            }
        }
    }

    #[cfg(test)]
    fn current_name(&self) -> Option<String> {
        self.current.as_ref().and_then(|t| t.file_name().map(str::to_string))
    }
}

struct DirectoryScan {
    latest_journal: Option<PathBuf>,
    /// Existing snapshot files, in [`SnapshotKind::ALL`] order
    snapshots: Vec<PathBuf>,
}

fn scan_directory(directory: &Path) -> std::io::Result<DirectoryScan> {
    let mut latest: Option<(String, PathBuf)> = None;
    let mut snapshots = Vec::new();

    for entry in std::fs::read_dir(directory)? {
        let path = entry?.path();
        if let Some(kind) = SnapshotKind::from_path(&path) {
            snapshots.push((kind, path));
        } else if is_journal_file(&path) {
            let Some(name) = lower_base_name(&path) else {
                continue;
            };
            if latest.as_ref().map_or(true, |(best, _)| name > *best) {
                latest = Some((name, path));
            }
        }
    }

    snapshots.sort_by_key(|(kind, _)| SnapshotKind::ALL.iter().position(|k| k == kind));

    Ok(DirectoryScan {
        latest_journal: latest.map(|(_, path)| path),
        snapshots: snapshots.into_iter().map(|(_, path)| path).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::io::Write;
    use tempfile::TempDir;

    const FSD_JUMP: &str = r#"{"timestamp":"2023-01-01T00:00:00Z","event":"FSDJump","StarSystem":"Sol"}"#;
    const DOCKED: &str = r#"{"timestamp":"2023-01-01T00:01:00Z","event":"Docked","StationName":"Abraham Lincoln"}"#;

    fn append_line(path: &Path, line: &str) {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        writeln!(f, "{}", line).unwrap();
    }

    fn dispatch(
        runtime: &tokio::runtime::Runtime,
        config: JournalConfig,
    ) -> (Dispatch<JournalDecoder>, BoundedReceiver<Record>) {
        let (tx, rx) = bounded(64);
        let dispatch = Dispatch::new(
            config,
            Arc::new(JournalDecoder),
            tx,
            Shutdown::new(),
            runtime.handle().clone(),
        );
        (dispatch, rx)
    }

    fn drain(rx: &BoundedReceiver<Record>) -> Vec<String> {
        std::iter::from_fn(|| rx.try_recv())
            .map(|r| r.name().to_string())
            .collect()
    }

    #[test]
    fn test_scan_directory() {
        let temp_dir = TempDir::new().unwrap();
        for name in [
            "Journal.12.01.log",
            "journal.12.02.log",
            "Journal.11.09.log",
            "Status.json",
            "Cargo.json",
            "Backpack.json",
            "notes.txt",
        ] {
            std::fs::write(temp_dir.path().join(name), b"").unwrap();
        }

        let scan = scan_directory(temp_dir.path()).unwrap();
        assert_eq!(
            scan.latest_journal.unwrap().file_name().unwrap(),
            "journal.12.02.log"
        );
        let snapshots: Vec<_> = scan
            .snapshots
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(snapshots, vec!["Cargo.json", "Status.json"]);
    }

    #[test]
    fn test_selection_only_advances() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let older = temp_dir.path().join("Journal.12.01.log");
        let newer = temp_dir.path().join("Journal.12.02.log");
        let newest = temp_dir.path().join("JOURNAL.12.03.log");
        for p in [&older, &newer, &newest] {
            std::fs::write(p, b"").unwrap();
        }

        let (mut dispatch, _rx) = dispatch(&runtime, JournalConfig::new(temp_dir.path()));
        assert!(dispatch.current_name().is_none());

        assert!(dispatch.maybe_set_journal(&newer, StartAt::Beginning));
        assert_eq!(dispatch.current_name().unwrap(), "Journal.12.02.log");

        assert!(!dispatch.maybe_set_journal(&older, StartAt::Beginning));
        assert!(!dispatch.maybe_set_journal(&newer, StartAt::Beginning));
        assert_eq!(dispatch.current_name().unwrap(), "Journal.12.02.log");

        // Compared case-insensitively
        assert!(dispatch.maybe_set_journal(&newest, StartAt::Beginning));
        assert_eq!(dispatch.current_name().unwrap(), "JOURNAL.12.03.log");
    }

    #[test]
    fn test_start_publishes_snapshots_then_backlog() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("Status.json"),
            br#"{"timestamp":"2023-01-01T00:00:00Z","event":"Status","Flags":0}"#,
        )
        .unwrap();
        append_line(&temp_dir.path().join("Journal.12.01.log"), DOCKED);
        let journal = temp_dir.path().join("Journal.12.02.log");
        append_line(&journal, FSD_JUMP);
        append_line(&journal, DOCKED);

        let (mut dispatch, rx) = dispatch(&runtime, JournalConfig::new(temp_dir.path()));
        assert!(dispatch.start().is_continue());

        assert_eq!(drain(&rx), vec!["Status", "FSDJump", "Docked"]);
        assert_eq!(dispatch.current_name().unwrap(), "Journal.12.02.log");
    }

    #[test]
    fn test_start_at_end_skips_backlog() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let journal = temp_dir.path().join("Journal.12.02.log");
        append_line(&journal, FSD_JUMP);

        let config = JournalConfig::new(temp_dir.path()).with_start_at(StartAt::End);
        let (mut dispatch, rx) = dispatch(&runtime, config);
        assert!(dispatch.start().is_continue());
        assert!(drain(&rx).is_empty());

        append_line(&journal, DOCKED);
        assert!(dispatch.tail_journal().is_continue());
        assert_eq!(drain(&rx), vec!["Docked"]);
    }

    #[test]
    fn test_event_filter() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let journal = temp_dir.path().join("Journal.12.02.log");
        append_line(&journal, FSD_JUMP);
        append_line(&journal, DOCKED);
        // No sniffable name: decided on the decoded record
        append_line(&journal, r#"{"event":"Und\u006fcked"}"#);
        append_line(&journal, "not json");
        append_line(&journal, "");
        // Unnamed lines are kept
        append_line(&journal, r#"{"timestamp":"2023-01-01T00:02:00Z"}"#);

        let config = JournalConfig::new(temp_dir.path()).with_event_filter(["Docked"]);
        let (mut dispatch, rx) = dispatch(&runtime, config);
        assert!(dispatch.start().is_continue());

        assert_eq!(drain(&rx), vec!["Docked", ""]);
    }

    #[test]
    fn test_read_error_resumes_at_offset() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let journal = temp_dir.path().join("Journal.12.02.log");
        append_line(&journal, FSD_JUMP);

        let (mut dispatch, rx) = dispatch(&runtime, JournalConfig::new(temp_dir.path()));
        assert!(dispatch.start().is_continue());
        assert_eq!(drain(&rx), vec!["FSDJump"]);

        // Simulate a lost handle
        let offset = dispatch.current.as_ref().unwrap().offset();
        dispatch.current.as_mut().unwrap().close();
        assert!(dispatch.tail_journal().is_continue());
        assert!(dispatch.current.is_none());
        assert_eq!(dispatch.lost.as_ref().unwrap().1, offset);

        append_line(&journal, DOCKED);
        dispatch.rescan(StartAt::Beginning);
        assert!(dispatch.tail_journal().is_continue());
        assert_eq!(drain(&rx), vec!["Docked"]);
        assert!(dispatch.lost.is_none());
    }

    #[test]
    fn test_publish_stops_on_shutdown() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let journal = temp_dir.path().join("Journal.12.02.log");
        append_line(&journal, FSD_JUMP);
        append_line(&journal, DOCKED);

        let (tx, rx) = bounded(1);
        let shutdown = Shutdown::new();
        let mut dispatch = Dispatch::new(
            JournalConfig::new(temp_dir.path()),
            Arc::new(JournalDecoder),
            tx,
            shutdown.clone(),
            runtime.handle().clone(),
        );

        let killer = shutdown.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(50));
            killer.kill("test");
        });

        // The second record blocks on the full queue until shutdown
        assert_eq!(dispatch.start(), ControlFlow::Break(SendError::Shutdown));
        handle.join().unwrap();
        assert_eq!(drain(&rx), vec!["FSDJump"]);
    }
}
