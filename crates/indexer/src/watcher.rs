use crate::cache::{ChangeKind, FileChange, IncrementalCache};
use crate::config::ContextConfig;
use crate::error::{IndexerError, Result};
use crate::pipeline::{elapsed_ms, write_snapshot};
use crate::project::Project;
use crate::scanner::FileScanner;
use context_contract::EntryId;
use context_drift::{compare, DriftSummary};
use context_graph::Bundle;
use context_snapshot::{
    append_watch_log, clear_watch_status, unix_now_ms, write_watch_status, DriftCounts,
    WatchLogEntry, WatchStatus,
};
use log::{debug, error, info, warn};
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tokio::task::{JoinError, JoinHandle};
use tokio::time;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchOptions {
    pub debounce: Duration,
    /// Upper bound on how long a steady stream of events can delay a batch.
    pub max_batch_wait: Option<Duration>,
    /// Stop on Ctrl-C or SIGTERM.
    pub handle_signals: bool,
}

impl WatchOptions {
    #[must_use]
    pub fn from_config(config: &ContextConfig) -> Self {
        Self {
            debounce: config.debounce(),
            max_batch_wait: config.max_batch_wait(),
            handle_signals: true,
        }
    }
}

/// Result of one rebuild, broadcast to subscribers and appended to the
/// watch log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchUpdate {
    pub completed_at: u64,
    pub duration_ms: u64,
    pub success: bool,
    pub full_rebuild: bool,
    pub changed_files: Vec<String>,
    pub repacked: Vec<EntryId>,
    pub dropped: Vec<EntryId>,
    pub failures: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drift: Option<DriftSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WatchUpdate {
    fn failed(full_rebuild: bool, changed_files: Vec<String>, duration_ms: u64, err: &str) -> Self {
        Self {
            completed_at: unix_now_ms(),
            duration_ms,
            success: false,
            full_rebuild,
            changed_files,
            repacked: Vec::new(),
            dropped: Vec::new(),
            failures: 0,
            drift: None,
            error: Some(err.to_string()),
        }
    }

    fn log_entry(&self) -> WatchLogEntry {
        let ids = |ids: &[EntryId]| ids.iter().map(|id| id.as_str().to_string()).collect();
        WatchLogEntry {
            timestamp: self.completed_at,
            success: self.success,
            full_rebuild: self.full_rebuild,
            duration_ms: self.duration_ms,
            changed_files: self.changed_files.clone(),
            repacked: ids(&self.repacked),
            dropped: ids(&self.dropped),
            drift: self.drift.map(|d| DriftCounts {
                added: d.added,
                removed: d.removed,
                changed: d.changed,
                bundles_changed: d.bundles_changed,
            }),
            error: self.error.clone(),
        }
    }
}

enum WatchCommand {
    Trigger,
    Shutdown,
}

/// Long-running rebuild loop for one project.
///
/// Starts with a full build, then folds debounced file changes into an
/// [`IncrementalCache`]. At most one rebuild runs at a time; changes arriving
/// meanwhile are kept for the next batch.
pub struct WatchController {
    command_tx: mpsc::Sender<WatchCommand>,
    update_tx: broadcast::Sender<WatchUpdate>,
    task: JoinHandle<()>,
    _watcher: Option<RecommendedWatcher>,
}

impl WatchController {
    /// Watch the project tree with the platform file watcher.
    pub fn start(project: Project, options: WatchOptions) -> Result<Self> {
        let (event_tx, event_rx) = mpsc::channel(1024);
        let watcher = create_fs_watcher(project.root(), project.scanner().clone(), event_tx)?;
        let mut controller = Self::start_with_events(project, options, event_rx);
        controller._watcher = Some(watcher);
        Ok(controller)
    }

    /// Run the loop on an externally supplied change stream.
    #[must_use]
    pub fn start_with_events(
        project: Project,
        options: WatchOptions,
        event_rx: mpsc::Receiver<FileChange>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(16);
        let (update_tx, _) = broadcast::channel(32);
        let task = tokio::spawn(watch_loop(
            project,
            options,
            event_rx,
            command_rx,
            update_tx.clone(),
        ));
        Self {
            command_tx,
            update_tx,
            task,
            _watcher: None,
        }
    }

    /// Request an immediate full rebuild.
    pub async fn trigger(&self) -> Result<()> {
        self.command_tx
            .send(WatchCommand::Trigger)
            .await
            .map_err(|_| IndexerError::Other("watch loop has stopped".to_string()))
    }

    #[must_use]
    pub fn subscribe_updates(&self) -> broadcast::Receiver<WatchUpdate> {
        self.update_tx.subscribe()
    }

    /// Stop watching. Waits for an in-flight rebuild to finish and for the
    /// status marker to be removed.
    pub async fn shutdown(self) -> Result<()> {
        // the loop may already have exited on a signal
        let _ = self.command_tx.send(WatchCommand::Shutdown).await;
        self.wait().await
    }

    /// Wait until the loop exits on its own (Ctrl-C or SIGTERM).
    pub async fn wait(self) -> Result<()> {
        let Self { task, _watcher: watcher, .. } = self;
        let result = task
            .await
            .map_err(|e| IndexerError::Other(format!("watch loop failed: {e}")));
        drop(watcher);
        result
    }
}

fn create_fs_watcher(
    root: &Path,
    scanner: FileScanner,
    sender: mpsc::Sender<FileChange>,
) -> Result<RecommendedWatcher> {
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let Some(kind) = change_kind(&event.kind) else {
                    return;
                };
                for path in event.paths {
                    if scanner.is_relevant(&path) {
                        let _ = sender.blocking_send(FileChange::new(path, kind));
                    }
                }
            }
            Err(err) => warn!("Watcher error: {err}"),
        },
        notify::Config::default(),
    )?;
    watcher.watch(root, RecursiveMode::Recursive)?;
    info!("Watching {}", root.display());
    Ok(watcher)
}

fn change_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Added),
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(_) | EventKind::Any => Some(ChangeKind::Modified),
        EventKind::Remove(_) => Some(ChangeKind::Removed),
        EventKind::Access(_) | EventKind::Other => None,
    }
}

type BatchOutcome = (Option<IncrementalCache>, WatchUpdate);

async fn watch_loop(
    project: Project,
    options: WatchOptions,
    mut event_rx: mpsc::Receiver<FileChange>,
    mut command_rx: mpsc::Receiver<WatchCommand>,
    update_tx: broadcast::Sender<WatchUpdate>,
) {
    let status = WatchStatus::current(project.root(), &project.out_dir());
    if let Err(err) = write_watch_status(project.root(), &status).await {
        warn!("Failed to write watch status marker: {err}");
    }

    let mut state = DebounceState::new(options.debounce, options.max_batch_wait);
    state.force_run();
    let mut cache: Option<IncrementalCache> = None;
    let mut in_flight: Option<JoinHandle<BatchOutcome>> = None;

    let signal = shutdown_signal();
    tokio::pin!(signal);

    loop {
        let next_deadline = state.next_deadline();

        tokio::select! {
            Some(change) = event_rx.recv() => {
                state.record(change);
            }
            cmd = command_rx.recv() => match cmd {
                Some(WatchCommand::Trigger) => state.force_run(),
                Some(WatchCommand::Shutdown) | None => break,
            },
            () = &mut signal, if options.handle_signals => {
                info!("Interrupted, stopping watch");
                break;
            }
            joined = join_in_flight(&mut in_flight) => {
                in_flight = None;
                cache = finish_batch(&project, joined, &update_tx).await;
            }
            () = async {
                if let Some(deadline) = next_deadline {
                    time::sleep_until(deadline).await;
                }
            }, if in_flight.is_none() && next_deadline.is_some() => {
                let (changes, full) = state.take_batch();
                in_flight = Some(tokio::spawn(run_batch(
                    project.clone(),
                    cache.take(),
                    changes,
                    full,
                )));
            }
        }
    }

    // no mid-rebuild cancellation: let the running batch land first
    if let Some(job) = in_flight.take() {
        let _ = finish_batch(&project, job.await, &update_tx).await;
    }
    if let Err(err) = clear_watch_status(project.root()).await {
        warn!("Failed to remove watch status marker: {err}");
    }
    info!("Watch stopped for {}", project.root().display());
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!("Cannot listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

async fn join_in_flight<T>(job: &mut Option<JoinHandle<T>>) -> std::result::Result<T, JoinError> {
    match job {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

/// Persist and broadcast a finished batch; returns the cache to keep.
async fn finish_batch(
    project: &Project,
    joined: std::result::Result<BatchOutcome, JoinError>,
    update_tx: &broadcast::Sender<WatchUpdate>,
) -> Option<IncrementalCache> {
    let (cache, update) = match joined {
        Ok(outcome) => outcome,
        Err(err) => {
            error!("Rebuild task aborted: {err}");
            (None, WatchUpdate::failed(false, Vec::new(), 0, &err.to_string()))
        }
    };

    if let Err(err) = append_watch_log(project.root(), &update.log_entry()).await {
        warn!("Failed to append watch log: {err}");
    }
    let _ = update_tx.send(update);
    cache
}

struct Rebuilt {
    cache: IncrementalCache,
    full_rebuild: bool,
    changed_files: Vec<String>,
    repacked: Vec<EntryId>,
    dropped: Vec<EntryId>,
    failures: usize,
    touched_folders: BTreeSet<String>,
    index_stale: bool,
    drift: Option<DriftSummary>,
}

async fn run_batch(
    project: Project,
    cache: Option<IncrementalCache>,
    changes: Vec<FileChange>,
    force_full: bool,
) -> BatchOutcome {
    let started = Instant::now();
    let changed_files: Vec<String> = changes
        .iter()
        .filter_map(|c| project.entry_id(&c.path))
        .map(|id| id.as_str().to_string())
        .collect();
    debug!("Starting rebuild for {} changed paths", changes.len());

    let job = project.clone();
    let rebuilt = tokio::task::spawn_blocking(move || rebuild(&job, cache, &changes, force_full))
        .await
        .map_err(|e| IndexerError::Other(format!("rebuild task failed: {e}")))
        .and_then(|r| r);

    let rebuilt = match rebuilt {
        Ok(rebuilt) => rebuilt,
        Err(err) => {
            error!("Rebuild failed, next batch rebuilds from scratch: {err}");
            let update =
                WatchUpdate::failed(force_full, changed_files, elapsed_ms(started), &err.to_string());
            return (None, update);
        }
    };

    if rebuilt.full_rebuild || rebuilt.index_stale {
        // an empty folder set still rewrites the index
        let folders = (!rebuilt.full_rebuild).then_some(&rebuilt.touched_folders);
        if let Err(err) = write_snapshot(&project, &rebuilt.cache, folders).await {
            error!("Failed to write context files, next batch rebuilds from scratch: {err}");
            let update = WatchUpdate::failed(
                rebuilt.full_rebuild,
                rebuilt.changed_files,
                elapsed_ms(started),
                &err.to_string(),
            );
            return (None, update);
        }
    }

    let update = WatchUpdate {
        completed_at: unix_now_ms(),
        duration_ms: elapsed_ms(started),
        success: true,
        full_rebuild: rebuilt.full_rebuild,
        changed_files: rebuilt.changed_files,
        repacked: rebuilt.repacked,
        dropped: rebuilt.dropped,
        failures: rebuilt.failures,
        drift: rebuilt.drift,
        error: None,
    };
    info!(
        "Rebuilt in {} ms: {} changed files, {} bundles repacked, {} dropped{}",
        update.duration_ms,
        update.changed_files.len(),
        update.repacked.len(),
        update.dropped.len(),
        if update.full_rebuild { " (full)" } else { "" }
    );
    (Some(rebuilt.cache), update)
}

fn rebuild(
    project: &Project,
    cache: Option<IncrementalCache>,
    changes: &[FileChange],
    force_full: bool,
) -> Result<Rebuilt> {
    let mut cache = match cache {
        Some(cache) if !force_full => cache,
        previous => {
            let before = previous.map(|c| c.bundles().to_vec());
            return Ok(full_rebuild(project, before.as_deref(), changes));
        }
    };

    let before = cache.bundles().to_vec();
    match cache.apply_changes(project, changes) {
        Ok(report) => {
            let drift = (!report.is_noop()).then(|| compare(&before, cache.bundles()).summary());
            let index_stale = report.contracts_changed() || !report.touched_folders.is_empty();
            Ok(Rebuilt {
                cache,
                full_rebuild: false,
                changed_files: report.changed_files,
                repacked: report.repacked,
                dropped: report.dropped,
                failures: report.failures.len(),
                touched_folders: report.touched_folders,
                index_stale,
                drift,
            })
        }
        Err(IndexerError::CacheInconsistency(reason)) => {
            warn!("Watch cache is inconsistent ({reason}), rebuilding from scratch");
            Ok(full_rebuild(project, Some(&before), changes))
        }
        Err(err) => Err(err),
    }
}

fn full_rebuild(project: &Project, before: Option<&[Bundle]>, changes: &[FileChange]) -> Rebuilt {
    let (cache, report) = IncrementalCache::build(project);
    let current: BTreeSet<&EntryId> = cache.bundles().iter().map(|b| &b.entry_id).collect();
    let dropped = before
        .unwrap_or_default()
        .iter()
        .filter(|b| !current.contains(&b.entry_id))
        .map(|b| b.entry_id.clone())
        .collect();
    Rebuilt {
        full_rebuild: true,
        changed_files: changes
            .iter()
            .filter_map(|c| project.entry_id(&c.path))
            .map(|id| id.as_str().to_string())
            .collect(),
        repacked: cache.bundles().iter().map(|b| b.entry_id.clone()).collect(),
        dropped,
        failures: report.failures.len(),
        touched_folders: BTreeSet::new(),
        index_stale: true,
        drift: before.map(|b| compare(b, cache.bundles()).summary()),
        cache,
    }
}

/// Pending changes plus the timing that decides when they run.
///
/// Each event pushes the deadline out by `debounce`; `max_batch` (when set)
/// caps how far a burst can push it.
struct DebounceState {
    debounce: Duration,
    max_batch: Option<Duration>,
    pending: BTreeMap<PathBuf, ChangeKind>,
    last_event: Option<Instant>,
    first_event: Option<Instant>,
    force_full: bool,
}

impl DebounceState {
    const fn new(debounce: Duration, max_batch: Option<Duration>) -> Self {
        Self {
            debounce,
            max_batch,
            pending: BTreeMap::new(),
            last_event: None,
            first_event: None,
            force_full: false,
        }
    }

    fn record(&mut self, change: FileChange) {
        let now = Instant::now();
        self.pending.insert(change.path, change.kind);
        self.last_event = Some(now);
        self.first_event.get_or_insert(now);
    }

    fn force_run(&mut self) {
        self.force_full = true;
    }

    fn should_run(&self) -> bool {
        self.force_full || !self.pending.is_empty()
    }

    fn next_deadline(&self) -> Option<time::Instant> {
        if !self.should_run() {
            return None;
        }
        if self.force_full {
            return Some(time::Instant::now());
        }

        let mut deadline = self.last_event.map(|last| last + self.debounce);
        if let (Some(first), Some(max_batch)) = (self.first_event, self.max_batch) {
            let forced = first + max_batch;
            deadline = Some(deadline.map_or(forced, |current| current.min(forced)));
        }
        deadline.map(time::Instant::from_std)
    }

    /// Hand the whole pending set to a batch and start over.
    fn take_batch(&mut self) -> (Vec<FileChange>, bool) {
        let changes = std::mem::take(&mut self.pending)
            .into_iter()
            .map(|(path, kind)| FileChange { path, kind })
            .collect();
        let full = std::mem::take(&mut self.force_full);
        self.last_event = None;
        self.first_event = None;
        (changes, full)
    }
}
