//! Debounced file watching.
//!
//! [`FileSubscription`] turns raw `notify` events on a file's parent directory
//! into "the file settled" notifications. [`PortWatcher`] builds on it and
//! publishes the port each time the file settles on a new value.
//!
//! ```text
//! inotify / kqueue
//!       │
//!       ▼
//!  FileSubscription ──(debounce)──→ PortWatcher ──mpsc(1)──→ SyncOrchestrator
//! ```

use crate::core::port_source::read_port;
use crate::domain::model::Port;
use crate::utils::error::{Result, SyncError};
use notify::event::{AccessKind, AccessMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Sleep};
use tokio_util::sync::CancellationToken;

/// Debounce timings.
///
/// `debounce` arms the timer on the first event of a burst; `rearm` is used
/// for every further event while the timer is still pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherConfig {
    pub debounce: Duration,
    pub rearm: Duration,
}

impl WatcherConfig {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            rearm: debounce,
        }
    }

    pub fn with_rearm(mut self, rearm: Duration) -> Self {
        self.rearm = rearm;
        self
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000))
    }
}

/// A subscription to changes of a single file.
///
/// The parent directory is watched (non-recursively) so that the file can be
/// deleted and recreated without losing the subscription. Dropping the value
/// releases the OS watch.
pub struct FileSubscription {
    target: PathBuf,
    events: mpsc::UnboundedReceiver<notify::Result<Event>>,
    timer: Pin<Box<Sleep>>,
    pending: bool,
    config: WatcherConfig,
    _watcher: Option<RecommendedWatcher>,
}

impl FileSubscription {
    /// Subscribes to `path`. Must be called within a Tokio runtime.
    pub fn open(path: &Path, config: WatcherConfig) -> Result<Self> {
        let (target, dir) = resolve_target(path)?;
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                // Receiver gone means the subscription is being torn down.
                let _ = tx.send(res);
            },
            notify::Config::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::debug!("Subscribed to {} (via {})", target.display(), dir.display());
        Ok(Self::from_parts(target, rx, config, Some(watcher)))
    }

    fn from_parts(
        target: PathBuf,
        events: mpsc::UnboundedReceiver<notify::Result<Event>>,
        config: WatcherConfig,
        watcher: Option<RecommendedWatcher>,
    ) -> Self {
        Self {
            target,
            events,
            timer: Box::pin(tokio::time::sleep_until(Instant::now())),
            pending: false,
            config,
            _watcher: watcher,
        }
    }

    /// Builds a subscription fed by an arbitrary event channel.
    #[cfg(test)]
    pub(crate) fn from_channel(
        target: PathBuf,
        events: mpsc::UnboundedReceiver<notify::Result<Event>>,
        config: WatcherConfig,
    ) -> Self {
        Self::from_parts(target, events, config, None)
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Waits until at least one matching event has been followed by a quiet
    /// debounce window.
    ///
    /// Returns `None` once `shutdown` is cancelled or the event source is gone.
    pub async fn next_settled(&mut self, shutdown: &CancellationToken) -> Option<()> {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return None,
                _ = &mut self.timer, if self.pending => {
                    self.pending = false;
                    return Some(());
                }
                received = self.events.recv() => match received {
                    None => return None,
                    Some(Ok(event)) => self.on_event(&event),
                    Some(Err(e)) => {
                        tracing::warn!("⚠️ Watch error on {}: {}", self.target.display(), e);
                    }
                },
            }
        }
    }

    fn on_event(&mut self, event: &Event) {
        if !is_relevant(&event.kind) || !event.paths.iter().any(|p| p == &self.target) {
            return;
        }

        let delay = if self.pending {
            self.config.rearm
        } else {
            self.config.debounce
        };
        tracing::debug!("{:?} on {}, settling in {:?}", event.kind, self.target.display(), delay);

        self.timer.as_mut().reset(Instant::now() + delay);
        self.pending = true;
    }
}

fn is_relevant(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => true,
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => true,
        _ => false,
    }
}

/// Returns the canonical target path together with its watched directory.
fn resolve_target(path: &Path) -> Result<(PathBuf, PathBuf)> {
    let file_name = path
        .file_name()
        .ok_or_else(|| SyncError::config(format!("'{}' is not a file path", path.display())))?;

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let dir = parent.canonicalize().map_err(|source| SyncError::IoError {
        path: parent.to_path_buf(),
        source,
    })?;

    Ok((dir.join(file_name), dir))
}

/// Publishes the content of a port file every time it settles on a new value.
pub struct PortWatcher {
    path: PathBuf,
    config: WatcherConfig,
}

impl PortWatcher {
    pub fn new(path: impl Into<PathBuf>, config: WatcherConfig) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    /// Starts the background watcher.
    ///
    /// The current value is read synchronously and, when valid, is the first
    /// port on the returned receiver. The receiver yields `None` after
    /// `shutdown` is cancelled.
    pub fn spawn(self, shutdown: CancellationToken) -> Result<(mpsc::Receiver<Port>, JoinHandle<()>)> {
        let subscription = FileSubscription::open(&self.path, self.config)?;
        Ok(self.spawn_with(subscription, shutdown))
    }

    pub(crate) fn spawn_with(
        self,
        subscription: FileSubscription,
        shutdown: CancellationToken,
    ) -> (mpsc::Receiver<Port>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(1);

        let last = match read_port(&self.path) {
            Ok(port) => {
                tracing::info!("🔌 Initial port {}", port);
                // Fresh single-slot channel, cannot be full.
                let _ = tx.try_send(port);
                Some(port)
            }
            Err(e) => {
                tracing::warn!("⚠️ No initial port: {}", e);
                None
            }
        };

        let handle = tokio::spawn(watch_loop(self.path, subscription, tx, last, shutdown));
        (rx, handle)
    }
}

async fn watch_loop(
    path: PathBuf,
    mut subscription: FileSubscription,
    tx: mpsc::Sender<Port>,
    mut last: Option<Port>,
    shutdown: CancellationToken,
) {
    tracing::info!("👀 Watching {}", subscription.target().display());

    while subscription.next_settled(&shutdown).await.is_some() {
        let port = match read_port(&path) {
            Ok(port) => port,
            Err(e) => {
                tracing::warn!("⚠️ Ignoring port file update: {}", e);
                continue;
            }
        };

        if last == Some(port) {
            tracing::debug!("Port unchanged ({})", port);
            continue;
        }
        last = Some(port);
        tracing::info!("🔌 Port changed to {}", port);

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            sent = tx.send(port) => {
                if sent.is_err() {
                    tracing::debug!("Port receiver dropped");
                    break;
                }
            }
        }
    }

    tracing::info!("Port watcher stopped");
}
