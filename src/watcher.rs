//! Watches the standards file and triggers a reload when it changes.
//!
//! Editors often emit several events per save (truncate, write, rename), so
//! events are debounced: the first change fires at once, later ones inside
//! the debounce window are collapsed into a single delayed trigger.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};

/// Configuration for file watching and reloads.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Minimum time between callbacks (default: 2 seconds).
    pub debounce_duration: Duration,
    /// Number of retry attempts for reload (default: 3).
    pub retry_attempts: u32,
    /// Delay between retry attempts (default: 500ms).
    pub retry_delay: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_duration: Duration::from_secs(2),
            retry_attempts: 3,
            retry_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("Failed to create watcher: {0}")]
    Notify(#[from] notify::Error),

    #[error("Watch path does not exist: {0}")]
    PathNotFound(PathBuf),

    #[error("Channel closed unexpectedly")]
    ChannelClosed,
}

/// Collapses bursts of change events into single triggers.
struct Debouncer {
    last_triggered: Option<Instant>,
    duration: Duration,
    pending: bool,
}

impl Debouncer {
    fn new(duration: Duration) -> Self {
        Self {
            last_triggered: None,
            duration,
            pending: false,
        }
    }

    /// Records a change event. Returns true if the callback should fire now.
    fn on_event(&mut self, now: Instant) -> bool {
        if self.window_elapsed(now) {
            self.last_triggered = Some(now);
            self.pending = false;
            true
        } else {
            // Push the window out and fire once things go quiet
            self.last_triggered = Some(now);
            self.pending = true;
            false
        }
    }

    /// Called periodically. Returns true if a deferred trigger is due.
    fn on_tick(&mut self, now: Instant) -> bool {
        if self.pending && self.window_elapsed(now) {
            self.last_triggered = Some(now);
            self.pending = false;
            true
        } else {
            false
        }
    }

    fn window_elapsed(&self, now: Instant) -> bool {
        self.last_triggered
            .is_none_or(|last| now.duration_since(last) >= self.duration)
    }
}

/// Returns true for events that may change the file's contents.
fn is_content_event(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Watches a file and calls `on_change` after debounced modifications.
///
/// The parent directory is watched so atomic replace-by-rename saves are
/// seen. Runs until the watcher channel closes.
pub async fn watch_file<F>(
    path: impl AsRef<Path>,
    config: WatcherConfig,
    on_change: F,
) -> Result<(), WatcherError>
where
    F: Fn() + Send + Sync + 'static,
{
    let path = path.as_ref();
    let canonical_path = path
        .canonicalize()
        .map_err(|_| WatcherError::PathNotFound(path.to_path_buf()))?;
    let watch_dir = canonical_path
        .parent()
        .unwrap_or(&canonical_path)
        .to_path_buf();
    let file_name = canonical_path.file_name().map(|s| s.to_owned());

    log::info!("Watching standards file: {}", canonical_path.display());

    let (tx, mut rx) = mpsc::channel::<Event>(100);
    let mut watcher = RecommendedWatcher::new(
        move |result: Result<Event, notify::Error>| {
            if let Ok(event) = result {
                // Drop events when the channel is full; one is enough to reload
                let _ = tx.try_send(event);
            }
        },
        notify::Config::default(),
    )?;
    watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;

    let on_change = Arc::new(on_change);
    let debouncer = Arc::new(Mutex::new(Debouncer::new(config.debounce_duration)));

    let tick_debouncer = debouncer.clone();
    let tick_callback = on_change.clone();
    let ticker = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(500));
        loop {
            interval.tick().await;
            let due = tick_debouncer.lock().await.on_tick(Instant::now());
            if due {
                log::info!("Debounced change, reloading standards");
                tick_callback();
            }
        }
    });

    while let Some(event) = rx.recv().await {
        let is_our_file = event.paths.iter().any(|p| match &file_name {
            Some(name) => p.file_name() == Some(name.as_os_str()),
            None => p == &canonical_path,
        });

        if !is_our_file || !is_content_event(&event.kind) {
            continue;
        }

        log::debug!("Standards file event: {:?}", event.kind);

        let fire = debouncer.lock().await.on_event(Instant::now());
        if fire {
            log::info!("Standards file changed, reloading");
            on_change();
        }
    }

    ticker.abort();
    Err(WatcherError::ChannelClosed)
}
