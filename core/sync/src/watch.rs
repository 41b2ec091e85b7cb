//! Debounced change sources for both sync directions.
//!
//! One abstraction parameterized by a root path and a callback,
//! instantiated once for the monitored plaintext root and once for the
//! encrypted mirror root.

use chrono::{DateTime, Utc};
use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use cryptsync_common::{Error, Result};

/// Duplicate-suppression window for repeated modifications of one path.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_secs(1);

/// Kind of filesystem change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
}

/// A single deduplicated file change. Consumed once.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    /// Absolute path of the changed file.
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub timestamp: DateTime<Utc>,
}

/// Debounced recursive directory watcher.
///
/// Raw notifications are pumped through a dedicated thread that suppresses
/// repeated modification events for the same path inside the debounce
/// window, then invokes the callback. Stopping joins the pump thread.
pub struct DirWatcher {
    watcher: Option<RecommendedWatcher>,
    pump: Option<std::thread::JoinHandle<()>>,
}

impl DirWatcher {
    /// Start watching `root` recursively, delivering events to `callback`.
    ///
    /// # Errors
    /// - `Error::Watch` if the OS watcher cannot be installed
    pub fn spawn<F>(root: &Path, window: Duration, callback: F) -> Result<Self>
    where
        F: Fn(ChangeEvent) + Send + 'static,
    {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut watcher = recommended_watcher(move |res| {
            let _ = tx.send(res);
        })
        .map_err(|e| Error::Watch(format!("cannot create watcher: {}", e)))?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| Error::Watch(format!("cannot watch {}: {}", root.display(), e)))?;

        let pump = std::thread::spawn(move || pump_events(rx, window, callback));

        info!("Started monitoring {}", root.display());
        Ok(Self {
            watcher: Some(watcher),
            pump: Some(pump),
        })
    }

    /// Stop watching and join the pump thread. Idempotent.
    pub fn stop(&mut self) {
        // Dropping the watcher drops the raw-event sender, which ends the
        // pump loop.
        self.watcher.take();
        if let Some(pump) = self.pump.take() {
            let _ = pump.join();
        }
    }
}

impl Drop for DirWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Pump raw notifications into debounced `ChangeEvent`s.
fn pump_events<F>(rx: Receiver<notify::Result<Event>>, window: Duration, callback: F)
where
    F: Fn(ChangeEvent),
{
    let mut last_seen: HashMap<PathBuf, Instant> = HashMap::new();

    while let Ok(res) = rx.recv() {
        let event = match res {
            Ok(event) => event,
            Err(e) => {
                warn!("Watcher error: {}", e);
                continue;
            }
        };

        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Modify(_) => ChangeKind::Modified,
            _ => continue,
        };

        for path in event.paths {
            if path.is_dir() {
                continue;
            }

            // Some filesystems fire several modification events per write;
            // creations always pass through.
            let now = Instant::now();
            if kind == ChangeKind::Modified {
                if let Some(prev) = last_seen.get(&path) {
                    if now.duration_since(*prev) < window {
                        continue;
                    }
                }
            }
            last_seen.insert(path.clone(), now);

            callback(ChangeEvent {
                path,
                kind,
                timestamp: Utc::now(),
            });
        }
    }
}
