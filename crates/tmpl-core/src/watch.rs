//! Polling watcher that keeps generated artifacts in step with their sources.
//!
//! Each tick re-walks the input tree and compares a `(mtime, len)`
//! fingerprint per source. Changed or new sources are recompiled one by one;
//! a vanished source has its artifact removed.

use crate::batch::{compile_directory, compile_file_to, compile_patterns, discover};
use crate::batch::{CompilationResult, CompileOptions};
use crate::error::Result;
use crate::paths;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(800);

#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub compile: CompileOptions,
    pub poll_interval: Duration,
}

impl WatchOptions {
    pub fn new(compile: CompileOptions) -> Self {
        Self {
            compile,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WatchEvent {
    Compiled { source: PathBuf, output: PathBuf },
    Removed { source: PathBuf, output: PathBuf },
    Failed { source: PathBuf, message: String },
}

impl WatchEvent {
    pub fn source(&self) -> &Path {
        match self {
            WatchEvent::Compiled { source, .. }
            | WatchEvent::Removed { source, .. }
            | WatchEvent::Failed { source, .. } => source,
        }
    }
}

// ---------------------------------------------------------------------------
// WatchHandle
// ---------------------------------------------------------------------------

pub struct WatchHandle {
    events: broadcast::Sender<WatchEvent>,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
    initial: CompilationResult,
}

impl WatchHandle {
    /// Events emitted after this call. Earlier events are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.events.subscribe()
    }

    /// Result of the full compile performed before polling started.
    pub fn initial(&self) -> &CompilationResult {
        &self.initial
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop polling and wait for the task to exit.
    pub async fn stop(mut self) {
        if let Some(tx) = self.stop.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            tracing::warn!("watch task ended abnormally: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// Fingerprints
// ---------------------------------------------------------------------------

type Fingerprint = (Option<SystemTime>, u64);

fn fingerprint_tree(dir: &Path, exclude: &[glob::Pattern]) -> Result<HashMap<PathBuf, Fingerprint>> {
    let mut prints = HashMap::new();
    for path in discover(dir, exclude)? {
        // A file removed between discovery and stat shows up next tick.
        if let Ok(meta) = std::fs::metadata(&path) {
            prints.insert(path, (meta.modified().ok(), meta.len()));
        }
    }
    Ok(prints)
}

// ---------------------------------------------------------------------------
// watch_directory
// ---------------------------------------------------------------------------

/// Compile the whole tree once, then poll for changes on a background task.
pub async fn watch_directory(options: WatchOptions) -> Result<WatchHandle> {
    let patterns = compile_patterns(&options.compile.exclude)?;
    let initial = compile_directory(&options.compile)?;
    let known = fingerprint_tree(&options.compile.input_dir, &patterns)?;

    let (events, _) = broadcast::channel(64);
    let (stop_tx, stop_rx) = oneshot::channel();

    tracing::info!(
        input = %options.compile.input_dir.display(),
        interval_ms = options.poll_interval.as_millis() as u64,
        "watching for template changes"
    );

    let task = tokio::spawn(poll_loop(options, patterns, known, events.clone(), stop_rx));

    Ok(WatchHandle {
        events,
        stop: Some(stop_tx),
        task,
        initial,
    })
}

async fn poll_loop(
    options: WatchOptions,
    patterns: Vec<glob::Pattern>,
    mut known: HashMap<PathBuf, Fingerprint>,
    events: broadcast::Sender<WatchEvent>,
    mut stop: oneshot::Receiver<()>,
) {
    let input = &options.compile.input_dir;
    let output = &options.compile.output_dir;

    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = tokio::time::sleep(options.poll_interval) => {}
        }

        let current = match fingerprint_tree(input, &patterns) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(input = %input.display(), "scan failed: {e}");
                continue;
            }
        };

        let mut changed: Vec<&PathBuf> = current
            .iter()
            .filter(|(path, print)| known.get(*path) != Some(*print))
            .map(|(path, _)| path)
            .collect();
        changed.sort();

        for source in changed {
            let event = match compile_file_to(source, input, output) {
                Ok(target) => {
                    tracing::info!(source = %source.display(), "recompiled");
                    WatchEvent::Compiled {
                        source: source.clone(),
                        output: target,
                    }
                }
                Err(e) => {
                    tracing::error!(source = %source.display(), "recompile failed: {e}");
                    WatchEvent::Failed {
                        source: source.clone(),
                        message: e.to_string(),
                    }
                }
            };
            let _ = events.send(event);
        }

        let mut removed: Vec<&PathBuf> = known.keys().filter(|p| !current.contains_key(*p)).collect();
        removed.sort();

        for source in removed {
            let target = paths::artifact_path(input, output, source);
            match crate::io::remove_if_exists(&target) {
                Ok(_) => {
                    tracing::info!(source = %source.display(), "source removed");
                    let _ = events.send(WatchEvent::Removed {
                        source: source.clone(),
                        output: target,
                    });
                }
                Err(e) => {
                    tracing::error!(output = %target.display(), "failed to remove artifact: {e}");
                    let _ = events.send(WatchEvent::Failed {
                        source: source.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        known = current;
    }

    tracing::info!(input = %input.display(), "watcher stopped");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
