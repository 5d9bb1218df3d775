//! Source tree watcher.
//!
//! Debounced changes under the source directory are matched against watch
//! bindings in order; the first binding whose pattern matches decides what
//! happens to that file.

use crate::config::BuildConfig;
use crate::error::PipelineResult;
use crate::fileset::Glob;
use notify_debouncer_mini::{DebouncedEvent, DebouncedEventKind, new_debouncer};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;
use tokio::sync::mpsc as tokio_mpsc;
use tracing::{debug, error, info};

/// Tasks the watcher can rerun.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchTask {
    Style,
    Script,
    Page,
}

impl WatchTask {
    pub fn name(self) -> &'static str {
        match self {
            WatchTask::Style => "style",
            WatchTask::Script => "script",
            WatchTask::Page => "page",
        }
    }
}

/// What a matched change triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchAction {
    Run(WatchTask),
    Reload,
}

/// Patterns (relative to the source directory) and their action.
#[derive(Debug, Clone)]
pub struct WatchBinding {
    pub patterns: Vec<Glob>,
    pub action: WatchAction,
}

impl WatchBinding {
    pub fn new(patterns: &[&str], action: WatchAction) -> PipelineResult<Self> {
        let patterns = patterns
            .iter()
            .map(|p| Glob::new(p))
            .collect::<PipelineResult<Vec<_>>>()?;
        Ok(Self { patterns, action })
    }

    pub fn matches(&self, relative: &Path) -> bool {
        self.patterns.iter().any(|g| g.matches(relative))
    }
}

/// Bindings for the configured layout: style, script and page files rerun
/// their task; images, fonts and anything else reload the browser.
pub fn bindings_for(build: &BuildConfig) -> PipelineResult<Vec<WatchBinding>> {
    let paths = &build.paths;
    Ok(vec![
        WatchBinding::new(&[paths.style.as_str()], WatchAction::Run(WatchTask::Style))?,
        WatchBinding::new(&[paths.script.as_str()], WatchAction::Run(WatchTask::Script))?,
        WatchBinding::new(&[paths.page.as_str()], WatchAction::Run(WatchTask::Page))?,
        WatchBinding::new(
            &[paths.image.as_str(), paths.font.as_str()],
            WatchAction::Reload,
        )?,
        WatchBinding::new(&["**"], WatchAction::Reload)?,
    ])
}

/// Action of the first binding matching `relative`.
pub fn classify(bindings: &[WatchBinding], relative: &Path) -> Option<WatchAction> {
    bindings
        .iter()
        .find(|b| b.matches(relative))
        .map(|b| b.action)
}

/// Distinct actions for a batch of changed absolute paths, in first-seen
/// order. Paths outside `src` are ignored.
pub fn plan(bindings: &[WatchBinding], src: &Path, changed: &[PathBuf]) -> Vec<WatchAction> {
    let mut actions = Vec::new();
    for path in changed {
        let Ok(relative) = path.strip_prefix(src) else {
            continue;
        };
        if let Some(action) = classify(bindings, relative)
            && !actions.contains(&action)
        {
            debug!("{} -> {:?}", relative.display(), action);
            actions.push(action);
        }
    }
    actions
}

/// Configuration for the source watcher.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Debounce duration for coalescing rapid changes.
    pub debounce_duration: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_duration: Duration::from_millis(200),
        }
    }
}

/// Handle to a running watcher. Dropping it stops watching.
pub struct SourceWatcher {
    /// Batches of changed paths.
    pub changes: tokio_mpsc::UnboundedReceiver<Vec<PathBuf>>,
    _task_handle: tokio::task::JoinHandle<()>,
}

/// Watch `src` recursively.
pub fn watch_sources(src: &Path, config: WatcherConfig) -> Result<SourceWatcher, notify::Error> {
    let (changes_tx, changes_rx) = tokio_mpsc::unbounded_channel();
    let (notify_tx, notify_rx) = mpsc::channel();

    let mut debouncer = new_debouncer(config.debounce_duration, notify_tx)?;
    debouncer
        .watcher()
        .watch(src, notify::RecursiveMode::Recursive)?;
    info!("Watching {}", src.display());

    let task_handle = tokio::task::spawn_blocking(move || {
        // Keep the debouncer alive
        let _debouncer = debouncer;
        forward_events(notify_rx, changes_tx);
    });

    Ok(SourceWatcher {
        changes: changes_rx,
        _task_handle: task_handle,
    })
}

fn forward_events(
    rx: mpsc::Receiver<Result<Vec<DebouncedEvent>, notify::Error>>,
    tx: tokio_mpsc::UnboundedSender<Vec<PathBuf>>,
) {
    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let paths: Vec<PathBuf> = events
                    .into_iter()
                    .filter(|e| {
                        matches!(
                            e.kind,
                            DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous
                        )
                    })
                    .map(|e| e.path)
                    .collect();
                if paths.is_empty() {
                    continue;
                }
                if tx.send(paths).is_err() {
                    info!("Source watcher receiver dropped, stopping");
                    return;
                }
            }
            Ok(Err(e)) => error!("File watcher error: {}", e),
            Err(_) => {
                info!("Source watcher channel closed, stopping");
                return;
            }
        }
    }
}
