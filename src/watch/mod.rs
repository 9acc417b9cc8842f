use anyhow::Result;
use glob::{MatchOptions, Pattern};
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

/// Events emitted by the file watcher
#[derive(Debug, Clone)]
pub enum WatchEvent {
    /// One or more files changed; time to re-measure
    FilesChanged(Vec<String>),
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Decides which changed paths are worth a threshold check
#[derive(Debug, Clone)]
pub struct PathFilter {
    root: PathBuf,
    ignore: Vec<Pattern>,
}

impl PathFilter {
    /// Invalid globs are skipped with a warning.
    pub fn new(root: &Path, ignore: &[String]) -> Self {
        let ignore = ignore
            .iter()
            .filter_map(|g| match Pattern::new(g) {
                Ok(p) => Some(p),
                Err(e) => {
                    log::warn!("Ignoring invalid watch pattern '{}': {}", g, e);
                    None
                }
            })
            .collect();
        PathFilter {
            root: root.to_path_buf(),
            ignore,
        }
    }

    pub fn accepts(&self, path: &Path) -> bool {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        let mut components = rel.components();

        // Allow .git/index (staging) and .git/refs/ (commits, new branches)
        // through but skip other .git/ noise (objects, logs, lock files)
        if components.next().map(|c| c.as_os_str()) == Some(OsStr::new(".git")) {
            let inner = components.as_path();
            return inner == Path::new("index") || inner.starts_with("refs");
        }

        !self
            .ignore
            .iter()
            .any(|p| p.matches_path_with(rel, MATCH_OPTIONS))
    }
}

/// A debounced file watcher that monitors a git working tree
pub struct FileWatcher {
    _watcher: notify_debouncer_mini::Debouncer<RecommendedWatcher>,
}

impl FileWatcher {
    /// Start watching a directory. Changed file events that pass `filter` are
    /// sent to the provided sender, debounced by `debounce_ms` milliseconds.
    pub fn new(
        root: &Path,
        debounce_ms: u64,
        filter: PathFilter,
        tx: mpsc::Sender<WatchEvent>,
    ) -> Result<Self> {
        let mut debouncer = new_debouncer(
            Duration::from_millis(debounce_ms),
            move |result: std::result::Result<Vec<notify_debouncer_mini::DebouncedEvent>, notify::Error>| {
                let events = match result {
                    Ok(events) => events,
                    Err(e) => {
                        log::warn!("File watcher error: {}", e);
                        return;
                    }
                };

                let paths: Vec<String> = events
                    .iter()
                    .filter(|e| e.kind == DebouncedEventKind::Any)
                    .filter(|e| filter.accepts(&e.path))
                    .map(|e| e.path.to_string_lossy().to_string())
                    .collect();

                if !paths.is_empty() && tx.send(WatchEvent::FilesChanged(paths)).is_err() {
                    log::debug!("Watch receiver gone, dropping event");
                }
            },
        )?;

        debouncer.watcher().watch(root, RecursiveMode::Recursive)?;

        Ok(FileWatcher {
            _watcher: debouncer,
        })
    }
}
