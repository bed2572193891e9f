//! Keeping the project tree current while files change on disk.

use std::path::Path;
use std::sync::mpsc;

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::app::project::{PathFilter, ProjectConfig, ProjectScanner};
use crate::app::projection::{FileId, ProjectTree};

/// Applies file-system changes to a [`ProjectTree`].
#[derive(Debug)]
pub struct ProjectWatcher {
    scanner: ProjectScanner,
    filter: PathFilter,
    cfg: ProjectConfig,
}

impl ProjectWatcher {
    pub fn new(scanner: ProjectScanner, cfg: ProjectConfig) -> Result<Self> {
        let filter = PathFilter::new(&cfg)?;
        Ok(Self {
            scanner,
            filter,
            cfg,
        })
    }

    /// Rebuild the whole tree.
    pub fn refresh(&self, tree: &mut ProjectTree) -> Result<()> {
        self.scanner.refresh(&self.cfg, tree)
    }

    /// Rescan one changed path and update its entry. Files that are deleted, emptied, or no
    /// longer pass the walk's rules are removed.
    pub fn apply_path_change(&self, tree: &mut ProjectTree, path: &Path) {
        let file_id = FileId::new(path);
        if !self.filter.accepts_file(path) {
            tree.remove_file(&file_id);
            return;
        }

        match self.scanner.scan_path(path) {
            Some(file) => tree.update_file(file.to_projection()),
            None => tree.remove_file(&file_id),
        }
    }

    pub fn apply_event(&self, tree: &mut ProjectTree, event: &Event) {
        if matches!(event.kind, EventKind::Access(_)) {
            return;
        }
        for path in &event.paths {
            self.apply_path_change(tree, path);
        }
    }

    /// Refresh, then process file-system events until the watcher shuts down.
    ///
    /// Events are handled one at a time on the calling thread; the notify backend only forwards
    /// them over a channel.
    pub fn run(&self, tree: &mut ProjectTree) -> Result<()> {
        self.refresh(tree)?;

        let (tx, rx) = mpsc::channel::<notify::Result<Event>>();
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            notify::Config::default(),
        )
        .context("failed to create filesystem watcher")?;
        watcher
            .watch(&self.cfg.root, RecursiveMode::Recursive)
            .with_context(|| format!("failed to watch {}", self.cfg.root.display()))?;
        tracing::info!(root = %self.cfg.root.display(), "watching for changes");

        for res in rx {
            match res {
                Ok(event) => self.apply_event(tree, &event),
                Err(err) => tracing::warn!(error = %err, "watch error"),
            }
        }
        Ok(())
    }
}
