//! Project wide view of files that contain focused suites or specs.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};

use serde::Serialize;

use crate::app::hierarchy::TestForest;
use crate::domain::model::TestCounts;

/// Identity of a scanned file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct FileId(PathBuf);

impl FileId {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// File name used as the label of the file's node.
    pub fn label(&self) -> String {
        self.0
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| self.0.display().to_string())
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// A file's forest as shown in the project tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileProjection {
    pub file_id: FileId,
    pub label: String,
    pub forest: TestForest,
    pub counts: TestCounts,
    pub has_focused: bool,
}

impl FileProjection {
    pub fn new(file_id: FileId, forest: TestForest) -> Self {
        Self {
            label: file_id.label(),
            counts: forest.counts(),
            has_focused: forest.has_focused(),
            file_id,
            forest,
        }
    }
}

/// What happened to a file's entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "lowercase")]
pub enum ProjectionChange {
    Added { projection: FileProjection },
    Updated { projection: FileProjection },
    Removed,
}

/// Notification sent to subscribers after the tree changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectionEvent {
    pub file_id: FileId,
    #[serde(flatten)]
    pub change: ProjectionChange,
}

/// Tree with a synthetic root whose children are one entry per file.
#[derive(Debug)]
pub struct ProjectTree {
    root_label: String,
    files: Vec<FileProjection>,
    subscribers: Vec<Sender<ProjectionEvent>>,
}

impl Default for ProjectTree {
    fn default() -> Self {
        Self::new("All tests")
    }
}

impl ProjectTree {
    pub fn new(root_label: impl Into<String>) -> Self {
        Self {
            root_label: root_label.into(),
            files: Vec::new(),
            subscribers: Vec::new(),
        }
    }

    pub fn root_label(&self) -> &str {
        &self.root_label
    }

    pub fn files(&self) -> &[FileProjection] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, file_id: &FileId) -> Option<&FileProjection> {
        self.position(file_id).map(|idx| &self.files[idx])
    }

    /// Register a receiver for subsequent changes. Dropped receivers are pruned on the next
    /// event.
    pub fn subscribe(&mut self) -> Receiver<ProjectionEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    /// Append a file under the root. A file already present is replaced in place.
    pub fn add_file(&mut self, projection: FileProjection) {
        if let Some(idx) = self.position(&projection.file_id) {
            self.replace_at(idx, projection);
            return;
        }
        self.append(projection);
    }

    /// Insert, replace, or drop a file depending on whether it still has focused nodes.
    pub fn update_file(&mut self, projection: FileProjection) {
        let found = self.position(&projection.file_id);

        if projection.has_focused {
            match found {
                Some(idx) => self.replace_at(idx, projection),
                None => self.append(projection),
            }
            return;
        }

        if found.is_some() {
            self.remove_file(&projection.file_id);
        }
    }

    /// Remove a file; unknown ids are ignored.
    pub fn remove_file(&mut self, file_id: &FileId) {
        let Some(idx) = self.position(file_id) else {
            return;
        };
        let removed = self.files.remove(idx);
        tracing::info!(file = %removed.file_id, "removed file from project tree");
        self.emit(ProjectionEvent {
            file_id: removed.file_id,
            change: ProjectionChange::Removed,
        });
    }

    /// Drop every entry and feed the new projections through [`Self::update_file`].
    pub fn refresh(&mut self, projections: impl IntoIterator<Item = FileProjection>) {
        let previous: Vec<FileId> = self.files.iter().map(|f| f.file_id.clone()).collect();
        for file_id in previous {
            self.remove_file(&file_id);
        }
        for projection in projections {
            self.update_file(projection);
        }
        tracing::debug!(files = self.files.len(), "refreshed project tree");
    }

    fn position(&self, file_id: &FileId) -> Option<usize> {
        self.files.iter().position(|file| &file.file_id == file_id)
    }

    fn append(&mut self, projection: FileProjection) {
        tracing::info!(file = %projection.file_id, "added file to project tree");
        self.files.push(projection.clone());
        self.emit(ProjectionEvent {
            file_id: projection.file_id.clone(),
            change: ProjectionChange::Added { projection },
        });
    }

    fn replace_at(&mut self, idx: usize, projection: FileProjection) {
        tracing::debug!(file = %projection.file_id, "updated file in project tree");
        self.files[idx] = projection.clone();
        self.emit(ProjectionEvent {
            file_id: projection.file_id.clone(),
            change: ProjectionChange::Updated { projection },
        });
    }

    fn emit(&mut self, event: ProjectionEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
}
