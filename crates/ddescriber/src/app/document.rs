//! An open JavaScript test file: its text, forest, and pending edits.

use std::path::Path;

use anyhow::{Context, Result};

use crate::app::finder::JasmineFinder;
use crate::app::hierarchy::{Hierarchy, TestForest};
use crate::app::pending::{self, ChangeSet};
use crate::app::projection::{FileId, FileProjection};
use crate::domain::errors::DomainError;
use crate::domain::model::{NodeId, PendingState, SyntaxVariant, TestCounts, TestNode};
use crate::infra::fs;

/// A scanned test file. The forest is rebuilt whenever the text changes.
#[derive(Debug, Clone)]
pub struct JasmineFile {
    file_id: FileId,
    text: String,
    forest: TestForest,
}

impl JasmineFile {
    pub fn from_text(file_id: FileId, text: impl Into<String>, finder: &JasmineFinder) -> Self {
        let text = text.into();
        let forest = finder.scan(&text);
        Self {
            file_id,
            text,
            forest,
        }
    }

    pub fn load(path: &Path, finder: &JasmineFinder) -> Result<Self> {
        let text = fs::read_document(path)?;
        Ok(Self::from_text(FileId::new(path), text, finder))
    }

    pub fn file_id(&self) -> &FileId {
        &self.file_id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn forest(&self) -> &TestForest {
        &self.forest
    }

    pub fn counts(&self) -> TestCounts {
        self.forest.counts()
    }

    pub fn has_focused(&self) -> bool {
        self.forest.has_focused()
    }

    pub fn node(&self, id: NodeId) -> Result<&TestNode, DomainError> {
        self.forest.get(id)
    }

    /// Closest node to a 1-based line; `None` when the file has no suites or specs.
    pub fn closest_node(&self, cursor_line: usize) -> Option<NodeId> {
        self.forest.closest(cursor_line)
    }

    pub fn hierarchy_of(&self, id: NodeId) -> Result<Hierarchy, DomainError> {
        self.forest.hierarchy(id)
    }

    /// Hierarchy around the node closest to the cursor.
    pub fn hierarchy_at(&self, cursor_line: usize) -> Result<Hierarchy, DomainError> {
        let closest = self.closest_node(cursor_line).ok_or(DomainError::NoTests)?;
        self.hierarchy_of(closest)
    }

    pub fn set_pending(&mut self, id: NodeId, state: PendingState) -> Result<(), DomainError> {
        pending::set_pending(&mut self.forest, id, state)
    }

    /// Mark every focused or excluded node for rollback.
    pub fn mark_clean(&mut self) -> Vec<NodeId> {
        pending::mark_clean(&mut self.forest)
    }

    pub fn pending_nodes(&self) -> Vec<NodeId> {
        pending::pending_nodes(&self.forest)
    }

    /// Apply every pending change to the text in one batch and rescan.
    pub fn commit(&mut self, syntax: SyntaxVariant, finder: &JasmineFinder) -> Result<ChangeSet> {
        let ids = self.pending_nodes();
        let changes = ChangeSet::plan(&self.forest, &ids, syntax)?;

        let mut text = self.text.clone();
        changes
            .apply_to(&mut text)
            .with_context(|| format!("failed to apply changes to {}", self.file_id))?;

        self.text = text;
        self.forest = finder.scan(&self.text);
        tracing::info!(file = %self.file_id, changes = changes.len(), "committed pending changes");
        Ok(changes)
    }

    /// Write the current text back to the file it was loaded from.
    pub fn save(&self) -> Result<()> {
        fs::write_document(self.file_id.path(), &self.text)
    }

    pub fn to_projection(&self) -> FileProjection {
        FileProjection::new(self.file_id.clone(), self.forest.clone())
    }
}
