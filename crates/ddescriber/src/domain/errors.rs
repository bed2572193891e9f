//! Domain-specific errors.

use thiserror::Error;

use crate::domain::model::NodeId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
    #[error("no suites or specs found")]
    NoTests,
    #[error("unknown jasmine syntax '{0}'")]
    UnknownSyntax(String),
    #[error("unknown scan pattern '{0}'")]
    UnknownPattern(String),
}

/// Raised when a replacement batch no longer fits the document it targets.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EditError {
    #[error("replacement {start}..{end} is outside a document of {len} bytes")]
    OutOfBounds { start: usize, end: usize, len: usize },
    #[error("replacement {start}..{end} does not fall on character boundaries")]
    NotCharBoundary { start: usize, end: usize },
}
