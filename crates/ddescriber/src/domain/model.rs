//! Domain models for Jasmine suites, specs, and their focus state.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

/// Keyword recognized at the start of a suite or spec call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Keyword {
    It,
    Iit,
    Fit,
    Xit,
    Describe,
    Ddescribe,
    Fdescribe,
    Xdescribe,
}

impl Keyword {
    /// Classify matched text such as `iit(` or `describe(`. The trailing parenthesis and any
    /// whitespace before it are ignored.
    pub fn from_match(matched: &str) -> Option<Self> {
        let word = matched.trim_end_matches('(').trim_end();
        let keyword = match word {
            "it" => Keyword::It,
            "iit" => Keyword::Iit,
            "fit" => Keyword::Fit,
            "xit" => Keyword::Xit,
            "describe" => Keyword::Describe,
            "ddescribe" => Keyword::Ddescribe,
            "fdescribe" => Keyword::Fdescribe,
            "xdescribe" => Keyword::Xdescribe,
            _ => return None,
        };
        Some(keyword)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::It => "it",
            Keyword::Iit => "iit",
            Keyword::Fit => "fit",
            Keyword::Xit => "xit",
            Keyword::Describe => "describe",
            Keyword::Ddescribe => "ddescribe",
            Keyword::Fdescribe => "fdescribe",
            Keyword::Xdescribe => "xdescribe",
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Keyword::Describe | Keyword::Ddescribe | Keyword::Fdescribe | Keyword::Xdescribe => {
                NodeKind::Suite
            }
            Keyword::It | Keyword::Iit | Keyword::Fit | Keyword::Xit => NodeKind::Test,
        }
    }

    /// State the source text was in when it was scanned.
    pub fn original_state(&self) -> TestState {
        match self {
            Keyword::Iit | Keyword::Fit | Keyword::Ddescribe | Keyword::Fdescribe => {
                TestState::Focused
            }
            Keyword::Xit | Keyword::Xdescribe => TestState::Excluded,
            Keyword::It | Keyword::Describe => TestState::Normal,
        }
    }
}

/// Raw match produced by the scanner. Offsets are byte offsets into the document and
/// `line_number` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatchRecord {
    pub offset: usize,
    pub end_offset: usize,
    pub line_number: usize,
    pub keyword: Keyword,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Suite,
    Test,
}

/// State of a node as found in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestState {
    Normal,
    Focused,
    Excluded,
}

/// Transition requested for a node but not yet written to the document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingState {
    #[default]
    Unset,
    Include,
    Exclude,
    Rollback,
}

/// Jasmine focus keyword spelling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum SyntaxVariant {
    /// Jasmine 1: `ddescribe` and `iit`.
    Jasmine1,
    /// Jasmine 2: `fdescribe` and `fit`.
    #[default]
    Jasmine2,
}

impl SyntaxVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyntaxVariant::Jasmine1 => "jasmine1",
            SyntaxVariant::Jasmine2 => "jasmine2",
        }
    }

    /// Replacement used to focus a suite.
    pub fn included_describe(&self) -> &'static str {
        match self {
            SyntaxVariant::Jasmine1 => "ddescribe(",
            SyntaxVariant::Jasmine2 => "fdescribe(",
        }
    }

    /// Replacement used to focus a spec.
    pub fn included_it(&self) -> &'static str {
        match self {
            SyntaxVariant::Jasmine1 => "iit(",
            SyntaxVariant::Jasmine2 => "fit(",
        }
    }
}

impl FromStr for SyntaxVariant {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "jasmine1" | "1" | "v1" => Ok(SyntaxVariant::Jasmine1),
            "jasmine2" | "2" | "v2" => Ok(SyntaxVariant::Jasmine2),
            other => Err(DomainError::UnknownSyntax(other.to_string())),
        }
    }
}

/// Index of a node inside a [`crate::app::hierarchy::TestForest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A suite or spec found in a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub keyword: Keyword,
    pub original_state: TestState,
    pub pending_state: PendingState,
    pub line_number: usize,
    pub indentation: usize,
    pub start_offset: usize,
    pub end_offset: usize,
    pub display_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeId>,
}

impl TestNode {
    pub fn is_suite(&self) -> bool {
        self.kind == NodeKind::Suite
    }

    /// State the node will be in once pending changes are committed.
    pub fn effective_state(&self) -> TestState {
        match self.pending_state {
            PendingState::Unset => self.original_state,
            PendingState::Include => TestState::Focused,
            PendingState::Exclude => TestState::Excluded,
            PendingState::Rollback => TestState::Normal,
        }
    }
}

/// Per-document tallies shown next to the tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TestCounts {
    pub suites: usize,
    pub tests: usize,
    pub focused: usize,
    pub excluded: usize,
}
