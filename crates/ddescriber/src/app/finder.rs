//! Locating suites and specs in JavaScript test sources.

use std::str::FromStr;

use anyhow::{Context, Result};
use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::app::hierarchy::TestForest;
use crate::domain::errors::DomainError;
use crate::domain::model::{Keyword, MatchRecord};

/// Plain keywords and the Jasmine 1 focus keywords.
pub const CLASSIC_PATTERN: &str = r"iit\(|ddescribe\(|it\(|describe\(";

/// Classic keywords plus the Jasmine 2 focus keywords `fdescribe` and `fit`. The `f` forms must
/// start a word; inside identifiers such as `benefit(` only the trailing `it(` matches.
pub const FOCUS_PATTERN: &str = r"\bfit\(|iit\(|\bfdescribe\(|ddescribe\(|it\(|describe\(";

/// Also recognizes the `f` and `x` prefixed keywords.
pub const EXTENDED_PATTERN: &str = r"\b(?:[fx]?describe|ddescribe|[fx]?it|iit)\(";

/// Which keyword set the scanner searches for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum ScanPattern {
    Classic,
    #[default]
    Focus,
    Extended,
}

impl ScanPattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanPattern::Classic => "classic",
            ScanPattern::Focus => "focus",
            ScanPattern::Extended => "extended",
        }
    }

    pub fn regex_source(&self) -> &'static str {
        match self {
            ScanPattern::Classic => CLASSIC_PATTERN,
            ScanPattern::Focus => FOCUS_PATTERN,
            ScanPattern::Extended => EXTENDED_PATTERN,
        }
    }
}

impl FromStr for ScanPattern {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "classic" => Ok(ScanPattern::Classic),
            "focus" => Ok(ScanPattern::Focus),
            "extended" => Ok(ScanPattern::Extended),
            other => Err(DomainError::UnknownPattern(other.to_string())),
        }
    }
}

/// Maps byte offsets to 1-based lines and measures line indentation.
#[derive(Debug, Clone)]
pub struct LineIndex<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, byte)| *byte == b'\n')
                .map(|(idx, _)| idx + 1),
        );
        Self { text, line_starts }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Line containing `offset`. Offsets past the end resolve to the last line.
    pub fn offset_to_line(&self, offset: usize) -> usize {
        self.line_starts.partition_point(|start| *start <= offset)
    }

    /// Text of a 1-based line without its line terminator.
    pub fn line_text(&self, line: usize) -> &'a str {
        let Some(start) = line.checked_sub(1).and_then(|idx| self.line_starts.get(idx)) else {
            return "";
        };
        let end = self
            .line_starts
            .get(line)
            .map(|next| next - 1)
            .unwrap_or(self.text.len());
        self.text[*start..end].trim_end_matches('\r')
    }

    /// Number of leading whitespace characters on a 1-based line.
    pub fn line_indentation(&self, line: usize) -> usize {
        self.line_text(line)
            .chars()
            .take_while(|ch| *ch == ' ' || *ch == '\t')
            .count()
    }

    pub fn indentation_at(&self, offset: usize) -> usize {
        self.line_indentation(self.offset_to_line(offset))
    }
}

/// Regex based scanner producing [`MatchRecord`]s in ascending offset order.
#[derive(Debug, Clone)]
pub struct JasmineFinder {
    pattern: ScanPattern,
    regex: Regex,
}

impl JasmineFinder {
    pub fn new(pattern: ScanPattern) -> Result<Self> {
        let regex = Regex::new(pattern.regex_source())
            .with_context(|| format!("invalid {} scan pattern", pattern.as_str()))?;
        Ok(Self { pattern, regex })
    }

    pub fn pattern(&self) -> ScanPattern {
        self.pattern
    }

    /// Every non-overlapping keyword match in the text.
    pub fn find_all(&self, text: &str) -> Vec<MatchRecord> {
        let index = LineIndex::new(text);
        self.find_with_index(text, &index)
    }

    fn find_with_index(&self, text: &str, index: &LineIndex<'_>) -> Vec<MatchRecord> {
        self.regex
            .find_iter(text)
            .filter_map(|found| {
                let keyword = Keyword::from_match(found.as_str())?;
                Some(MatchRecord {
                    offset: found.start(),
                    end_offset: found.end(),
                    line_number: index.offset_to_line(found.start()),
                    keyword,
                })
            })
            .collect()
    }

    /// Scan a document and rebuild its suite/spec forest.
    pub fn scan(&self, text: &str) -> TestForest {
        let index = LineIndex::new(text);
        let matches = self.find_with_index(text, &index);
        let forest = TestForest::build(
            &matches,
            |offset| index.indentation_at(offset),
            |record| {
                title_after(text, record.end_offset)
                    .unwrap_or_else(|| index.line_text(record.line_number).trim().to_string())
            },
        );
        tracing::debug!(
            pattern = self.pattern.as_str(),
            matches = matches.len(),
            roots = forest.roots().len(),
            "scanned document"
        );
        forest
    }
}

/// First string literal following a keyword, e.g. `'adds numbers'` in `it('adds numbers', ...)`.
fn title_after(text: &str, from: usize) -> Option<String> {
    let rest = text.get(from..)?.trim_start();
    let mut chars = rest.chars();
    let quote = chars.next().filter(|ch| matches!(ch, '\'' | '"' | '`'))?;

    let mut title = String::new();
    let mut escaped = false;
    for ch in chars {
        if escaped {
            title.push(ch);
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == quote {
            return Some(title);
        } else {
            title.push(ch);
        }
    }
    None
}
