//! Pending include/exclude/rollback changes and the text edits that apply them.

use serde::Serialize;

use crate::app::hierarchy::TestForest;
use crate::domain::errors::{DomainError, EditError};
use crate::domain::model::{NodeId, PendingState, SyntaxVariant, TestNode, TestState};

/// Record a pending transition on a node. Any state may be set on suites and specs alike.
pub fn set_pending(
    forest: &mut TestForest,
    id: NodeId,
    state: PendingState,
) -> Result<(), DomainError> {
    forest.get_mut(id)?.pending_state = state;
    Ok(())
}

/// Mark every focused or excluded node for rollback and return the affected ids.
pub fn mark_clean(forest: &mut TestForest) -> Vec<NodeId> {
    forest
        .iter_mut()
        .filter(|node| node.original_state != TestState::Normal)
        .map(|node| {
            node.pending_state = PendingState::Rollback;
            node.id
        })
        .collect()
}

/// Ids of nodes carrying a pending change, in source order.
pub fn pending_nodes(forest: &TestForest) -> Vec<NodeId> {
    forest
        .iter()
        .filter(|node| node.pending_state != PendingState::Unset)
        .map(|node| node.id)
        .collect()
}

/// Keyword text, including the opening parenthesis, that replaces the node's match.
pub fn resolve_replacement_text(node: &TestNode, syntax: SyntaxVariant) -> &'static str {
    match (node.pending_state, node.is_suite()) {
        (PendingState::Exclude, true) => "xdescribe(",
        (PendingState::Exclude, false) => "xit(",
        (PendingState::Include, true) => syntax.included_describe(),
        (PendingState::Include, false) => syntax.included_it(),
        (PendingState::Rollback | PendingState::Unset, true) => "describe(",
        (PendingState::Rollback | PendingState::Unset, false) => "it(",
    }
}

/// A single keyword rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Replacement {
    pub node: NodeId,
    pub start: usize,
    pub end: usize,
    pub text: &'static str,
}

/// Destination of a [`ChangeSet`].
pub trait TextBuffer {
    fn byte_len(&self) -> usize;
    fn is_char_boundary(&self, index: usize) -> bool;
    fn replace_range(&mut self, start: usize, end: usize, text: &str);
}

impl TextBuffer for String {
    fn byte_len(&self) -> usize {
        self.len()
    }

    fn is_char_boundary(&self, index: usize) -> bool {
        self.as_str().is_char_boundary(index)
    }

    fn replace_range(&mut self, start: usize, end: usize, text: &str) {
        String::replace_range(self, start..end, text);
    }
}

/// Ordered batch of replacements, highest offset first, so applying one entry never shifts an
/// entry that has not been applied yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    replacements: Vec<Replacement>,
}

impl ChangeSet {
    /// Plan the replacements for the given nodes. Duplicate ids are collapsed.
    pub fn plan(
        forest: &TestForest,
        ids: &[NodeId],
        syntax: SyntaxVariant,
    ) -> Result<Self, DomainError> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let mut replacements = ids
            .into_iter()
            .map(|id| {
                let node = forest.get(id)?;
                Ok(Replacement {
                    node: id,
                    start: node.start_offset,
                    end: node.end_offset,
                    text: resolve_replacement_text(node, syntax),
                })
            })
            .collect::<Result<Vec<_>, DomainError>>()?;

        replacements.sort_by(|left, right| {
            right
                .start
                .cmp(&left.start)
                .then_with(|| right.end.cmp(&left.end))
        });

        Ok(Self { replacements })
    }

    pub fn len(&self) -> usize {
        self.replacements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }

    pub fn replacements(&self) -> &[Replacement] {
        &self.replacements
    }

    /// Hand every replacement to `apply` in application order.
    pub fn apply_with(&self, mut apply: impl FnMut(usize, usize, &str)) {
        for replacement in &self.replacements {
            apply(replacement.start, replacement.end, replacement.text);
        }
    }

    /// Apply the batch to a buffer. Every range is checked before the buffer is touched, so the
    /// buffer is either fully updated or left as it was.
    pub fn apply_to<B: TextBuffer + ?Sized>(&self, buffer: &mut B) -> Result<(), EditError> {
        let len = buffer.byte_len();
        for Replacement { start, end, .. } in &self.replacements {
            let (start, end) = (*start, *end);
            if start > end || end > len {
                return Err(EditError::OutOfBounds { start, end, len });
            }
            if !buffer.is_char_boundary(start) || !buffer.is_char_boundary(end) {
                return Err(EditError::NotCharBoundary { start, end });
            }
        }

        self.apply_with(|start, end, text| buffer.replace_range(start, end, text));
        Ok(())
    }
}

/// Plan, apply, and clear the pending state of the given nodes.
///
/// The forest's offsets must describe the document `apply` edits; callers rescan before
/// committing and after it, since the edits shift every later offset.
pub fn commit_changes(
    forest: &mut TestForest,
    ids: &[NodeId],
    syntax: SyntaxVariant,
    apply: impl FnMut(usize, usize, &str),
) -> Result<ChangeSet, DomainError> {
    let changes = ChangeSet::plan(forest, ids, syntax)?;
    changes.apply_with(apply);
    for replacement in changes.replacements() {
        forest.get_mut(replacement.node)?.pending_state = PendingState::Unset;
    }
    tracing::info!(changes = changes.len(), syntax = syntax.as_str(), "committed changes");
    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::finder::{JasmineFinder, ScanPattern};
    use crate::domain::model::{Keyword, MatchRecord};

    fn single(keyword: Keyword, pending: PendingState) -> TestForest {
        let record = MatchRecord {
            offset: 0,
            end_offset: keyword.as_str().len() + 1,
            line_number: 1,
            keyword,
        };
        let mut forest = TestForest::build(&[record], |_| 0, |_| String::new());
        set_pending(&mut forest, NodeId(0), pending).unwrap();
        forest
    }

    fn resolve(keyword: Keyword, pending: PendingState, syntax: SyntaxVariant) -> &'static str {
        let forest = single(keyword, pending);
        resolve_replacement_text(forest.node(NodeId(0)).unwrap(), syntax)
    }

    #[test]
    fn replacement_table() {
        use PendingState::*;
        use SyntaxVariant::*;

        let cases = [
            (Keyword::Describe, Exclude, Jasmine1, "xdescribe("),
            (Keyword::Describe, Exclude, Jasmine2, "xdescribe("),
            (Keyword::It, Exclude, Jasmine1, "xit("),
            (Keyword::Iit, Exclude, Jasmine2, "xit("),
            (Keyword::Describe, Include, Jasmine1, "ddescribe("),
            (Keyword::Describe, Include, Jasmine2, "fdescribe("),
            (Keyword::It, Include, Jasmine1, "iit("),
            (Keyword::It, Include, Jasmine2, "fit("),
            (Keyword::Ddescribe, Rollback, Jasmine1, "describe("),
            (Keyword::Ddescribe, Rollback, Jasmine2, "describe("),
            (Keyword::Iit, Rollback, Jasmine2, "it("),
            (Keyword::Describe, Unset, Jasmine2, "describe("),
            (Keyword::It, Unset, Jasmine1, "it("),
        ];

        for (keyword, pending, syntax, expected) in cases {
            assert_eq!(
                resolve(keyword, pending, syntax),
                expected,
                "{keyword:?} {pending:?} {syntax:?}"
            );
        }
    }

    #[test]
    fn set_pending_rejects_unknown_nodes() {
        let mut forest = TestForest::default();
        assert_eq!(
            set_pending(&mut forest, NodeId(3), PendingState::Include),
            Err(DomainError::UnknownNode(NodeId(3)))
        );
    }

    #[test]
    fn plan_orders_from_the_end_of_the_document() {
        let records = [
            MatchRecord {
                offset: 50,
                end_offset: 53,
                line_number: 2,
                keyword: Keyword::It,
            },
            MatchRecord {
                offset: 100,
                end_offset: 103,
                line_number: 4,
                keyword: Keyword::It,
            },
        ];
        let mut forest = TestForest::build(&records, |_| 0, |_| String::new());
        set_pending(&mut forest, NodeId(0), PendingState::Include).unwrap();
        set_pending(&mut forest, NodeId(1), PendingState::Exclude).unwrap();

        let changes =
            ChangeSet::plan(&forest, &[NodeId(0), NodeId(1), NodeId(0)], SyntaxVariant::Jasmine2)
                .unwrap();
        let starts: Vec<_> = changes.replacements().iter().map(|r| r.start).collect();
        assert_eq!(starts, vec![100, 50]);
    }

    #[test]
    fn commit_matches_applying_from_the_tail() {
        let text = "describe('a', function () {\n  it('b');\n  it('c');\n});\n".to_string();
        let mut forest = JasmineFinder::new(ScanPattern::Classic).unwrap().scan(&text);
        set_pending(&mut forest, NodeId(1), PendingState::Include).unwrap();
        set_pending(&mut forest, NodeId(2), PendingState::Exclude).unwrap();

        let mut applied = Vec::new();
        let mut edited = text.clone();
        let changes = commit_changes(
            &mut forest,
            &[NodeId(1), NodeId(2)],
            SyntaxVariant::Jasmine2,
            |start, end, replacement| {
                applied.push(start);
                edited.replace_range(start..end, replacement);
            },
        )
        .unwrap();

        assert_eq!(changes.len(), 2);
        assert!(applied[0] > applied[1]);
        assert_eq!(edited, "describe('a', function () {\n  fit('b');\n  xit('c');\n});\n");
        assert!(pending_nodes(&forest).is_empty());
    }

    #[test]
    fn apply_to_validates_before_editing() {
        let record = MatchRecord {
            offset: 10,
            end_offset: 13,
            line_number: 1,
            keyword: Keyword::It,
        };
        let mut forest = TestForest::build(&[record], |_| 0, |_| String::new());
        set_pending(&mut forest, NodeId(0), PendingState::Exclude).unwrap();
        let changes = ChangeSet::plan(&forest, &[NodeId(0)], SyntaxVariant::Jasmine1).unwrap();

        let mut short = String::from("it(");
        assert_eq!(
            changes.apply_to(&mut short),
            Err(EditError::OutOfBounds { start: 10, end: 13, len: 3 })
        );
        assert_eq!(short, "it(");
    }

    #[test]
    fn mark_clean_rolls_back_marked_nodes() {
        let text = "ddescribe('a', function () {\n  iit('b');\n  it('c');\n});\n".to_string();
        let mut forest = JasmineFinder::new(ScanPattern::Classic).unwrap().scan(&text);
        let marked = mark_clean(&mut forest);
        assert_eq!(marked, vec![NodeId(0), NodeId(1)]);

        let mut edited = text.clone();
        ChangeSet::plan(&forest, &marked, SyntaxVariant::Jasmine1)
            .unwrap()
            .apply_to(&mut edited)
            .unwrap();
        assert_eq!(edited, "describe('a', function () {\n  it('b');\n  it('c');\n});\n");
    }
}
