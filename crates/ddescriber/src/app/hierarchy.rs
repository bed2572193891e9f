//! Rebuilding the suite/spec tree of a document from indentation.
//!
//! Nodes live in an arena ordered by source offset. Nesting is inferred from the indentation of
//! the line holding each match, so unbalanced indentation produces a flatter forest rather than
//! an error.

use serde::Serialize;

use crate::domain::errors::DomainError;
use crate::domain::model::{MatchRecord, NodeId, PendingState, TestCounts, TestNode, TestState};

/// Suites and specs of a single document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TestForest {
    nodes: Vec<TestNode>,
    roots: Vec<NodeId>,
}

/// A node together with its sibling specs and enclosing suites, in source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hierarchy {
    pub closest: NodeId,
    pub matches: Vec<NodeId>,
}

impl TestForest {
    /// Build the forest from matches sorted by ascending offset.
    ///
    /// `indentation_of` resolves the indentation of the line holding a match offset and
    /// `title_of` the text shown for the node.
    pub fn build(
        matches: &[MatchRecord],
        indentation_of: impl Fn(usize) -> usize,
        title_of: impl Fn(&MatchRecord) -> String,
    ) -> Self {
        let mut forest = Self {
            nodes: Vec::with_capacity(matches.len()),
            roots: Vec::new(),
        };
        let mut open_suites: Vec<NodeId> = Vec::new();

        for record in matches {
            let id = NodeId(forest.nodes.len());
            let indentation = indentation_of(record.offset);

            while let Some(top) = open_suites.last() {
                if forest.nodes[top.0].indentation >= indentation {
                    open_suites.pop();
                } else {
                    break;
                }
            }

            let parent = open_suites.last().copied();
            match parent {
                Some(parent_id) => forest.nodes[parent_id.0].children.push(id),
                None => forest.roots.push(id),
            }

            let kind = record.keyword.kind();
            forest.nodes.push(TestNode {
                id,
                kind,
                keyword: record.keyword,
                original_state: record.keyword.original_state(),
                pending_state: PendingState::Unset,
                line_number: record.line_number,
                indentation,
                start_offset: record.offset,
                end_offset: record.end_offset,
                display_text: title_of(record),
                parent,
                children: Vec::new(),
            });

            if forest.nodes[id.0].is_suite() {
                open_suites.push(id);
            }
        }

        forest
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node(&self, id: NodeId) -> Option<&TestNode> {
        self.nodes.get(id.0)
    }

    pub fn get(&self, id: NodeId) -> Result<&TestNode, DomainError> {
        self.node(id).ok_or(DomainError::UnknownNode(id))
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Result<&mut TestNode, DomainError> {
        self.nodes.get_mut(id.0).ok_or(DomainError::UnknownNode(id))
    }

    /// Flat view of every node in source order.
    pub fn iter(&self) -> impl Iterator<Item = &TestNode> {
        self.nodes.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut TestNode> {
        self.nodes.iter_mut()
    }

    /// Depth-first traversal, parents before children.
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id.0].children.iter().rev().copied());
        }
        order
    }

    /// Nesting depth of a node; roots are at depth zero.
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut cursor = self.node(id).and_then(|node| node.parent);
        while let Some(parent) = cursor {
            depth += 1;
            cursor = self.node(parent).and_then(|node| node.parent);
        }
        depth
    }

    /// Node nearest to a 1-based cursor line.
    ///
    /// Walks the nodes in source order and stops at the first one that is not strictly closer
    /// than its predecessor, so the result is the first local minimum of the distance.
    pub fn closest(&self, cursor_line: usize) -> Option<NodeId> {
        let mut closest = None;
        let mut min_distance = usize::MAX;

        for node in &self.nodes {
            let distance = cursor_line.abs_diff(node.line_number);
            if distance < min_distance {
                closest = Some(node.id);
                min_distance = distance;
            } else {
                break;
            }
        }

        closest
    }

    /// The node, its neighbouring specs at the same indentation, and every enclosing suite.
    ///
    /// Suites do not pull in siblings. Ancestors are found by walking backwards and keeping each
    /// node indented less than the last one kept.
    pub fn hierarchy(&self, closest: NodeId) -> Result<Hierarchy, DomainError> {
        let target = self.get(closest)?;
        let index = closest.0;
        let indentation = target.indentation;

        let mut first = index;
        let mut last = index;
        if !target.is_suite() {
            while last + 1 < self.nodes.len() && self.nodes[last + 1].indentation == indentation {
                last += 1;
            }
            while first > 0 && self.nodes[first - 1].indentation == indentation {
                first -= 1;
            }
        }

        let mut ancestors = Vec::new();
        let mut current = indentation;
        for node in self.nodes[..index].iter().rev() {
            if node.indentation < current {
                ancestors.push(node.id);
                current = node.indentation;
            }
        }

        let matches = ancestors
            .into_iter()
            .rev()
            .chain((first..=last).map(NodeId))
            .collect();

        Ok(Hierarchy { closest, matches })
    }

    pub fn counts(&self) -> TestCounts {
        self.nodes.iter().fold(TestCounts::default(), |mut counts, node| {
            if node.is_suite() {
                counts.suites += 1;
            } else {
                counts.tests += 1;
            }
            match node.original_state {
                TestState::Focused => counts.focused += 1,
                TestState::Excluded => counts.excluded += 1,
                TestState::Normal => {}
            }
            counts
        })
    }

    /// Whether any suite or spec is marked to run exclusively.
    pub fn has_focused(&self) -> bool {
        self.nodes
            .iter()
            .any(|node| node.original_state == TestState::Focused)
    }
}
