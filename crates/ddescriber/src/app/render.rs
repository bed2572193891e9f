//! Plain text rendering of forests, hierarchies, and the project tree.

use std::fmt::Write;

use crate::app::hierarchy::{Hierarchy, TestForest};
use crate::app::projection::ProjectTree;
use crate::domain::model::{NodeId, PendingState, TestCounts, TestNode, TestState};

const INDENT: &str = "  ";

fn node_line(node: &TestNode, depth: usize, selected: bool) -> String {
    let mut line = format!(
        "{}{}{} '{}' (line {})",
        INDENT.repeat(depth),
        if selected { "> " } else { "" },
        node.keyword.as_str(),
        node.display_text,
        node.line_number
    );
    match node.original_state {
        TestState::Focused => line.push_str(" [focused]"),
        TestState::Excluded => line.push_str(" [excluded]"),
        TestState::Normal => {}
    }
    let pending = match node.pending_state {
        PendingState::Unset => None,
        PendingState::Include => Some("include"),
        PendingState::Exclude => Some("exclude"),
        PendingState::Rollback => Some("rollback"),
    };
    if let Some(pending) = pending {
        let _ = write!(line, " (pending {pending})");
    }
    line
}

/// Every node, indented by nesting depth. `selected` is prefixed with `>`.
pub fn render_forest(forest: &TestForest, selected: Option<NodeId>) -> String {
    render_forest_at(forest, selected, 0)
}

fn render_forest_at(forest: &TestForest, selected: Option<NodeId>, base_depth: usize) -> String {
    let mut out = String::new();
    for id in forest.preorder() {
        if let Some(node) = forest.node(id) {
            out.push_str(&node_line(node, base_depth + forest.depth(id), selected == Some(id)));
            out.push('\n');
        }
    }
    out
}

/// The nodes of a hierarchy, indented by nesting depth.
pub fn render_hierarchy(forest: &TestForest, hierarchy: &Hierarchy) -> String {
    let mut out = String::new();
    for id in &hierarchy.matches {
        if let Some(node) = forest.node(*id) {
            out.push_str(&node_line(node, forest.depth(*id), *id == hierarchy.closest));
            out.push('\n');
        }
    }
    out
}

pub fn render_counts(counts: &TestCounts) -> String {
    format!(
        "Tests: {} (suites: {}, focused: {}, excluded: {})",
        counts.tests, counts.suites, counts.focused, counts.excluded
    )
}

/// Files of the project tree, each followed by its forest.
pub fn render_project(tree: &ProjectTree) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({} files)", tree.root_label(), tree.len());
    for file in tree.files() {
        let _ = writeln!(
            out,
            "{INDENT}{} - [{}] focused: {}",
            file.label, file.file_id, file.counts.focused
        );
        out.push_str(&render_forest_at(&file.forest, None, 2));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::finder::{JasmineFinder, ScanPattern};
    use crate::app::pending::set_pending;

    const SOURCE: &str = "describe('math', function () {\n  it('adds', function () {});\n  iit('subtracts', function () {});\n});\n";

    fn forest() -> TestForest {
        JasmineFinder::new(ScanPattern::Classic)
            .expect("pattern compiles")
            .scan(SOURCE)
    }

    #[test]
    fn forest_lines_carry_state_and_selection() {
        let mut forest = forest();
        set_pending(&mut forest, NodeId(1), PendingState::Exclude).unwrap();
        let rendered = render_forest(&forest, Some(NodeId(2)));
        let lines: Vec<_> = rendered.lines().collect();
        assert_eq!(lines[0], "describe 'math' (line 1)");
        assert_eq!(lines[1], "  it 'adds' (line 2) (pending exclude)");
        assert_eq!(lines[2], "  > iit 'subtracts' (line 3) [focused]");
    }

    #[test]
    fn counts_line() {
        assert_eq!(
            render_counts(&forest().counts()),
            "Tests: 2 (suites: 1, focused: 1, excluded: 0)"
        );
    }

    #[test]
    fn hierarchy_marks_the_closest_node() {
        let forest = forest();
        let hierarchy = forest.hierarchy(NodeId(1)).unwrap();
        let rendered = render_hierarchy(&forest, &hierarchy);
        assert_eq!(rendered.lines().count(), 3);
        assert!(rendered.contains("  > it 'adds'"));
    }
}
