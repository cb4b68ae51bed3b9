//! Untrusted-input detector (spec §4.6).
//!
//! Walks an expression AST looking for references into the fixed set of
//! `github.*` properties that carry attacker-controlled content (issue/PR
//! titles and bodies, commit messages, branch names, etc).

use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::ast::{Expr, SpannedExpr};
use crate::position::Position;

/// A node in the static taint tree. Unlike the tree described informally
/// (which threads `parent` back-references through each node for path
/// reconstruction), this tree carries no back-pointers: the traversal
/// accumulates the path alongside the active node instead, which needs no
/// self-referential arena and is observably identical.
struct PropertyNode {
    children: BTreeMap<&'static str, PropertyNode>,
}

impl PropertyNode {
    fn leaf() -> Self {
        Self { children: BTreeMap::new() }
    }

    fn branch(children: impl IntoIterator<Item = (&'static str, PropertyNode)>) -> Self {
        Self { children: children.into_iter().collect() }
    }
}

fn author_fields() -> PropertyNode {
    PropertyNode::branch([("email", PropertyNode::leaf()), ("name", PropertyNode::leaf())])
}

fn commit_fields() -> PropertyNode {
    PropertyNode::branch([
        ("message", PropertyNode::leaf()),
        ("author", author_fields()),
    ])
}

/// Builds the static taint tree rooted at `github`.
fn build_tree() -> PropertyNode {
    let title_body = || {
        PropertyNode::branch([("title", PropertyNode::leaf()), ("body", PropertyNode::leaf())])
    };

    let event = PropertyNode::branch([
        ("issue", title_body()),
        ("pull_request", PropertyNode::branch([
            ("title", PropertyNode::leaf()),
            ("body", PropertyNode::leaf()),
            ("head", PropertyNode::branch([
                ("ref", PropertyNode::leaf()),
                ("label", PropertyNode::leaf()),
                ("repo", PropertyNode::branch([(
                    "default_branch",
                    PropertyNode::leaf(),
                )])),
            ])),
        ])),
        ("comment", title_body()),
        ("review", title_body()),
        ("review_comment", title_body()),
        ("discussion", title_body()),
        ("pages", PropertyNode::branch([(
            "*",
            PropertyNode::branch([("page_name", PropertyNode::leaf())]),
        )])),
        ("commits", PropertyNode::branch([("*", commit_fields())])),
        ("head_commit", commit_fields()),
    ]);

    PropertyNode::branch([("event", event), ("head_ref", PropertyNode::leaf())])
}

fn tree() -> &'static PropertyNode {
    static TREE: OnceLock<PropertyNode> = OnceLock::new();
    TREE.get_or_init(build_tree)
}

/// One reported taint hit: the position of the root variable that started
/// the traced access, and the reconstructed dotted path(s) it resolved to
/// (more than one when an object-filter fans out to multiple leaves).
#[derive(Debug, Clone, PartialEq)]
pub struct UntrustedFinding {
    pub pos: Position,
    pub paths: Vec<String>,
}

struct ActiveNode<'a> {
    node: &'a PropertyNode,
    path: String,
}

/// Traversal state for one maximal postfix chain (a `Variable` followed by
/// zero or more `.prop` / `.* ` / `[index]` steps).
struct Tracker<'a> {
    active: Vec<ActiveNode<'a>>,
    start_pos: Option<Position>,
}

impl<'a> Tracker<'a> {
    fn new() -> Self {
        Self { active: Vec::new(), start_pos: None }
    }

    fn finalize(&mut self, sink: &mut Vec<UntrustedFinding>) {
        if self.active.is_empty() {
            self.start_pos = None;
            return;
        }
        let paths: Vec<String> = self
            .active
            .iter()
            .filter(|a| a.node.children.is_empty())
            .map(|a| a.path.clone())
            .collect();
        if !paths.is_empty() {
            sink.push(UntrustedFinding {
                pos: self.start_pos.expect("active path implies a start position"),
                paths,
            });
        }
        self.active.clear();
        self.start_pos = None;
    }

    fn start(&mut self, name: &str, pos: Position, root: &'a PropertyNode) {
        if name == "github" {
            self.active = vec![ActiveNode { node: root, path: "github".to_string() }];
            self.start_pos = Some(pos);
        }
    }

    fn advance_object(&mut self, prop: &str) {
        self.active = std::mem::take(&mut self.active)
            .into_iter()
            .filter_map(|a| {
                a.node.children.get(prop).map(|n| ActiveNode {
                    node: n,
                    path: format!("{}.{prop}", a.path),
                })
            })
            .collect();
    }

    fn advance_array_deref(&mut self) {
        let mut next = Vec::new();
        for a in std::mem::take(&mut self.active) {
            if let Some(star) = a.node.children.get("*") {
                next.push(ActiveNode { node: star, path: format!("{}.*", a.path) });
            } else {
                for (name, child) in &a.node.children {
                    next.push(ActiveNode { node: child, path: format!("{}.{name}", a.path) });
                }
            }
        }
        self.active = next;
    }

    fn consume_array_index(&mut self) {
        self.active = std::mem::take(&mut self.active)
            .into_iter()
            .filter_map(|a| {
                a.node.children.get("*").map(|n| ActiveNode { node: n, path: a.path })
            })
            .collect();
    }
}

fn walk<'a>(expr: &SpannedExpr, root: &'a PropertyNode, st: &mut Tracker<'a>, sink: &mut Vec<UntrustedFinding>) {
    match &expr.node {
        Expr::Variable(name) => {
            st.finalize(sink);
            st.start(name, expr.pos, root);
        }
        Expr::Null | Expr::Bool(_) | Expr::Int(_) | Expr::Float(_) | Expr::String(_) => {
            st.finalize(sink);
        }
        Expr::ObjectDeref { receiver, property } => {
            walk(receiver, root, st, sink);
            st.advance_object(property);
        }
        Expr::ArrayDeref { receiver } => {
            walk(receiver, root, st, sink);
            st.advance_array_deref();
        }
        Expr::IndexAccess { operand, index } => {
            walk(operand, root, st, sink);
            if let Expr::String(literal) = &index.node {
                st.advance_object(literal);
            } else {
                st.consume_array_index();
                scan_subexpr(index, root, sink);
            }
        }
        Expr::FuncCall { args, .. } => {
            st.finalize(sink);
            for arg in args {
                scan_subexpr(arg, root, sink);
            }
        }
        Expr::NotOp { operand } => {
            st.finalize(sink);
            scan_subexpr(operand, root, sink);
        }
        Expr::CompareOp { left, right, .. } | Expr::LogicalOp { left, right, .. } => {
            st.finalize(sink);
            scan_subexpr(left, root, sink);
            scan_subexpr(right, root, sink);
        }
    }
}

fn scan_subexpr(expr: &SpannedExpr, root: &PropertyNode, sink: &mut Vec<UntrustedFinding>) {
    let mut sub = Tracker::new();
    walk(expr, root, &mut sub, sink);
    sub.finalize(sink);
}

/// Scans `expr` for references to untrusted `github.*` properties.
pub fn scan(expr: &SpannedExpr) -> Vec<UntrustedFinding> {
    let mut sink = Vec::new();
    scan_subexpr(expr, tree(), &mut sink);
    sink
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parse;

    fn findings(src: &str) -> Vec<UntrustedFinding> {
        let e = parse(&format!("{src} }}}}")).unwrap();
        scan(&e)
    }

    #[test]
    fn test_issue_title_flagged() {
        let f = findings("github.event.issue.title");
        assert_eq!(f.len(), 1);
        assert_eq!(f[0].paths, vec!["github.event.issue.title".to_string()]);
    }

    #[test]
    fn test_case_insensitive_paths_match() {
        let lower = findings("github.event.issue.body");
        let upper = findings("github.EVENT.issue.BODY");
        assert_eq!(lower[0].paths, upper[0].paths);
    }

    #[test]
    fn test_safe_property_not_flagged() {
        assert!(findings("github.event.issue.number").is_empty());
        assert!(findings("github.sha").is_empty());
    }

    #[test]
    fn test_object_filter_fans_out_to_multiple_leaves() {
        let f = findings("github.event.commits.*.message");
        assert_eq!(f.len(), 1);
        assert_eq!(f[0].paths, vec!["github.event.commits.*.message".to_string()]);
    }

    #[test]
    fn test_commit_author_email_flagged() {
        let f = findings("github.event.head_commit.author.email");
        assert_eq!(f[0].paths, vec!["github.event.head_commit.author.email".to_string()]);
    }

    #[test]
    fn test_index_with_string_literal_behaves_like_dot() {
        let f = findings("github.event.issue['title']");
        assert_eq!(f.len(), 1);
        assert_eq!(f[0].paths, vec!["github.event.issue.title".to_string()]);
    }

    #[test]
    fn test_function_args_scanned_independently() {
        let f = findings("contains(github.event.issue.title, 'x')");
        assert_eq!(f.len(), 1);
    }

    #[test]
    fn test_head_ref_flagged() {
        assert_eq!(findings("github.head_ref").len(), 1);
    }
}
