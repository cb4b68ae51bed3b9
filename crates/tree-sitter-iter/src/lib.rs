//! A very simple pre-order iterator for tree-sitter CSTs.

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_docs)]
#![allow(clippy::redundant_field_names)]
#![forbid(unsafe_code)]

use tree_sitter::{Node, Tree, TreeCursor};

/// A pre-order iterator over the nodes of a tree-sitter syntax tree.
pub struct TreeIter<'tree> {
    cursor: Option<TreeCursor<'tree>>,
}

impl<'tree> TreeIter<'tree> {
    /// Creates a new `TreeSitterIter` for the given syntax tree.
    pub fn new(tree: &'tree Tree) -> Self {
        Self {
            cursor: Some(tree.root_node().walk()),
        }
    }
}

impl<'tree> Iterator for TreeIter<'tree> {
    type Item = Node<'tree>;

    fn next(&mut self) -> Option<Self::Item> {
        let cursor = match &mut self.cursor {
            Some(cursor) => cursor,
            None => return None,
        };

        let node = cursor.node();

        if cursor.goto_first_child() || cursor.goto_next_sibling() {
            return Some(node);
        }

        loop {
            if !cursor.goto_parent() {
                // If we can't go to the parent, the walk will be
                // complete *after* the current node.
                self.cursor = None;
                break;
            }

            if cursor.goto_next_sibling() {
                break;
            }
        }

        Some(node)
    }
}
