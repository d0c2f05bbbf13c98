//! Nesting tree of one record's matches
//!
//! Matches are visited in scan order, by start offset with enclosing matches
//! first: a match either nests inside the most recently opened match that
//! still contains it, or closes open matches and becomes a sibling higher up.
//! The builder sorts its input into that order itself. The tree is an arena of nodes addressed by
//! index; node 0 is a synthetic root whose children are the top-level
//! matches. The tree borrows the matches and lives no longer than they do.

use crate::types::{Match, TextRange};
use std::cmp::Reverse;

/// Index of a node inside a [`MatchTree`]
pub type NodeId = usize;

/// The synthetic root
pub const ROOT: NodeId = 0;

/// One node of the arena
#[derive(Debug, Clone)]
pub struct TreeNode<'a> {
    /// `None` only for the root
    pub item: Option<&'a Match>,
    pub parent: Option<NodeId>,
    /// Children in text order
    pub children: Vec<NodeId>,
}

impl<'a> TreeNode<'a> {
    fn contains(&self, range: &TextRange) -> bool {
        match self.item {
            Some(m) => m.range.contains(range),
            None => true,
        }
    }
}

/// Arena tree of a record's matches
#[derive(Debug, Clone)]
pub struct MatchTree<'a> {
    nodes: Vec<TreeNode<'a>>,
}

impl<'a> MatchTree<'a> {
    /// Build the nesting tree with a stack of currently open nodes.
    pub fn build(matches: &'a [Match]) -> Self {
        let mut nodes = Vec::with_capacity(matches.len() + 1);
        nodes.push(TreeNode {
            item: None,
            parent: None,
            children: Vec::new(),
        });

        let mut ordered: Vec<&'a Match> = matches.iter().collect();
        ordered.sort_by_key(|m| (m.range.from, Reverse(m.range.to), m.group));

        let mut open: Vec<NodeId> = vec![ROOT];

        for m in ordered {
            let closed = open
                .iter()
                .rev()
                .take_while(|id| !nodes[**id].contains(&m.range))
                .count();
            open.truncate(open.len() - closed);

            // The root contains everything, so it is never closed
            let parent = open.last().copied().unwrap_or(ROOT);
            let id = nodes.len();
            nodes.push(TreeNode {
                item: Some(m),
                parent: Some(parent),
                children: Vec::new(),
            });
            nodes[parent].children.push(id);
            open.push(id);
        }

        Self { nodes }
    }

    pub fn root(&self) -> &TreeNode<'a> {
        &self.nodes[ROOT]
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode<'a>> {
        self.nodes.get(id)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    /// Match carried by a node (`None` for the root)
    pub fn item(&self, id: NodeId) -> Option<&'a Match> {
        self.nodes.get(id).and_then(|node| node.item)
    }

    /// Number of matches, root excluded
    pub fn match_count(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Nodes in pre-order, root first
    pub fn pre_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![ROOT];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id].children.iter().rev());
        }
        order
    }

    /// Nodes in post-order, root last
    pub fn post_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(ROOT, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
            } else {
                stack.push((id, true));
                for child in self.nodes[id].children.iter().rev() {
                    stack.push((*child, false));
                }
            }
        }
        order
    }

    /// Depth of a node; the root has depth 0
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.nodes.get(id).and_then(|node| node.parent);
        while let Some(parent) = current {
            depth += 1;
            current = self.nodes[parent].parent;
        }
        depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(from: usize, to: usize, group: usize) -> Match {
        Match::new("x", TextRange::new(from, to), group)
    }

    #[test]
    fn test_empty_tree() {
        let matches: Vec<Match> = Vec::new();
        let tree = MatchTree::build(&matches);
        assert!(tree.root().children.is_empty());
        assert_eq!(tree.match_count(), 0);
        assert_eq!(tree.post_order(), vec![ROOT]);
    }

    #[test]
    fn test_nesting_and_siblings() {
        // (0..9 (2..4) (6..7 (6..6))) (12..15)
        let matches = vec![m(0, 9, 1), m(2, 4, 2), m(6, 7, 3), m(6, 6, 4), m(12, 15, 5)];
        let tree = MatchTree::build(&matches);

        assert_eq!(tree.children(ROOT), &[1, 5]);
        assert_eq!(tree.children(1), &[2, 3]);
        assert_eq!(tree.children(3), &[4]);
        assert_eq!(tree.node(4).unwrap().parent, Some(3));
        assert_eq!(tree.depth(4), 3);
        assert_eq!(tree.item(5).unwrap().group, 5);
    }

    #[test]
    fn test_equal_ranges_nest() {
        let matches = vec![m(0, 3, 1), m(0, 3, 2)];
        let tree = MatchTree::build(&matches);
        assert_eq!(tree.children(ROOT), &[1]);
        assert_eq!(tree.children(1), &[2]);
    }

    #[test]
    fn test_traversal_orders() {
        let matches = vec![m(0, 9, 1), m(2, 4, 2), m(6, 7, 3)];
        let tree = MatchTree::build(&matches);
        assert_eq!(tree.pre_order(), vec![0, 1, 2, 3]);
        assert_eq!(tree.post_order(), vec![2, 3, 1, 0]);
    }

    #[test]
    fn test_out_of_order_input_is_sorted() {
        // group order runs backwards through the text
        let matches = vec![m(6, 7, 1), m(0, 9, 3), m(2, 4, 2)];
        let tree = MatchTree::build(&matches);

        assert_eq!(tree.children(ROOT).len(), 1);
        let outer = tree.children(ROOT)[0];
        assert_eq!(tree.item(outer).unwrap().group, 3);
        let inner: Vec<usize> = tree
            .children(outer)
            .iter()
            .map(|id| tree.item(*id).unwrap().group)
            .collect();
        assert_eq!(inner, vec![2, 1]);
    }

    #[test]
    fn test_closes_several_levels() {
        let matches = vec![m(0, 5, 1), m(1, 3, 2), m(2, 2, 3), m(8, 9, 4)];
        let tree = MatchTree::build(&matches);
        assert_eq!(tree.children(ROOT), &[1, 4]);
        assert_eq!(tree.depth(3), 3);
        assert_eq!(tree.depth(4), 1);
    }
}
