//! Indexed in-memory content tree.
//!
//! Nodes live in an arena; `by_id` gives constant-time id lookup and each
//! node keeps its children ordered by sort order, so walking the arena from
//! the top-level nodes yields document order.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::domain::content::PublishedNode;

/// Parent id carried by top-level nodes.
pub const ROOT_PARENT_ID: i32 = -1;

pub(crate) type NodeIndex = usize;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("content node {id} appears more than once")]
    DuplicateId { id: i32 },
    #[error("content node {id} references missing parent {parent_id}")]
    MissingParent { id: i32, parent_id: i32 },
    #[error("content node {id} is not reachable from the top level")]
    Unreachable { id: i32 },
}

#[derive(Debug, Default)]
pub struct ContentTree {
    nodes: Vec<PublishedNode>,
    by_id: HashMap<i32, NodeIndex>,
    children: Vec<Vec<NodeIndex>>,
    top_level: Vec<NodeIndex>,
}

impl ContentTree {
    pub fn new(nodes: Vec<PublishedNode>) -> Result<Self, TreeError> {
        let mut by_id = HashMap::with_capacity(nodes.len());
        for (index, node) in nodes.iter().enumerate() {
            if by_id.insert(node.id, index).is_some() {
                return Err(TreeError::DuplicateId { id: node.id });
            }
        }

        let mut children = vec![Vec::new(); nodes.len()];
        let mut top_level = Vec::new();
        for (index, node) in nodes.iter().enumerate() {
            if node.parent_id == ROOT_PARENT_ID {
                top_level.push(index);
                continue;
            }
            match by_id.get(&node.parent_id) {
                Some(&parent) => children[parent].push(index),
                None => {
                    return Err(TreeError::MissingParent {
                        id: node.id,
                        parent_id: node.parent_id,
                    });
                }
            }
        }

        let order = |index: &NodeIndex| (nodes[*index].sort_order, nodes[*index].id);
        top_level.sort_by_key(order);
        for list in &mut children {
            list.sort_by_key(order);
        }

        let tree = Self {
            nodes,
            by_id,
            children,
            top_level,
        };
        // A parent cycle leaves its members out of document order.
        if tree.document_order().len() != tree.nodes.len() {
            let reachable: HashSet<NodeIndex> = tree.document_order().into_iter().collect();
            if let Some(index) = (0..tree.nodes.len()).find(|index| !reachable.contains(index)) {
                return Err(TreeError::Unreachable {
                    id: tree.nodes[index].id,
                });
            }
        }
        Ok(tree)
    }

    /// This tree without node `id` and its descendants; `None` when `id` is absent.
    pub fn without(&self, id: i32) -> Result<Option<Self>, TreeError> {
        let Some(index) = self.index_of(id) else {
            return Ok(None);
        };
        let mut dropped: HashSet<NodeIndex> = self.descendants(index).into_iter().collect();
        dropped.insert(index);

        let nodes = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(index, _)| !dropped.contains(index))
            .map(|(_, node)| node.clone())
            .collect();
        Self::new(nodes).map(Some)
    }

    /// This tree with `node` replacing the node of the same id, or added when new.
    pub fn with_node(&self, node: PublishedNode) -> Result<Self, TreeError> {
        let mut nodes = self.nodes.clone();
        match self.index_of(node.id) {
            Some(index) => nodes[index] = node,
            None => nodes.push(node),
        }
        Self::new(nodes)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: i32) -> Option<&PublishedNode> {
        self.index_of(id).map(|index| &self.nodes[index])
    }

    pub(crate) fn index_of(&self, id: i32) -> Option<NodeIndex> {
        self.by_id.get(&id).copied()
    }

    pub(crate) fn node(&self, index: NodeIndex) -> &PublishedNode {
        &self.nodes[index]
    }

    pub(crate) fn top_level(&self) -> &[NodeIndex] {
        &self.top_level
    }

    pub(crate) fn children(&self, index: NodeIndex) -> &[NodeIndex] {
        &self.children[index]
    }

    /// Descendants of `index` (excluding itself) in document order.
    pub(crate) fn descendants(&self, index: NodeIndex) -> Vec<NodeIndex> {
        let mut out = Vec::new();
        self.walk(self.children(index), &mut out);
        out
    }

    /// Every node in document order.
    pub(crate) fn document_order(&self) -> Vec<NodeIndex> {
        let mut out = Vec::with_capacity(self.nodes.len());
        self.walk(&self.top_level, &mut out);
        out
    }

    fn walk(&self, start: &[NodeIndex], out: &mut Vec<NodeIndex>) {
        let mut stack: Vec<NodeIndex> = start.iter().rev().copied().collect();
        while let Some(index) = stack.pop() {
            out.push(index);
            stack.extend(self.children[index].iter().rev().copied());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::content::fixtures::node;

    fn ids(tree: &ContentTree, indexes: &[NodeIndex]) -> Vec<i32> {
        indexes.iter().map(|index| tree.node(*index).id).collect()
    }

    #[test]
    fn children_follow_sort_order() {
        let mut late = node(2, 1, "late", 2);
        late.sort_order = 5;
        let mut early = node(3, 1, "early", 2);
        early.sort_order = 1;
        let tree = ContentTree::new(vec![node(1, -1, "home", 1), late, early]).expect("tree");

        let home = tree.index_of(1).expect("home");
        assert_eq!(ids(&tree, tree.children(home)), vec![3, 2]);
    }

    #[test]
    fn document_order_is_preorder() {
        let tree = ContentTree::new(vec![
            node(1, -1, "home", 1),
            node(2, 1, "about", 2),
            node(3, 2, "team", 3),
            node(4, 1, "news", 2),
            node(5, -1, "other", 1),
        ])
        .expect("tree");

        assert_eq!(ids(&tree, &tree.document_order()), vec![1, 2, 3, 4, 5]);
        let home = tree.index_of(1).expect("home");
        assert_eq!(ids(&tree, &tree.descendants(home)), vec![2, 3, 4]);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = ContentTree::new(vec![node(1, -1, "a", 1), node(1, -1, "b", 1)]).unwrap_err();
        assert_eq!(err, TreeError::DuplicateId { id: 1 });
    }

    #[test]
    fn without_drops_the_whole_subtree() {
        let tree = ContentTree::new(vec![
            node(1, -1, "home", 1),
            node(2, 1, "about", 2),
            node(3, 2, "team", 3),
            node(4, 1, "news", 2),
        ])
        .expect("tree");

        let pruned = tree.without(2).expect("rebuild").expect("present");
        assert_eq!(ids(&pruned, &pruned.document_order()), vec![1, 4]);
        assert!(pruned.get(3).is_none());
        assert!(tree.without(99).expect("rebuild").is_none());
    }

    #[test]
    fn with_node_replaces_or_appends() {
        let tree = ContentTree::new(vec![node(1, -1, "home", 1), node(2, 1, "about", 2)])
            .expect("tree");

        let renamed = tree.with_node(node(2, 1, "about-us", 2)).expect("replace");
        assert_eq!(renamed.len(), 2);
        assert_eq!(renamed.get(2).map(|node| node.url_name.as_str()), Some("about-us"));

        let grown = renamed.with_node(node(5, 2, "team", 3)).expect("append");
        let about = grown.index_of(2).expect("about");
        assert_eq!(ids(&grown, grown.children(about)), vec![5]);

        assert_eq!(
            tree.with_node(node(6, 42, "orphan", 2)).unwrap_err(),
            TreeError::MissingParent {
                id: 6,
                parent_id: 42
            }
        );
    }

    #[test]
    fn rejects_parent_cycles() {
        let err = ContentTree::new(vec![
            node(1, -1, "home", 1),
            node(2, 3, "a", 2),
            node(3, 2, "b", 2),
        ])
        .unwrap_err();
        assert_eq!(err, TreeError::Unreachable { id: 2 });
    }

    #[test]
    fn rejects_orphans() {
        let err = ContentTree::new(vec![node(2, 9, "orphan", 2)]).unwrap_err();
        assert_eq!(
            err,
            TreeError::MissingParent {
                id: 2,
                parent_id: 9
            }
        );
    }
}
