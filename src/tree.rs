//! Topic tree: the hierarchical view of one store snapshot.
//!
//! Paths are split on `/` and one node is created per segment. A node is a
//! branch when it has children and a value holder when the snapshot has an
//! entry at its path; it may be both. The tree is rebuilt for every schema
//! build and never mutated afterwards.
//!
//! Paths with more than [`MAX_TOPIC_DEPTH`] segments are left out of the tree
//! and listed in [`TopicTree::skipped`]. They stay in the store and remain
//! reachable through wildcard matches.

use std::collections::BTreeMap;

use crate::storage::Snapshot;
use crate::value::Value;

/// Deepest path, in segments, that the tree and the projected schema cover.
pub const MAX_TOPIC_DEPTH: usize = 128;

/// Classification of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Has children, no own value.
    Branch,
    /// Has an own value, no children.
    Leaf,
    /// Has both children and an own value.
    BranchWithValue,
    /// Neither. Only the root of an empty tree looks like this.
    Empty,
}

impl NodeKind {
    /// True for kinds that project to an object type.
    #[must_use]
    pub const fn is_branch(self) -> bool {
        matches!(self, Self::Branch | Self::BranchWithValue | Self::Empty)
    }
}

/// One segment of the topic tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopicNode {
    segment: String,
    path: String,
    value: Option<Value>,
    children: BTreeMap<String, TopicNode>,
}

impl TopicNode {
    fn child(segment: &str, path: String) -> Self {
        Self {
            segment: segment.to_string(),
            path,
            value: None,
            children: BTreeMap::new(),
        }
    }

    /// Raw (unsanitized) path segment. Empty for the root.
    #[must_use]
    pub fn segment(&self) -> &str {
        &self.segment
    }

    /// Full path of this node. Empty for the root.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Snapshot value at this node's path, if an entry existed.
    #[must_use]
    pub const fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Children keyed by raw segment, in byte order.
    pub fn children(&self) -> impl Iterator<Item = &TopicNode> {
        self.children.values()
    }

    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    #[must_use]
    pub fn get(&self, segment: &str) -> Option<&TopicNode> {
        self.children.get(segment)
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match (self.children.is_empty(), self.value.is_some()) {
            (false, false) => NodeKind::Branch,
            (true, true) => NodeKind::Leaf,
            (false, true) => NodeKind::BranchWithValue,
            (true, false) => NodeKind::Empty,
        }
    }

    fn count(&self) -> usize {
        let mut total = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            total += 1;
            stack.extend(node.children.values());
        }
        total
    }
}

/// The topic tree of one snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopicTree {
    root: TopicNode,
    generation: u64,
    skipped: Vec<String>,
}

impl TopicTree {
    /// Builds the tree from a snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut root = TopicNode::default();
        let mut skipped = Vec::new();
        for entry in &snapshot.entries {
            if depth(&entry.path) > MAX_TOPIC_DEPTH {
                skipped.push(entry.path.clone());
                continue;
            }
            let mut current = &mut root;
            let mut prefix_len = 0usize;
            for (idx, segment) in entry.path.split('/').enumerate() {
                prefix_len += segment.len() + usize::from(idx > 0);
                let node_path = &entry.path[..prefix_len];
                current = current
                    .children
                    .entry(segment.to_string())
                    .or_insert_with(|| TopicNode::child(segment, node_path.to_string()));
            }
            current.value = Some(entry.value.clone());
        }
        Self {
            root,
            generation: snapshot.generation,
            skipped,
        }
    }

    #[must_use]
    pub const fn root(&self) -> &TopicNode {
        &self.root
    }

    /// Store generation the tree was built from.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Paths left out for exceeding [`MAX_TOPIC_DEPTH`], in path order.
    #[must_use]
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// Number of nodes, excluding the root.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.root.count() - 1
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }
}

fn depth(path: &str) -> usize {
    path.bytes().filter(|b| *b == b'/').count() + 1
}
