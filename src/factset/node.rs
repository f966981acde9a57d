//! Path-keyed trie shared by the fact store and the premise network.
//!
//! Every edge is labelled by the full [`Path`] it tests and the value found
//! there, so predicates whose argument structure diverges still share every
//! common prefix. Terminal nodes carry a payload (a fact, or a premise node).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::arena::{Arena, NodeId};
use crate::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrieNode<K: Ord, T> {
    pub parent: Option<NodeId>,
    /// Edge leading here from the parent.
    pub edge: Option<(Path, K)>,
    pub children: BTreeMap<Path, BTreeMap<K, NodeId>>,
    pub terminal: Option<T>,
}

impl<K: Ord, T> TrieNode<K, T> {
    fn new(parent: Option<NodeId>, edge: Option<(Path, K)>) -> Self {
        Self {
            parent,
            edge,
            children: BTreeMap::new(),
            terminal: None,
        }
    }

    fn is_unused(&self) -> bool {
        self.children.is_empty() && self.terminal.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trie<K: Ord, T> {
    nodes: Arena<TrieNode<K, T>>,
    root: NodeId,
}

impl<K: Ord + Clone, T> Default for Trie<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone, T> Trie<K, T> {
    pub fn new() -> Self {
        let mut nodes = Arena::new();
        let root = nodes.insert(TrieNode::new(None, None));
        Self { nodes, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &TrieNode<K, T> {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut TrieNode<K, T> {
        &mut self.nodes[id]
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(id)
    }

    /// Number of nodes, the root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn child(&self, id: NodeId, path: &Path, key: &K) -> Option<NodeId> {
        self.nodes[id].children.get(path)?.get(key).copied()
    }

    /// Follow `steps` from the root, creating missing nodes. Returns the last node.
    pub fn get_or_create(&mut self, steps: impl IntoIterator<Item = (Path, K)>) -> NodeId {
        let mut current = self.root;
        for (path, key) in steps {
            current = match self.child(current, &path, &key) {
                Some(next) => next,
                None => {
                    let next = self
                        .nodes
                        .insert(TrieNode::new(Some(current), Some((path.clone(), key.clone()))));
                    self.nodes[current]
                        .children
                        .entry(path)
                        .or_default()
                        .insert(key, next);
                    next
                }
            };
        }
        current
    }

    /// Follow `steps` from the root without creating anything.
    pub fn lookup<'s>(&self, steps: impl IntoIterator<Item = &'s (Path, K)>) -> Option<NodeId>
    where
        K: 's,
    {
        let mut current = self.root;
        for (path, key) in steps {
            current = self.child(current, path, key)?;
        }
        Some(current)
    }

    /// Clear the payload at `id` and remove the chain of nodes left unused,
    /// stopping at the first node still shared with other entries.
    pub fn prune(&mut self, id: NodeId) -> Option<T> {
        let payload = self.nodes.get_mut(id)?.terminal.take();
        let mut current = id;
        while current != self.root && self.nodes[current].is_unused() {
            let Some(node) = self.nodes.remove(current) else {
                break;
            };
            let (Some(parent), Some((path, key))) = (node.parent, node.edge) else {
                break;
            };
            let siblings = &mut self.nodes[parent].children;
            if let Some(by_key) = siblings.get_mut(&path) {
                by_key.remove(&key);
                if by_key.is_empty() {
                    siblings.remove(&path);
                }
            }
            current = parent;
        }
        payload
    }
}
