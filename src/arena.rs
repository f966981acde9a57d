//! Index arena with a free-list.
//!
//! Both tries (facts and premises) form cyclic parent/child graphs, so nodes
//! live in an [`Arena`] and refer to each other by [`NodeId`]. Removed slots
//! go onto a free-list and are reused by the next insert.

use serde::{Deserialize, Serialize};

/// Handle to a slot in an [`Arena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Arena<T> {
    slots: Vec<Option<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: T) -> NodeId {
        self.live += 1;
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot as usize] = Some(value);
                NodeId(slot)
            }
            None => {
                self.slots.push(Some(value));
                NodeId((self.slots.len() - 1) as u32)
            }
        }
    }

    /// Remove the value at `id`, returning it. Stale handles yield `None`.
    pub fn remove(&mut self, id: NodeId) -> Option<T> {
        let taken = self.slots.get_mut(id.index())?.take();
        if taken.is_some() {
            self.live -= 1;
            self.free.push(id.0);
        }
        taken
    }

    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (NodeId(i as u32), v)))
    }
}

impl<T> std::ops::Index<NodeId> for Arena<T> {
    type Output = T;

    fn index(&self, id: NodeId) -> &T {
        match self.get(id) {
            Some(v) => v,
            None => panic!("stale arena handle {id}"),
        }
    }
}

impl<T> std::ops::IndexMut<NodeId> for Arena<T> {
    fn index_mut(&mut self, id: NodeId) -> &mut T {
        match self.get_mut(id) {
            Some(v) => v,
            None => panic!("stale arena handle {id}"),
        }
    }
}
