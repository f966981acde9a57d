//! Type lattice: `bases` and `equals` edges over terms.
//!
//! Edges point from a term to its bases; an `equals` pair adds one edge each
//! way, so aliasing is symmetric and transitive for free. `are(a, b)` is
//! reachability from `a` to `b`; the subtypes of `t` are everything that
//! reaches `t`, found by a breadth-first walk over the reversed graph.

use std::collections::BTreeSet;

use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, Reversed};

use super::term::TermId;

#[derive(Debug, Clone, Default)]
pub struct Lattice {
    graph: DiGraph<TermId, ()>,
}

impl Lattice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node for `term`. Terms are added in id order, so node index and
    /// term index coincide.
    pub fn add_term(&mut self, term: TermId, bases: &[TermId]) {
        let node = self.graph.add_node(term);
        debug_assert_eq!(node.index(), term.index());
        for base in bases {
            self.graph.add_edge(node, Self::node(*base), ());
        }
    }

    pub fn add_equal(&mut self, a: TermId, b: TermId) {
        let (na, nb) = (Self::node(a), Self::node(b));
        if self.graph.contains_edge(na, nb) && self.graph.contains_edge(nb, na) {
            return;
        }
        self.graph.add_edge(na, nb, ());
        self.graph.add_edge(nb, na, ());
    }

    fn node(term: TermId) -> NodeIndex {
        NodeIndex::new(term.index())
    }

    fn contains(&self, term: TermId) -> bool {
        term.index() < self.graph.node_count()
    }

    /// Reflexive-transitive subtype test.
    pub fn are(&self, a: TermId, b: TermId) -> bool {
        if a == b {
            return true;
        }
        if !self.contains(a) || !self.contains(b) {
            return false;
        }
        has_path_connecting(&self.graph, Self::node(a), Self::node(b), None)
    }

    /// `t` and every term that is a subtype of it.
    pub fn subtypes_of(&self, t: TermId) -> BTreeSet<TermId> {
        let mut out = BTreeSet::new();
        if !self.contains(t) {
            return out;
        }
        let reversed = Reversed(&self.graph);
        let mut bfs = Bfs::new(reversed, Self::node(t));
        while let Some(node) = bfs.next(reversed) {
            out.insert(self.graph[node]);
        }
        out
    }
}
