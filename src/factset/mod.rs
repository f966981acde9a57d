//! Fact store: a discrimination trie over predicate paths.
//!
//! Ground facts are flattened with [`paths_of`] and inserted as a chain of
//! `(path, step)` edges, so structurally identical facts end at the same
//! terminal. Queries walk the trie with a pattern; a variable position visits
//! every child whose term the variable admits, which is what lets one stored
//! fact answer questions about any of its supertypes.

pub mod node;

use serde::{Deserialize, Serialize};

use crate::arena::{Arena, NodeId};
use crate::binding::Binding;
use crate::error::FactError;
use crate::lexicon::{Lexicon, TermId, Variable};
use crate::path::{Matcher, Path, Probe, paths_of, probe};
use crate::predicate::{Atom, Predicate, Value};

pub use node::{Trie, TrieNode};

/// Handle to a stored fact.
pub type FactId = NodeId;

/// Value found at a path of a ground predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Step {
    Verb(TermId),
    Neg(bool),
    Label,
    Term(TermId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    pub pred: Predicate,
    /// Terminal node in the fact trie.
    pub node: NodeId,
}

/// The trie edges for a ground predicate, or `None` if it has variables.
pub fn steps_of(pred: &Predicate) -> Option<Vec<(Path, Step)>> {
    paths_of(pred)
        .into_iter()
        .map(|path| {
            let step = match probe(pred, &path) {
                Probe::Verb(Atom::Term(t)) => Step::Verb(*t),
                Probe::Truth(b) => Step::Neg(b),
                Probe::LabelPresent => Step::Label,
                Probe::Atom(Atom::Term(t)) => Step::Term(*t),
                _ => return None,
            };
            Some((path, step))
        })
        .collect()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactSet {
    trie: Trie<Step, FactId>,
    facts: Arena<Fact>,
}

impl FactSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: FactId) -> Option<&Fact> {
        self.facts.get(id)
    }

    pub fn contains(&self, id: FactId) -> bool {
        self.facts.contains(id)
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FactId, &Fact)> {
        self.facts.iter()
    }

    /// Trie nodes, the root included.
    pub fn node_count(&self) -> usize {
        self.trie.len()
    }

    /// Exact structural lookup.
    pub fn lookup(&self, pred: &Predicate) -> Option<FactId> {
        let steps = steps_of(pred)?;
        let node = self.trie.lookup(&steps)?;
        self.trie.node(node).terminal
    }

    /// Validate and store `pred`. Returns the fact and whether it is new.
    pub fn insert(&mut self, lex: &Lexicon, pred: Predicate) -> Result<(FactId, bool), FactError> {
        pred.validate_fact(lex)?;
        let steps = steps_of(&pred).ok_or_else(|| FactError::NotGround {
            fact: pred.render(lex),
        })?;
        if let Some(existing) = self.trie.lookup(&steps).and_then(|n| self.trie.node(n).terminal) {
            return Ok((existing, false));
        }
        let node = self.trie.get_or_create(steps);
        let id = self.facts.insert(Fact { pred, node });
        self.trie.node_mut(node).terminal = Some(id);
        Ok((id, true))
    }

    /// Remove a fact and the trie chain only it used.
    pub fn remove(&mut self, id: FactId) -> Option<Fact> {
        let fact = self.facts.remove(id)?;
        self.trie.prune(fact.node);
        Some(fact)
    }

    /// Every stored fact matching `pattern`, with the variable bindings that
    /// make it match. A ground pattern yields empty bindings.
    pub fn query(&self, lex: &Lexicon, pattern: &Predicate) -> Vec<(FactId, Binding)> {
        let mut walk = Walk {
            pattern,
            wanted: paths_of(pattern).len(),
            matcher: Matcher::new(lex),
            out: Vec::new(),
        };
        self.visit(&mut walk, self.trie.root(), 0, Binding::new(), Vec::new());
        walk.out
    }

    fn visit<'p>(
        &self,
        walk: &mut Walk<'p, '_>,
        node: NodeId,
        consumed: usize,
        binding: Binding,
        pending: Vec<(&'p Variable, Vec<String>)>,
    ) {
        let current = self.trie.node(node);
        if consumed == walk.wanted {
            if let Some(fact_id) = current.terminal {
                if let Some(b) = self.finish(fact_id, &binding, &pending) {
                    walk.out.push((fact_id, b));
                }
            }
        }

        for (path, children) in &current.children {
            let probed = probe(walk.pattern, path);
            match probed {
                Probe::Mismatch => {}
                Probe::Absent | Probe::Inside(_) => {
                    for child in children.values() {
                        self.visit(walk, *child, consumed, binding.clone(), pending.clone());
                    }
                }
                Probe::Truth(b) => {
                    if let Some(child) = children.get(&Step::Neg(b)) {
                        self.visit(walk, *child, consumed + 1, binding.clone(), pending.clone());
                    }
                }
                Probe::LabelPresent => {
                    if let Some(child) = children.get(&Step::Label) {
                        self.visit(walk, *child, consumed + 1, binding.clone(), pending.clone());
                    }
                }
                Probe::Verb(Atom::Term(t)) => {
                    if let Some(child) = children.get(&Step::Verb(*t)) {
                        self.visit(walk, *child, consumed + 1, binding.clone(), pending.clone());
                    }
                }
                Probe::Atom(Atom::Term(t)) => {
                    if let Some(child) = children.get(&Step::Term(*t)) {
                        self.visit(walk, *child, consumed + 1, binding.clone(), pending.clone());
                    }
                }
                Probe::Verb(Atom::Var(var)) | Probe::Atom(Atom::Var(var)) => {
                    for (step, child) in children {
                        let (Step::Verb(t) | Step::Term(t)) = *step else {
                            continue;
                        };
                        if !walk.matcher.admits(var, t) {
                            continue;
                        }
                        let mut next = binding.clone();
                        if next.bind(&var.name, Value::term(t)) {
                            self.visit(walk, *child, consumed + 1, next, pending.clone());
                        }
                    }
                }
                Probe::PredVar(var) => {
                    for (step, child) in children {
                        let Step::Verb(verb) = *step else { continue };
                        if walk.matcher.admits_verb(var, verb) {
                            let mut next_pending = pending.clone();
                            next_pending.push((var, path.labels.clone()));
                            self.visit(walk, *child, consumed + 1, binding.clone(), next_pending);
                        }
                    }
                }
            }
        }
    }

    /// Bind predicate placeholders to the nested predicates of the fact.
    fn finish(
        &self,
        fact_id: FactId,
        binding: &Binding,
        pending: &[(&Variable, Vec<String>)],
    ) -> Option<Binding> {
        let mut out = binding.clone();
        if pending.is_empty() {
            return Some(out);
        }
        let fact = self.facts.get(fact_id)?;
        for (var, labels) in pending {
            let nested = fact.pred.value_at(labels)?;
            if nested.as_pred().is_none() || !out.bind(&var.name, nested.clone()) {
                return None;
            }
        }
        Some(out)
    }
}

struct Walk<'p, 'l> {
    pattern: &'p Predicate,
    wanted: usize,
    matcher: Matcher<'l>,
    out: Vec<(FactId, Binding)>,
}
