//! Premise trie.
//!
//! Rule premises are compiled into the same path-keyed trie shape as facts,
//! with variables renumbered in order of first appearance so that premises
//! differing only in variable names share one [`PremNode`]. A new fact is
//! matched by walking this trie with the fact itself: every branch whose
//! tests the fact passes leads to the premise nodes it satisfies.

use serde::{Deserialize, Serialize};

use super::join::{MatchIndex, NumBinding};
use crate::factset::Trie;
use crate::lexicon::{TermId, VarKind, Variable};
use crate::path::{Matcher, Path, Probe, paths_of, probe};
use crate::predicate::{Atom, Predicate, Value};
use crate::provenance::RuleId;

/// Index of a premise node.
pub type PremId = usize;

/// A leaf of a compiled premise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PAtom {
    Term(TermId),
    Var { num: u32, kind: VarKind, range: TermId },
}

/// Edge of the premise trie: what the premise requires at a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PStep {
    Verb(PAtom),
    Neg(bool),
    Label,
    Term(PAtom),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PremNode {
    pub matches: MatchIndex,
    /// Rules using this node, with the premise position.
    pub owners: Vec<(RuleId, usize)>,
}

/// A premise flattened into trie edges, plus its variable names by number.
#[derive(Debug, Clone)]
pub struct Compiled {
    pub steps: Vec<(Path, PStep)>,
    pub names: Vec<String>,
}

/// Flatten a premise pattern, numbering its variables.
pub fn compile(pattern: &Predicate) -> Compiled {
    let mut names: Vec<String> = Vec::new();
    let mut number = |var: &Variable| -> PAtom {
        let num = match names.iter().position(|n| *n == var.name) {
            Some(i) => i,
            None => {
                names.push(var.name.clone());
                names.len() - 1
            }
        };
        PAtom::Var {
            num: num as u32,
            kind: var.kind,
            range: var.range,
        }
    };
    let mut steps = Vec::new();
    for path in paths_of(pattern) {
        let step = match probe(pattern, &path) {
            Probe::Verb(Atom::Term(t)) => PStep::Verb(PAtom::Term(*t)),
            Probe::Verb(Atom::Var(v)) | Probe::PredVar(v) => PStep::Verb(number(v)),
            Probe::Truth(b) => PStep::Neg(b),
            Probe::LabelPresent => PStep::Label,
            Probe::Atom(Atom::Term(t)) => PStep::Term(PAtom::Term(*t)),
            Probe::Atom(Atom::Var(v)) => PStep::Term(number(v)),
            Probe::Absent | Probe::Inside(_) | Probe::Mismatch => continue,
        };
        steps.push((path, step));
    }
    Compiled { steps, names }
}

/// Walk the premise trie with the ground predicate `fact`, returning every
/// premise node it reaches and the numbered binding that got it there.
pub fn match_fact(
    trie: &Trie<PStep, PremId>,
    matcher: &mut Matcher<'_>,
    fact: &Predicate,
) -> Vec<(PremId, NumBinding)> {
    let mut out = Vec::new();
    visit(trie, matcher, fact, trie.root(), NumBinding::new(), &mut out);
    out
}

fn visit(
    trie: &Trie<PStep, PremId>,
    matcher: &mut Matcher<'_>,
    fact: &Predicate,
    node: crate::arena::NodeId,
    binding: NumBinding,
    out: &mut Vec<(PremId, NumBinding)>,
) {
    let current = trie.node(node);
    if let Some(prem) = current.terminal {
        out.push((prem, binding.clone()));
    }
    for (path, children) in &current.children {
        let found = probe(fact, path);
        match found {
            Probe::Truth(b) => {
                if let Some(child) = children.get(&PStep::Neg(b)) {
                    visit(trie, matcher, fact, *child, binding.clone(), out);
                }
            }
            Probe::LabelPresent => {
                if let Some(child) = children.get(&PStep::Label) {
                    visit(trie, matcher, fact, *child, binding.clone(), out);
                }
            }
            Probe::Verb(Atom::Term(verb)) => {
                for (step, child) in children {
                    let PStep::Verb(patom) = step else { continue };
                    let value = match patom {
                        PAtom::Term(t) if t == verb => None,
                        PAtom::Term(_) => continue,
                        PAtom::Var { kind: VarKind::Predicate, range, .. } => {
                            if !matcher.are(*verb, *range) {
                                continue;
                            }
                            match fact.value_at(&path.labels) {
                                Some(nested @ Value::Pred(_)) => Some(nested.clone()),
                                _ => continue,
                            }
                        }
                        PAtom::Var { kind, range, .. } => {
                            if !matcher.fits(*kind, *range, *verb) {
                                continue;
                            }
                            Some(Value::term(*verb))
                        }
                    };
                    if let Some(next) = extend(&binding, patom, value) {
                        visit(trie, matcher, fact, *child, next, out);
                    }
                }
            }
            Probe::Atom(Atom::Term(term)) => {
                for (step, child) in children {
                    let PStep::Term(patom) = step else { continue };
                    let value = match patom {
                        PAtom::Term(t) if t == term => None,
                        PAtom::Term(_) => continue,
                        PAtom::Var { kind, range, .. } => {
                            if !matcher.fits(*kind, *range, *term) {
                                continue;
                            }
                            Some(Value::term(*term))
                        }
                    };
                    if let Some(next) = extend(&binding, patom, value) {
                        visit(trie, matcher, fact, *child, next, out);
                    }
                }
            }
            // The fact lacks a position the premise tests.
            _ => {}
        }
    }
}

/// Add `value` for the variable in `patom`, if any. `None` when it clashes
/// with an earlier binding of the same variable.
fn extend(binding: &NumBinding, patom: &PAtom, value: Option<Value>) -> Option<NumBinding> {
    let mut next = binding.clone();
    if let (PAtom::Var { num, .. }, Some(value)) = (patom, value) {
        match next.get(num) {
            Some(existing) if *existing != value => return None,
            Some(_) => {}
            None => {
                next.insert(*num, value);
            }
        }
    }
    Some(next)
}
