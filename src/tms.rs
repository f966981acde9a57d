//! Truth maintenance: the Ancestor ledger and retraction cascades.
//!
//! Every stored fact owns one or more [`Ancestor`] records, each naming a set
//! of parent facts that jointly justify it. A directly asserted fact is its
//! own sole parent. A fact stays while at least one of its Ancestors is
//! grounded in facts that stay.
//!
//! Retraction is planned before anything is touched:
//!
//! 1. Walk the dependents of the retracted fact breadth-first, collecting
//!    every fact left without an Ancestor grounded outside the cascade
//! 2. Refuse with a contradiction when the retracted fact was asserted (and is
//!    not standing) yet something still relies on it alone
//! 3. Otherwise hand the cascade to the caller, dependents first

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::factset::FactId;
use crate::provenance::{Derivation, RuleId};

// ---------------------------------------------------------------------------
// Ancestor
// ---------------------------------------------------------------------------

/// A set of facts that jointly justify one fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ancestor {
    /// Sorted, without duplicates.
    pub parents: Vec<FactId>,
    pub derivation: Derivation,
}

impl Ancestor {
    /// Self-support of an asserted fact.
    pub fn asserted(fact: FactId) -> Self {
        Self {
            parents: vec![fact],
            derivation: Derivation::Asserted,
        }
    }

    pub fn derived(parents: impl IntoIterator<Item = FactId>, rule: RuleId) -> Self {
        let parents: BTreeSet<FactId> = parents.into_iter().collect();
        Self {
            parents: parents.into_iter().collect(),
            derivation: Derivation::Rule(rule),
        }
    }

    pub fn depends_on(&self, fact: FactId) -> bool {
        self.parents.contains(&fact)
    }
}

// ---------------------------------------------------------------------------
// Retraction plan
// ---------------------------------------------------------------------------

/// Facts a retraction removes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetractionPlan {
    pub target: Option<FactId>,
    /// Dependents left unsupported, in discovery order.
    pub cascade: Vec<FactId>,
    pub cascade_depth: usize,
}

impl RetractionPlan {
    /// Every fact to remove, deepest dependents first and the target last.
    pub fn removal_order(&self) -> Vec<FactId> {
        let mut order: Vec<FactId> = self.cascade.iter().rev().copied().collect();
        order.extend(self.target);
        order
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ledger {
    /// Fact to its justifications.
    ancestors: HashMap<FactId, Vec<Ancestor>>,
    /// Reverse index: parent to the facts it helps justify (self-support excluded).
    dependents: HashMap<FactId, BTreeSet<FactId>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a justification for `fact`. Duplicates and derived support that
    /// includes the fact itself are ignored. Returns whether it was recorded.
    pub fn add(&mut self, fact: FactId, ancestor: Ancestor) -> bool {
        if ancestor.derivation != Derivation::Asserted && ancestor.depends_on(fact) {
            return false;
        }
        let existing = self.ancestors.entry(fact).or_default();
        if existing.contains(&ancestor) {
            return false;
        }
        for &parent in &ancestor.parents {
            if parent != fact {
                self.dependents.entry(parent).or_default().insert(fact);
            }
        }
        existing.push(ancestor);
        true
    }

    pub fn ancestors(&self, fact: FactId) -> &[Ancestor] {
        self.ancestors.get(&fact).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn direct_dependents(&self, fact: FactId) -> Vec<FactId> {
        self.dependents
            .get(&fact)
            .map(|d| d.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether `fact` was asserted directly (it supports itself).
    pub fn is_asserted(&self, fact: FactId) -> bool {
        self.ancestors(fact)
            .iter()
            .any(|a| a.derivation == Derivation::Asserted)
    }

    /// Number of Ancestor records.
    pub fn record_count(&self) -> usize {
        self.ancestors.values().map(Vec::len).sum()
    }

    /// Work out what retracting `fact` removes, without changing anything.
    ///
    /// Facts downstream of the target keep their place only if some Ancestor
    /// still reaches facts outside the downstream set, so rings of facts that
    /// merely justify each other fall together with the target.
    pub fn plan_retraction(&self, fact: FactId) -> RetractionPlan {
        let mut downstream = HashSet::from([fact]);
        let mut discovered: Vec<(FactId, usize)> = Vec::new();

        // BFS over dependents
        let mut queue: VecDeque<(FactId, usize)> = VecDeque::from([(fact, 0)]);
        while let Some((current, depth)) = queue.pop_front() {
            for dependent in self.direct_dependents(current) {
                if downstream.insert(dependent) {
                    discovered.push((dependent, depth + 1));
                    queue.push_back((dependent, depth + 1));
                }
            }
        }

        // Grow the set of downstream facts that are still grounded.
        let mut grounded: HashSet<FactId> = HashSet::new();
        loop {
            let before = grounded.len();
            for &(candidate, _) in &discovered {
                if grounded.contains(&candidate) {
                    continue;
                }
                let supported = self.ancestors(candidate).iter().any(|a| {
                    a.derivation == Derivation::Asserted
                        || a
                            .parents
                            .iter()
                            .all(|p| !downstream.contains(p) || grounded.contains(p))
                });
                if supported {
                    grounded.insert(candidate);
                }
            }
            if grounded.len() == before {
                break;
            }
        }

        let lost: Vec<(FactId, usize)> = discovered
            .into_iter()
            .filter(|(f, _)| !grounded.contains(f))
            .collect();
        RetractionPlan {
            target: Some(fact),
            cascade_depth: lost.iter().map(|(_, d)| *d).max().unwrap_or(0),
            cascade: lost.into_iter().map(|(f, _)| f).collect(),
        }
    }

    /// Forget `fact`: its own Ancestors, and every Ancestor of another fact
    /// that names it as a parent.
    pub fn remove(&mut self, fact: FactId) {
        if let Some(records) = self.ancestors.remove(&fact) {
            for record in records {
                for parent in record.parents {
                    self.unlink(parent, fact);
                }
            }
        }
        if let Some(deps) = self.dependents.remove(&fact) {
            for dependent in deps {
                let Some(records) = self.ancestors.get_mut(&dependent) else {
                    continue;
                };
                let (dropped, kept): (Vec<Ancestor>, Vec<Ancestor>) =
                    records.drain(..).partition(|a| a.depends_on(fact));
                *records = kept;
                let still_used: BTreeSet<FactId> =
                    records.iter().flat_map(|a| a.parents.iter().copied()).collect();
                for parent in dropped.iter().flat_map(|a| a.parents.iter().copied()) {
                    if parent != fact && !still_used.contains(&parent) {
                        self.unlink(parent, dependent);
                    }
                }
            }
        }
    }

    fn unlink(&mut self, parent: FactId, dependent: FactId) {
        if let Some(deps) = self.dependents.get_mut(&parent) {
            deps.remove(&dependent);
            if deps.is_empty() {
                self.dependents.remove(&parent);
            }
        }
    }
}
