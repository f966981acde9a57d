//! Provenance: how each fact came to be in the store.
//!
//! Every [`Ancestor`](crate::tms::Ancestor) record carries a [`Derivation`]
//! saying whether the fact was asserted by a caller or derived by a rule.
//! [`explain`] unfolds those records into a derivation tree.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::factset::{FactId, FactSet};
use crate::lexicon::Lexicon;
use crate::tms::Ledger;

/// Index of a rule in its network.
pub type RuleId = usize;

/// How a piece of support came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Derivation {
    /// Asserted directly; the fact supports itself.
    Asserted,
    /// Consequence of a rule firing on its parents.
    Rule(RuleId),
}

impl std::fmt::Display for Derivation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Derivation::Asserted => write!(f, "asserted"),
            Derivation::Rule(id) => write!(f, "rule #{id}"),
        }
    }
}

/// One node of a derivation tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub fact: String,
    /// One entry per independent justification.
    pub supports: Vec<(Derivation, Vec<Explanation>)>,
}

impl Explanation {
    /// Indented multi-line rendering.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(0, &mut out);
        out
    }

    fn render_into(&self, depth: usize, out: &mut String) {
        out.push_str(&"  ".repeat(depth));
        out.push_str(&self.fact);
        out.push('\n');
        for (derivation, parents) in &self.supports {
            out.push_str(&"  ".repeat(depth + 1));
            out.push_str(&format!("<- {derivation}\n"));
            for parent in parents {
                parent.render_into(depth + 2, out);
            }
        }
    }
}

/// Unfold the support of `fact`. Facts already on the current branch are
/// shown without their support, so cyclic justifications terminate.
pub fn explain(lex: &Lexicon, facts: &FactSet, ledger: &Ledger, fact: FactId) -> Option<Explanation> {
    let mut branch = HashSet::new();
    explain_inner(lex, facts, ledger, fact, &mut branch)
}

fn explain_inner(
    lex: &Lexicon,
    facts: &FactSet,
    ledger: &Ledger,
    fact: FactId,
    branch: &mut HashSet<FactId>,
) -> Option<Explanation> {
    let rendered = facts.get(fact)?.pred.render(lex);
    if !branch.insert(fact) {
        return Some(Explanation {
            fact: rendered,
            supports: Vec::new(),
        });
    }
    let mut supports = Vec::new();
    for ancestor in ledger.ancestors(fact) {
        let parents = match ancestor.derivation {
            Derivation::Asserted => Vec::new(),
            Derivation::Rule(_) => ancestor
                .parents
                .iter()
                .filter_map(|p| explain_inner(lex, facts, ledger, *p, branch))
                .collect(),
        };
        supports.push((ancestor.derivation, parents));
    }
    branch.remove(&fact);
    Some(Explanation {
        fact: rendered,
        supports,
    })
}
