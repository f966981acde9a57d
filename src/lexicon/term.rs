//! Term records: the named nodes of the type lattice.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identifier of a term in its [`Lexicon`](super::Lexicon).
///
/// Terms are never deleted, so the id doubles as the term's position in the
/// lexicon and in the lattice graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct TermId(u32);

impl TermId {
    pub(crate) const fn from_index(index: u32) -> Self {
        TermId(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for TermId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "term:{}", self.0)
    }
}

/// Family a term belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TermKind {
    /// Types of types: `word`, `noun`, `verb` and their subtypes.
    Meta,
    /// Value types: `thing`, `number` and their subtypes.
    Noun,
    /// Relation types: `exists` and its subtypes. Instances are predicates.
    Verb,
    /// Leaf values, numbers included.
    Instance,
}

impl TermKind {
    pub fn is_type(self) -> bool {
        !matches!(self, TermKind::Instance)
    }
}

impl std::fmt::Display for TermKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TermKind::Meta => write!(f, "Meta"),
            TermKind::Noun => write!(f, "Noun"),
            TermKind::Verb => write!(f, "Verb"),
            TermKind::Instance => write!(f, "Instance"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub name: String,
    pub kind: TermKind,
    /// The type this term is an instance of.
    pub term_type: TermId,
    pub bases: Vec<TermId>,
    /// Argument label to required filler type, inherited slots included.
    pub slots: BTreeMap<String, TermId>,
    /// Facts of standing verbs are superseded rather than protected on retraction.
    pub standing: bool,
    pub number: Option<f64>,
}

impl Term {
    pub fn is_number(&self) -> bool {
        self.number.is_some()
    }
}

/// Canonical name of a number term: integral values drop the fraction.
pub fn number_name(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Whether `name` is spelled like a finite number, and so reserved for
/// number terms.
pub fn reads_as_number(name: &str) -> bool {
    name.parse::<f64>().is_ok_and(f64::is_finite)
}
