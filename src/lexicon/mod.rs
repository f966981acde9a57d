//! Term lexicon and type lattice.
//!
//! The [`Lexicon`] owns every named term. It is bootstrapped once per store
//! with the root vocabulary (`word`, `verb`, `noun`, `number`, `exists`,
//! `thing`) and the time verbs (`now`, `onwards`), and is then threaded
//! explicitly through every operation that needs type information.
//!
//! Subtype ("are") and instance ("is-a") questions are graph queries over the
//! [`Lattice`](lattice::Lattice); nothing relies on Rust-level type structure.

pub mod lattice;
pub mod term;
pub mod var;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::LexiconError;

pub use lattice::Lattice;
pub use term::{Term, TermId, TermKind, number_name, reads_as_number};
pub use var::{VarKind, Variable, is_variable_token};

/// Serialized form of a [`Lexicon`]. The name index and lattice are rebuilt
/// on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LexiconData {
    terms: Vec<Term>,
    equals: Vec<(TermId, TermId)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "LexiconData", into = "LexiconData")]
pub struct Lexicon {
    terms: Vec<Term>,
    by_name: HashMap<String, TermId>,
    equals: Vec<(TermId, TermId)>,
    lattice: Lattice,
}

impl From<LexiconData> for Lexicon {
    fn from(data: LexiconData) -> Self {
        let mut lattice = Lattice::new();
        let mut by_name = HashMap::with_capacity(data.terms.len());
        for (i, term) in data.terms.iter().enumerate() {
            let id = TermId::from_index(i as u32);
            lattice.add_term(id, &term.bases);
            by_name.insert(term.name.clone(), id);
        }
        for (a, b) in &data.equals {
            lattice.add_equal(*a, *b);
        }
        Self {
            terms: data.terms,
            by_name,
            equals: data.equals,
            lattice,
        }
    }
}

impl From<Lexicon> for LexiconData {
    fn from(lex: Lexicon) -> Self {
        Self {
            terms: lex.terms,
            equals: lex.equals,
        }
    }
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::bootstrap()
    }
}

impl Lexicon {
    pub const WORD: TermId = TermId::from_index(0);
    pub const VERB: TermId = TermId::from_index(1);
    pub const NOUN: TermId = TermId::from_index(2);
    pub const NUMBER: TermId = TermId::from_index(3);
    pub const EXISTS: TermId = TermId::from_index(4);
    pub const THING: TermId = TermId::from_index(5);
    pub const NOW: TermId = TermId::from_index(6);
    pub const ONWARDS: TermId = TermId::from_index(7);

    /// A fresh lexicon holding only the root vocabulary.
    pub fn bootstrap() -> Self {
        let mut lex = Self {
            terms: Vec::new(),
            by_name: HashMap::new(),
            equals: Vec::new(),
            lattice: Lattice::new(),
        };
        let slot = |label: &str, ty: TermId| (label.to_string(), ty);

        lex.push("word", TermKind::Meta, Self::WORD, vec![], BTreeMap::new(), false);
        lex.push("verb", TermKind::Meta, Self::WORD, vec![Self::WORD], BTreeMap::new(), false);
        lex.push("noun", TermKind::Meta, Self::WORD, vec![Self::WORD], BTreeMap::new(), false);
        lex.push("number", TermKind::Noun, Self::WORD, vec![Self::WORD], BTreeMap::new(), false);
        lex.push(
            "exists",
            TermKind::Verb,
            Self::VERB,
            vec![],
            [slot("subj", Self::WORD)].into_iter().collect(),
            false,
        );
        lex.push("thing", TermKind::Noun, Self::NOUN, vec![Self::WORD], BTreeMap::new(), false);
        lex.push(
            "now",
            TermKind::Verb,
            Self::VERB,
            vec![Self::EXISTS],
            [slot("subj", Self::NUMBER)].into_iter().collect(),
            true,
        );
        lex.push(
            "onwards",
            TermKind::Verb,
            Self::VERB,
            vec![Self::EXISTS],
            [
                slot("subj", Self::WORD),
                slot("since", Self::NUMBER),
                slot("till", Self::NUMBER),
            ]
            .into_iter()
            .collect(),
            true,
        );
        lex
    }

    fn push(
        &mut self,
        name: &str,
        kind: TermKind,
        term_type: TermId,
        bases: Vec<TermId>,
        slots: BTreeMap<String, TermId>,
        standing: bool,
    ) -> TermId {
        self.insert(Term {
            name: name.to_string(),
            kind,
            term_type,
            bases,
            slots,
            standing,
            number: None,
        })
    }

    fn insert(&mut self, term: Term) -> TermId {
        let id = TermId::from_index(self.terms.len() as u32);
        self.lattice.add_term(id, &term.bases);
        self.by_name.insert(term.name.clone(), id);
        self.terms.push(term);
        id
    }

    /// Insert `term` unless a term of that name exists. An identical existing
    /// definition is returned as is; a different one is a repeat.
    fn define(&mut self, term: Term) -> Result<TermId, LexiconError> {
        if reads_as_number(&term.name) {
            return Err(LexiconError::IllegalName { name: term.name });
        }
        if let Some(&existing) = self.by_name.get(&term.name) {
            let old = &self.terms[existing.index()];
            if old.kind == term.kind
                && old.term_type == term.term_type
                && old.bases == term.bases
                && old.slots == term.slots
            {
                return Ok(existing);
            }
            return Err(LexiconError::TermRepeated { name: term.name });
        }
        let id = self.insert(term);
        tracing::debug!(term = %self.terms[id.index()].name, kind = %self.kind(id), "defined term");
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    pub fn get(&self, name: &str) -> Result<TermId, LexiconError> {
        self.lookup(name).ok_or_else(|| LexiconError::TermNotFound {
            name: name.to_string(),
        })
    }

    pub fn lookup(&self, name: &str) -> Option<TermId> {
        self.by_name.get(name).copied()
    }

    pub fn term(&self, id: TermId) -> &Term {
        &self.terms[id.index()]
    }

    pub fn name(&self, id: TermId) -> &str {
        &self.term(id).name
    }

    pub fn kind(&self, id: TermId) -> TermKind {
        self.term(id).kind
    }

    pub fn term_type(&self, id: TermId) -> TermId {
        self.term(id).term_type
    }

    pub fn slots(&self, id: TermId) -> &BTreeMap<String, TermId> {
        &self.term(id).slots
    }

    pub fn is_standing(&self, id: TermId) -> bool {
        self.term(id).standing
    }

    pub fn number_value(&self, id: TermId) -> Option<f64> {
        self.term(id).number
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TermId, &Term)> {
        self.terms
            .iter()
            .enumerate()
            .map(|(i, t)| (TermId::from_index(i as u32), t))
    }

    // -----------------------------------------------------------------------
    // Definitions
    // -----------------------------------------------------------------------

    /// Define a type below `bases`. The family (meta, noun or verb) comes
    /// from the first base; verb types merge their declared slots with the
    /// inherited ones, first writer wins.
    pub fn define_type(
        &mut self,
        name: &str,
        bases: &[TermId],
        slots: &[(String, TermId)],
    ) -> Result<TermId, LexiconError> {
        let first = *bases.first().ok_or_else(|| LexiconError::NoBases {
            name: name.to_string(),
        })?;
        let kind = self.kind(first);
        for base in bases {
            let base_kind = self.kind(*base);
            if !base_kind.is_type() {
                return Err(LexiconError::NotAType {
                    name: self.name(*base).to_string(),
                });
            }
            if base_kind != kind {
                return Err(LexiconError::MixedBases {
                    name: name.to_string(),
                });
            }
        }
        if !slots.is_empty() && kind != TermKind::Verb {
            return Err(LexiconError::UnexpectedSlots {
                name: name.to_string(),
            });
        }
        let merged = self.merge_slots(slots, bases)?;
        let term_type = match kind {
            TermKind::Verb => Self::VERB,
            TermKind::Noun => Self::NOUN,
            _ => Self::WORD,
        };
        let standing = bases.iter().any(|b| self.is_standing(*b));
        self.define(Term {
            name: name.to_string(),
            kind,
            term_type,
            bases: bases.to_vec(),
            slots: merged,
            standing,
            number: None,
        })
    }

    fn merge_slots(
        &self,
        declared: &[(String, TermId)],
        bases: &[TermId],
    ) -> Result<BTreeMap<String, TermId>, LexiconError> {
        let mut merged = BTreeMap::new();
        for (label, ty) in declared {
            if label.is_empty() || label.starts_with('_') {
                return Err(LexiconError::IllegalLabel {
                    label: label.clone(),
                });
            }
            if !self.kind(*ty).is_type() {
                return Err(LexiconError::NotAType {
                    name: self.name(*ty).to_string(),
                });
            }
            merged.entry(label.clone()).or_insert(*ty);
        }
        for base in bases {
            for (label, ty) in self.slots(*base) {
                merged.entry(label.clone()).or_insert(*ty);
            }
        }
        Ok(merged)
    }

    /// Define `name` as an instance of `ty`. Instances of noun kinds are noun
    /// types, instances of verb kinds are verbs, instances of value types
    /// are leaf values. Verbs have no named instances: those are predicates.
    pub fn define_instance(&mut self, name: &str, ty: TermId) -> Result<TermId, LexiconError> {
        let term = match self.kind(ty) {
            TermKind::Meta if self.are(ty, Self::VERB) => Term {
                name: name.to_string(),
                kind: TermKind::Verb,
                term_type: ty,
                bases: vec![Self::EXISTS],
                slots: self.slots(Self::EXISTS).clone(),
                standing: false,
                number: None,
            },
            TermKind::Meta => Term {
                name: name.to_string(),
                kind: TermKind::Noun,
                term_type: ty,
                bases: vec![Self::THING],
                slots: BTreeMap::new(),
                standing: false,
                number: None,
            },
            TermKind::Noun => Term {
                name: name.to_string(),
                kind: TermKind::Instance,
                term_type: ty,
                bases: vec![],
                slots: BTreeMap::new(),
                standing: false,
                number: None,
            },
            TermKind::Verb => {
                return Err(LexiconError::VerbInstance {
                    name: name.to_string(),
                    verb: self.name(ty).to_string(),
                });
            }
            TermKind::Instance => {
                return Err(LexiconError::NotAType {
                    name: self.name(ty).to_string(),
                });
            }
        };
        self.define(term)
    }

    /// Record that `a` and `b` denote the same type.
    pub fn declare_equal(&mut self, a: TermId, b: TermId) -> Result<(), LexiconError> {
        for t in [a, b] {
            if !self.kind(t).is_type() {
                return Err(LexiconError::NotAType {
                    name: self.name(t).to_string(),
                });
            }
        }
        if self.equals.contains(&(a, b)) || self.equals.contains(&(b, a)) {
            return Ok(());
        }
        self.equals.push((a, b));
        self.lattice.add_equal(a, b);
        Ok(())
    }

    /// The canonical number term for `value`, created on first use.
    pub fn number(&mut self, value: f64) -> Result<TermId, LexiconError> {
        if !value.is_finite() {
            return Err(LexiconError::InvalidNumber {
                text: value.to_string(),
            });
        }
        let name = number_name(value);
        if let Some(id) = self.lookup(&name) {
            if !self.term(id).is_number() {
                return Err(LexiconError::IllegalName { name });
            }
            return Ok(id);
        }
        Ok(self.insert(Term {
            name,
            kind: TermKind::Instance,
            term_type: Self::NUMBER,
            bases: vec![],
            slots: BTreeMap::new(),
            standing: false,
            number: Some(value),
        }))
    }

    // -----------------------------------------------------------------------
    // Lattice queries
    // -----------------------------------------------------------------------

    pub fn are(&self, a: TermId, b: TermId) -> bool {
        self.lattice.are(a, b)
    }

    pub fn is_a(&self, value: TermId, ty: TermId) -> bool {
        self.are(self.term_type(value), ty)
    }

    pub fn subtypes_of(&self, ty: TermId) -> BTreeSet<TermId> {
        self.lattice.subtypes_of(ty)
    }

    pub fn is_verb(&self, id: TermId) -> bool {
        self.kind(id) == TermKind::Verb
    }
}
