//! Pattern variables.
//!
//! A variable token is a capitalised type name, an optional `Noun`/`Verb`
//! marker and optional trailing digits: `Person`, `Person1`, `ThingNoun2`,
//! `LovesVerb1`, `N1`. The digits only tell variables of one type apart.
//! Variables are plain values owned by the rule or query that uses them;
//! they are never entered into the lexicon.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::Lexicon;
use super::term::{TermId, TermKind};
use crate::error::LexiconError;

static VAR_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Z][a-z]*)(Noun|Verb)?(\d*)$").expect("valid variable pattern")
});

/// What a variable ranges over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VarKind {
    /// Any instance of the range type or of its subtypes.
    Instance,
    /// The range type or any of its subtypes.
    Subtype,
    /// A nested predicate whose verb is the range or one of its subtypes.
    Predicate,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Variable {
    /// Canonical name, the token itself. Bindings are keyed by it.
    pub name: String,
    pub kind: VarKind,
    pub range: TermId,
}

impl std::fmt::Display for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Whether `token` follows the variable convention.
pub fn is_variable_token(token: &str) -> bool {
    VAR_TOKEN.is_match(token)
}

impl Lexicon {
    /// Parse a variable token and resolve its range type.
    pub fn variable(&self, token: &str) -> Result<Variable, LexiconError> {
        let caps = VAR_TOKEN
            .captures(token)
            .ok_or_else(|| LexiconError::InvalidVariable {
                token: token.to_string(),
            })?;
        let base = caps
            .get(1)
            .map(|m| m.as_str().to_lowercase())
            .unwrap_or_default();
        let marked = caps.get(2).is_some();

        if marked {
            let range = self.get(&base)?;
            if !self.kind(range).is_type() {
                return Err(LexiconError::NotAType { name: base });
            }
            return Ok(Variable {
                name: token.to_string(),
                kind: VarKind::Subtype,
                range,
            });
        }

        let range = if base.chars().count() == 1 {
            Lexicon::NUMBER
        } else {
            self.get(&base)?
        };
        let kind = match self.kind(range) {
            TermKind::Verb => VarKind::Predicate,
            TermKind::Noun | TermKind::Meta => VarKind::Instance,
            TermKind::Instance => return Err(LexiconError::NotAType { name: base }),
        };
        Ok(Variable {
            name: token.to_string(),
            kind,
            range,
        })
    }

    /// Whether the term `candidate` satisfies `var` (predicate placeholders
    /// never match a plain term).
    pub fn admits(&self, var: &Variable, candidate: TermId) -> bool {
        match var.kind {
            VarKind::Instance => self.is_a(candidate, var.range),
            VarKind::Subtype => self.are(candidate, var.range),
            VarKind::Predicate => false,
        }
    }
}
