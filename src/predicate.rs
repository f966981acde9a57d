//! Predicates: typed, nested, possibly non-ground assertions.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::binding::Binding;
use crate::error::FactError;
use crate::lexicon::{Lexicon, TermId, TermKind, VarKind, Variable};

/// A leaf position: a concrete term or a pattern variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Atom {
    Term(TermId),
    Var(Variable),
}

impl Atom {
    pub fn as_term(&self) -> Option<TermId> {
        match self {
            Atom::Term(t) => Some(*t),
            Atom::Var(_) => None,
        }
    }
}

/// An argument value: a leaf atom or a nested predicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Value {
    Atom(Atom),
    Pred(Box<Predicate>),
}

impl Value {
    pub fn term(id: TermId) -> Self {
        Value::Atom(Atom::Term(id))
    }

    pub fn var(var: Variable) -> Self {
        Value::Atom(Atom::Var(var))
    }

    pub fn as_term(&self) -> Option<TermId> {
        match self {
            Value::Atom(a) => a.as_term(),
            Value::Pred(_) => None,
        }
    }

    pub fn as_pred(&self) -> Option<&Predicate> {
        match self {
            Value::Pred(p) => Some(p),
            Value::Atom(_) => None,
        }
    }

    pub fn is_ground(&self) -> bool {
        match self {
            Value::Atom(Atom::Term(_)) => true,
            Value::Atom(Atom::Var(_)) => false,
            Value::Pred(p) => p.is_ground(),
        }
    }

    pub fn render(&self, lex: &Lexicon) -> String {
        match self {
            Value::Atom(Atom::Term(t)) => lex.name(*t).to_string(),
            Value::Atom(Atom::Var(v)) => v.name.clone(),
            Value::Pred(p) => p.render(lex),
        }
    }
}

impl From<Predicate> for Value {
    fn from(p: Predicate) -> Self {
        Value::Pred(Box::new(p))
    }
}

impl From<TermId> for Value {
    fn from(t: TermId) -> Self {
        Value::term(t)
    }
}

impl From<Variable> for Value {
    fn from(v: Variable) -> Self {
        Value::var(v)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Predicate {
    pub truth: bool,
    pub verb: Atom,
    /// Arguments by label; the map keeps labels in lexicographic order.
    pub args: BTreeMap<String, Value>,
}

impl Predicate {
    pub fn new(verb: TermId) -> Self {
        Self {
            truth: true,
            verb: Atom::Term(verb),
            args: BTreeMap::new(),
        }
    }

    /// A pattern whose verb is a subtype placeholder.
    pub fn with_var_verb(verb: Variable) -> Self {
        Self {
            truth: true,
            verb: Atom::Var(verb),
            args: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, label: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(label.into(), value.into());
        self
    }

    pub fn truth(mut self, truth: bool) -> Self {
        self.truth = truth;
        self
    }

    pub fn negated(&self) -> Self {
        let mut neg = self.clone();
        neg.truth = !neg.truth;
        neg
    }

    pub fn is_ground(&self) -> bool {
        matches!(self.verb, Atom::Term(_)) && self.args.values().all(Value::is_ground)
    }

    /// Every variable in the predicate, nested ones included, once each.
    pub fn variables(&self) -> Vec<&Variable> {
        let mut out: Vec<&Variable> = Vec::new();
        self.collect_vars(&mut out);
        out
    }

    fn collect_vars<'a>(&'a self, out: &mut Vec<&'a Variable>) {
        if let Atom::Var(v) = &self.verb {
            if !out.iter().any(|o| o.name == v.name) {
                out.push(v);
            }
        }
        for value in self.args.values() {
            match value {
                Value::Atom(Atom::Var(v)) => {
                    if !out.iter().any(|o| o.name == v.name) {
                        out.push(v);
                    }
                }
                Value::Atom(Atom::Term(_)) => {}
                Value::Pred(p) => p.collect_vars(out),
            }
        }
    }

    /// The value found by following `labels` down nested arguments.
    pub fn value_at(&self, labels: &[String]) -> Option<&Value> {
        let (first, rest) = labels.split_first()?;
        let value = self.args.get(first)?;
        if rest.is_empty() {
            return Some(value);
        }
        value.as_pred()?.value_at(rest)
    }

    /// Replace bound variables by their values. Unbound variables stay.
    pub fn substitute(&self, binding: &Binding) -> Predicate {
        let verb = match &self.verb {
            Atom::Var(v) => match binding.get(&v.name).and_then(Value::as_term) {
                Some(t) => Atom::Term(t),
                None => self.verb.clone(),
            },
            atom => atom.clone(),
        };
        let args = self
            .args
            .iter()
            .map(|(label, value)| (label.clone(), substitute_value(value, binding)))
            .collect();
        Predicate {
            truth: self.truth,
            verb,
            args,
        }
    }

    /// Textual form, e.g. `(loves john, who anne)` or `(!loves john, who anne)`.
    pub fn render(&self, lex: &Lexicon) -> String {
        let mut out = String::from("(");
        if !self.truth {
            out.push('!');
        }
        match &self.verb {
            Atom::Term(t) => out.push_str(lex.name(*t)),
            Atom::Var(v) => out.push_str(&v.name),
        }
        if let Some(subj) = self.args.get("subj") {
            let _ = write!(out, " {}", subj.render(lex));
        }
        for (label, value) in self.args.iter().filter(|(l, _)| l.as_str() != "subj") {
            let _ = write!(out, ", {label} {}", value.render(lex));
        }
        out.push(')');
        out
    }

    /// Check that this is an assertable fact: ground, headed by a verb, with
    /// every slot filled by a value of the slot type and no undeclared labels.
    pub fn validate_fact(&self, lex: &Lexicon) -> Result<(), FactError> {
        if !self.is_ground() {
            return Err(FactError::NotGround {
                fact: self.render(lex),
            });
        }
        self.check(lex, true)
    }

    /// Check a query or premise pattern: labels must be declared and ground
    /// fillers must fit their slot types; slots may be left out.
    pub fn validate_pattern(&self, lex: &Lexicon) -> Result<(), FactError> {
        self.check(lex, false)
    }

    fn check(&self, lex: &Lexicon, complete: bool) -> Result<(), FactError> {
        let verb = match &self.verb {
            Atom::Term(t) if lex.is_verb(*t) => *t,
            Atom::Var(v) if v.kind == VarKind::Subtype && lex.is_verb(v.range) => v.range,
            Atom::Term(t) => {
                return Err(FactError::NotAVerb {
                    name: lex.name(*t).to_string(),
                });
            }
            Atom::Var(v) => {
                return Err(FactError::NotAVerb {
                    name: v.name.clone(),
                });
            }
        };
        let verb_name = || lex.name(verb).to_string();
        let slots = lex.slots(verb);
        if complete {
            if let Some(label) = slots.keys().find(|l| !self.args.contains_key(*l)) {
                return Err(FactError::MissingObject {
                    verb: verb_name(),
                    label: label.clone(),
                });
            }
        }
        for (label, value) in &self.args {
            let Some(&slot_type) = slots.get(label) else {
                return Err(FactError::UnknownLabel {
                    verb: verb_name(),
                    label: label.clone(),
                });
            };
            let fits = match value {
                Value::Atom(Atom::Term(t)) => fits_slot(lex, *t, slot_type),
                Value::Atom(Atom::Var(_)) => true,
                Value::Pred(p) => {
                    p.check(lex, complete)?;
                    match &p.verb {
                        Atom::Term(v) => slot_type == Lexicon::WORD || lex.are(*v, slot_type),
                        Atom::Var(_) => true,
                    }
                }
            };
            if !fits {
                return Err(FactError::WrongObjectType {
                    verb: verb_name(),
                    label: label.clone(),
                    expected: lex.name(slot_type).to_string(),
                    found: value.render(lex),
                });
            }
        }
        Ok(())
    }
}

/// A term fills a slot when it is an instance of the slot type. Verb-typed
/// slots take nested predicates, never bare terms.
fn fits_slot(lex: &Lexicon, term: TermId, slot_type: TermId) -> bool {
    if lex.kind(slot_type) == TermKind::Verb {
        return false;
    }
    lex.is_a(term, slot_type)
}

fn substitute_value(value: &Value, binding: &Binding) -> Value {
    match value {
        Value::Atom(Atom::Var(v)) => binding.get(&v.name).cloned().unwrap_or_else(|| value.clone()),
        Value::Atom(Atom::Term(_)) => value.clone(),
        Value::Pred(p) => Value::Pred(Box::new(p.substitute(binding))),
    }
}
