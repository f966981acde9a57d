//! Rule conditions, tested on each fully joined binding before firing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::expr::{Guard, Val};
use crate::binding::Binding;
use crate::error::{RuleError, TermsResult};
use crate::lexicon::{Lexicon, TermId};
use crate::predicate::{Atom, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    /// The first argument is an instance of the second.
    Isa(Value, Value),
    /// The first argument is the second or one of its subtypes.
    Is(Value, Value),
    Code(Guard),
}

impl Condition {
    pub fn code(source: &str) -> Result<Self, RuleError> {
        Ok(Condition::Code(Guard::parse(source)?))
    }

    /// Variable names the condition reads.
    pub fn variables(&self) -> Vec<&str> {
        match self {
            Condition::Isa(a, b) | Condition::Is(a, b) => [a, b]
                .into_iter()
                .filter_map(|v| match v {
                    Value::Atom(Atom::Var(var)) => Some(var.name.as_str()),
                    _ => None,
                })
                .collect(),
            Condition::Code(_) => Vec::new(),
        }
    }

    /// Names a code guard may add to the binding.
    pub fn assigned_names(&self) -> Vec<&str> {
        match self {
            Condition::Code(guard) => guard.assigned_names(),
            _ => Vec::new(),
        }
    }

    /// Test the condition on `binding`. Code guards may narrow or extend the
    /// binding; assigned numbers become number terms.
    pub fn test(&self, lex: &mut Lexicon, binding: &mut Binding) -> TermsResult<bool> {
        match self {
            Condition::Isa(a, b) => Ok(match (resolve(a, binding), resolve(b, binding)) {
                (Some(Resolved::Term(x)), Some(Resolved::Term(t))) => lex.is_a(x, t),
                (Some(Resolved::Verb(v)), Some(Resolved::Term(t))) => lex.are(v, t),
                _ => false,
            }),
            Condition::Is(a, b) => Ok(match (resolve(a, binding), resolve(b, binding)) {
                (Some(Resolved::Term(x)), Some(Resolved::Term(t))) => lex.are(x, t),
                _ => false,
            }),
            Condition::Code(guard) => {
                let outcome = guard.run(guard_env(lex, binding))?;
                if !outcome.passed {
                    return Ok(false);
                }
                for (name, val) in outcome.assigned {
                    let value = match val {
                        Val::Num(n) => Value::term(lex.number(n)?),
                        Val::Term(t) => Value::term(t),
                        Val::Bool(_) => continue,
                    };
                    binding.set(&name, value);
                }
                Ok(true)
            }
        }
    }
}

enum Resolved {
    Term(TermId),
    /// A predicate, standing for its verb.
    Verb(TermId),
}

fn resolve(value: &Value, binding: &Binding) -> Option<Resolved> {
    let value = match value {
        Value::Atom(Atom::Var(v)) => binding.get(&v.name)?,
        other => other,
    };
    match value {
        Value::Atom(Atom::Term(t)) => Some(Resolved::Term(*t)),
        Value::Pred(p) => p.verb.as_term().map(Resolved::Verb),
        Value::Atom(Atom::Var(_)) => None,
    }
}

/// Bound numbers enter a guard as numbers, other terms as opaque terms.
fn guard_env(lex: &Lexicon, binding: &Binding) -> HashMap<String, Val> {
    binding
        .iter()
        .filter_map(|(name, value)| {
            let term = value.as_term()?;
            let val = match lex.number_value(term) {
                Some(n) => Val::Num(n),
                None => Val::Term(term),
            };
            Some((name.clone(), val))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex() -> (Lexicon, TermId, TermId) {
        let mut lex = Lexicon::bootstrap();
        let animal = lex.define_type("animal", &[Lexicon::THING], &[]).unwrap();
        let person = lex.define_type("person", &[animal], &[]).unwrap();
        (lex, animal, person)
    }

    #[test]
    fn isa_and_is() {
        let (mut lex, animal, person) = lex();
        let john = lex.define_instance("john", person).unwrap();
        let x = lex.variable("Person1").unwrap();
        let mut binding = Binding::new();
        binding.bind(&x.name, Value::term(john));

        let isa = Condition::Isa(Value::var(x.clone()), Value::term(animal));
        assert!(isa.test(&mut lex, &mut binding).unwrap());
        let is = Condition::Is(Value::term(person), Value::term(animal));
        assert!(is.test(&mut lex, &mut binding).unwrap());
        let not_is = Condition::Is(Value::var(x), Value::term(animal));
        assert!(!not_is.test(&mut lex, &mut binding).unwrap());
        assert_eq!(isa.variables(), vec!["Person1"]);
    }

    #[test]
    fn code_guard_coerces_numbers() {
        let (mut lex, _, _) = lex();
        let two = lex.number(2.0).unwrap();
        let five = lex.number(5.0).unwrap();
        let mut binding = Binding::new();
        binding.bind("N1", Value::term(two));
        binding.bind("N2", Value::term(five));

        let guard = Condition::code("N3 = N1 + N2; N3 > 6").unwrap();
        assert!(guard.test(&mut lex, &mut binding).unwrap());
        let seven = lex.number(7.0).unwrap();
        assert_eq!(binding.get("N3"), Some(&Value::term(seven)));
        assert_eq!(guard.assigned_names(), vec!["N3"]);

        let failing = Condition::code("N1 > N2").unwrap();
        assert!(!failing.test(&mut lex, &mut binding).unwrap());
    }

    #[test]
    fn unexpected_guard_error_propagates() {
        let (mut lex, _, _) = lex();
        let mut binding = Binding::new();
        let guard = Condition::code("N1 > 1").unwrap();
        assert!(guard.test(&mut lex, &mut binding).is_err());
    }
}
