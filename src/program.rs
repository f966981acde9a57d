//! JSON operation stream.
//!
//! A program is what a front-end parser hands to the engine: a JSON array of
//! operations, each tagged by `op`.
//!
//! ```json
//! [
//!   {"op": "type", "name": "person", "bases": ["thing"]},
//!   {"op": "instance", "name": "john", "of": "person"},
//!   {"op": "type", "name": "loves", "bases": ["exists"], "slots": {"who": "person"}},
//!   {"op": "assert", "fact": {"verb": "loves", "args": {"subj": "john", "who": "anne"}}},
//!   {"op": "rule",
//!    "premises": [{"verb": "loves", "args": {"subj": "Person1", "who": "Person2"}}],
//!    "consequences": [{"verb": "likes", "args": {"subj": "Person1", "who": "Person2"}}]},
//!   {"op": "ask", "patterns": [{"verb": "likes", "args": {"subj": "Person1"}}]},
//!   {"op": "tick"}
//! ]
//! ```
//!
//! Argument fillers are term names, numbers, variable tokens or nested
//! predicates. Each mutating operation runs as its own engine transaction;
//! questions run under the read lock.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::Engine;
use crate::error::{EngineError, LexiconError, TermsResult};
use crate::factset::FactId;
use crate::lexicon::{Lexicon, TermId, is_variable_token, number_name};
use crate::network::{Condition, Network, RuleSpec};
use crate::predicate::{Predicate, Value};

fn default_true() -> bool {
    true
}

/// A predicate as written in a program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredicateDoc {
    pub verb: String,
    #[serde(rename = "true", default = "default_true")]
    pub truth: bool,
    #[serde(default)]
    pub args: BTreeMap<String, ArgDoc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgDoc {
    Number(f64),
    Name(String),
    Pred(Box<PredicateDoc>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionDoc {
    Isa([String; 2]),
    Is([String; 2]),
    Code(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConsequenceDoc {
    Fact(PredicateDoc),
    /// A predicate placeholder bound by a premise.
    Bound(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Op {
    Type {
        name: String,
        bases: Vec<String>,
        #[serde(default)]
        slots: BTreeMap<String, String>,
    },
    Instance {
        name: String,
        of: String,
    },
    Equal {
        a: String,
        b: String,
    },
    Assert {
        fact: PredicateDoc,
    },
    /// Retract a fact, or every fact matching a pattern with variables.
    Retract {
        fact: PredicateDoc,
    },
    Rule {
        #[serde(default)]
        name: Option<String>,
        premises: Vec<PredicateDoc>,
        #[serde(default)]
        conditions: Vec<ConditionDoc>,
        consequences: Vec<ConsequenceDoc>,
    },
    Ask {
        patterns: Vec<PredicateDoc>,
    },
    Tick,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Program {
    pub ops: Vec<Op>,
}

impl Program {
    pub fn from_json(text: &str) -> TermsResult<Self> {
        serde_json::from_str(text).map_err(|e| {
            EngineError::Program {
                message: e.to_string(),
            }
            .into()
        })
    }

    pub fn load(path: &Path) -> TermsResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| EngineError::Program {
            message: format!("{}: {e}", path.display()),
        })?;
        Self::from_json(&text)
    }

    /// Run every operation in order, stopping at the first failure.
    pub fn run(&self, engine: &Engine) -> TermsResult<Vec<Report>> {
        self.ops.iter().map(|op| op.execute(engine)).collect()
    }
}

/// What one operation did, rendered for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum Report {
    Defined {
        name: String,
    },
    Equal {
        a: String,
        b: String,
    },
    Asserted {
        fact: String,
        new: bool,
        derived: Vec<String>,
        guard_errors: Vec<String>,
    },
    Retracted {
        removed: Vec<String>,
    },
    Rule {
        name: String,
        derived: Vec<String>,
        guard_errors: Vec<String>,
    },
    Answer {
        question: String,
        holds: bool,
        rows: Vec<String>,
    },
    Tick {
        now: f64,
    },
}

impl std::fmt::Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Report::Defined { name } => write!(f, "defined {name}"),
            Report::Equal { a, b } => write!(f, "{a} = {b}"),
            Report::Asserted {
                fact,
                new,
                derived,
                guard_errors,
            } => {
                if *new {
                    write!(f, "asserted {fact}")?;
                } else {
                    write!(f, "already known {fact}")?;
                }
                for d in derived {
                    write!(f, "\n  derived {d}")?;
                }
                for e in guard_errors {
                    write!(f, "\n  guard error: {e}")?;
                }
                Ok(())
            }
            Report::Retracted { removed } => {
                write!(f, "retracted {} fact(s)", removed.len())?;
                for r in removed {
                    write!(f, "\n  {r}")?;
                }
                Ok(())
            }
            Report::Rule {
                name,
                derived,
                guard_errors,
            } => {
                write!(f, "rule {name} active")?;
                for d in derived {
                    write!(f, "\n  derived {d}")?;
                }
                for e in guard_errors {
                    write!(f, "\n  guard error: {e}")?;
                }
                Ok(())
            }
            Report::Answer {
                question,
                holds,
                rows,
            } => {
                write!(f, "{question}? ")?;
                match (holds, rows.is_empty()) {
                    (false, _) => write!(f, "no"),
                    (true, true) => write!(f, "yes"),
                    (true, false) => {
                        for row in rows {
                            write!(f, "\n  {row}")?;
                        }
                        Ok(())
                    }
                }
            }
            Report::Tick { now } => write!(f, "now {now}"),
        }
    }
}

impl Op {
    pub fn execute(&self, engine: &Engine) -> TermsResult<Report> {
        match self {
            Op::Type { name, bases, slots } => {
                let bases: Vec<&str> = bases.iter().map(String::as_str).collect();
                let slots: Vec<(&str, &str)> = slots
                    .iter()
                    .map(|(label, ty)| (label.as_str(), ty.as_str()))
                    .collect();
                engine.define_type(name, &bases, &slots)?;
                Ok(Report::Defined { name: name.clone() })
            }
            Op::Instance { name, of } => {
                engine.define_instance(name, of)?;
                Ok(Report::Defined { name: name.clone() })
            }
            Op::Equal { a, b } => {
                engine.declare_equal(a, b)?;
                Ok(Report::Equal {
                    a: a.clone(),
                    b: b.clone(),
                })
            }
            Op::Assert { fact } => engine.transact("assert", |net| {
                let pred = predicate(net, fact)?;
                let rendered = net.render(&pred);
                let outcome = net.add_fact(pred)?;
                Ok(Report::Asserted {
                    fact: rendered,
                    new: outcome.new,
                    derived: render_facts(net, &outcome.derived),
                    guard_errors: outcome.guard_errors,
                })
            }),
            Op::Retract { fact } => engine.transact("retract", |net| {
                let pred = predicate(net, fact)?;
                let outcome = if pred.is_ground() {
                    net.del_fact(&pred)?
                } else {
                    net.retract_matching(&pred)?
                };
                Ok(Report::Retracted {
                    removed: outcome.removed.iter().map(|p| net.render(p)).collect(),
                })
            }),
            Op::Rule {
                name,
                premises,
                conditions,
                consequences,
            } => engine.transact("rule", |net| {
                let mut spec = RuleSpec::new();
                spec.name = name.clone();
                for doc in premises {
                    spec = spec.premise(predicate(net, doc)?);
                }
                for doc in conditions {
                    spec = spec.condition(condition(net, doc)?);
                }
                for doc in consequences {
                    spec = match doc {
                        ConsequenceDoc::Fact(doc) => spec.consequence(predicate(net, doc)?),
                        ConsequenceDoc::Bound(token) => {
                            spec.consequence_bound(net.lexicon().variable(token)?)
                        }
                    };
                }
                let outcome = net.add_rule(spec)?;
                Ok(Report::Rule {
                    name: name.clone().unwrap_or_else(|| format!("#{}", outcome.rule)),
                    derived: render_facts(net, &outcome.derived),
                    guard_errors: outcome.guard_errors,
                })
            }),
            Op::Ask { patterns } => {
                // Questions normally resolve under the read lock. Only a
                // number literal with no term yet needs the write path.
                let answered = engine.read(|net| {
                    let mut lookup = Lookup::new(net.lexicon());
                    let resolved = resolve_all(&mut lookup, patterns)?;
                    if lookup.unknown_number {
                        return Ok(None);
                    }
                    answer(net, &resolved).map(Some)
                })??;
                match answered {
                    Some(report) => Ok(report),
                    None => engine.transact("ask", |net| {
                        let resolved = resolve_all(net, patterns)?;
                        answer(net, &resolved)
                    }),
                }
            }
            Op::Tick => Ok(Report::Tick {
                now: engine.tick()?,
            }),
        }
    }
}

fn render_facts(net: &Network, ids: &[FactId]) -> Vec<String> {
    ids.iter()
        .filter_map(|id| net.facts().get(*id))
        .map(|fact| net.render(&fact.pred))
        .collect()
}

fn answer(net: &Network, patterns: &[Predicate]) -> TermsResult<Report> {
    let question = patterns
        .iter()
        .map(|p| net.render(p))
        .collect::<Vec<_>>()
        .join("; ");
    let answer = net.ask(patterns)?;
    let rows = answer
        .rows()
        .iter()
        .map(|b| b.render(net.lexicon()))
        .collect();
    Ok(Report::Answer {
        question,
        holds: answer.is_true(),
        rows,
    })
}

/// Where resolution finds terms, and how it obtains number terms.
pub trait Resolver {
    fn lexicon(&self) -> &Lexicon;
    fn number(&mut self, value: f64) -> TermsResult<TermId>;
}

/// Numbers are created on first use.
impl Resolver for Network {
    fn lexicon(&self) -> &Lexicon {
        Network::lexicon(self)
    }

    fn number(&mut self, value: f64) -> TermsResult<TermId> {
        Ok(self.lexicon_mut().number(value)?)
    }
}

/// Read-only resolution. A number with no term yet is flagged and stands in
/// as the `number` type; the caller retries on the write path.
pub struct Lookup<'a> {
    lexicon: &'a Lexicon,
    pub unknown_number: bool,
}

impl<'a> Lookup<'a> {
    pub fn new(lexicon: &'a Lexicon) -> Self {
        Self {
            lexicon,
            unknown_number: false,
        }
    }
}

impl Resolver for Lookup<'_> {
    fn lexicon(&self) -> &Lexicon {
        self.lexicon
    }

    fn number(&mut self, value: f64) -> TermsResult<TermId> {
        if !value.is_finite() {
            return Err(LexiconError::InvalidNumber {
                text: value.to_string(),
            }
            .into());
        }
        let known = self
            .lexicon
            .lookup(&number_name(value))
            .filter(|id| self.lexicon.term(*id).is_number());
        Ok(known.unwrap_or_else(|| {
            self.unknown_number = true;
            Lexicon::NUMBER
        }))
    }
}

fn resolve_all<R: Resolver>(terms: &mut R, docs: &[PredicateDoc]) -> TermsResult<Vec<Predicate>> {
    docs.iter().map(|doc| predicate(terms, doc)).collect()
}

/// Resolve a predicate document against the lexicon.
pub fn predicate<R: Resolver>(terms: &mut R, doc: &PredicateDoc) -> TermsResult<Predicate> {
    let head = if is_variable_token(&doc.verb) {
        Predicate::with_var_verb(terms.lexicon().variable(&doc.verb)?)
    } else {
        Predicate::new(terms.lexicon().get(&doc.verb)?)
    };
    let mut pred = head.truth(doc.truth);
    for (label, arg) in &doc.args {
        let value = value(terms, arg)?;
        pred = pred.arg(label.clone(), value);
    }
    Ok(pred)
}

fn value<R: Resolver>(terms: &mut R, arg: &ArgDoc) -> TermsResult<Value> {
    Ok(match arg {
        ArgDoc::Number(n) => Value::term(terms.number(*n)?),
        ArgDoc::Name(name) => name_value(terms, name)?,
        ArgDoc::Pred(doc) => Value::from(predicate(terms, doc)?),
    })
}

fn name_value<R: Resolver>(terms: &mut R, name: &str) -> TermsResult<Value> {
    if is_variable_token(name) {
        return Ok(Value::var(terms.lexicon().variable(name)?));
    }
    if let Some(id) = terms.lexicon().lookup(name) {
        return Ok(Value::term(id));
    }
    match name.parse::<f64>() {
        Ok(n) => Ok(Value::term(terms.number(n)?)),
        Err(_) => Ok(Value::term(terms.lexicon().get(name)?)),
    }
}

fn condition(net: &mut Network, doc: &ConditionDoc) -> TermsResult<Condition> {
    Ok(match doc {
        ConditionDoc::Isa([a, b]) => Condition::Isa(name_value(net, a)?, name_value(net, b)?),
        ConditionDoc::Is([a, b]) => Condition::Is(name_value(net, a)?, name_value(net, b)?),
        ConditionDoc::Code(source) => Condition::code(source)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FactError, TermsError};

    const FAMILY: &str = r#"[
        {"op": "type", "name": "person", "bases": ["thing"]},
        {"op": "instance", "name": "john", "of": "person"},
        {"op": "instance", "name": "anne", "of": "person"},
        {"op": "type", "name": "loves", "bases": ["exists"], "slots": {"who": "person"}},
        {"op": "type", "name": "likes", "bases": ["exists"], "slots": {"who": "person"}},
        {"op": "rule", "name": "love-implies-liking",
         "premises": [{"verb": "loves", "args": {"subj": "Person1", "who": "Person2"}}],
         "consequences": [{"verb": "likes", "args": {"subj": "Person1", "who": "Person2"}}]},
        {"op": "assert", "fact": {"verb": "loves", "args": {"subj": "john", "who": "anne"}}},
        {"op": "ask", "patterns": [{"verb": "likes", "args": {"subj": "Person1", "who": "anne"}}]}
    ]"#;

    #[test]
    fn runs_a_small_program() {
        let engine = Engine::in_memory().unwrap();
        let program = Program::from_json(FAMILY).unwrap();
        assert_eq!(program.ops.len(), 8);
        let reports = program.run(&engine).unwrap();

        match &reports[6] {
            Report::Asserted { fact, new, derived, .. } => {
                assert_eq!(fact, "(loves john, who anne)");
                assert!(*new);
                assert_eq!(derived, &vec!["(likes john, who anne)".to_string()]);
            }
            other => panic!("unexpected report {other:?}"),
        }
        match &reports[7] {
            Report::Answer { holds, rows, .. } => {
                assert!(*holds);
                assert_eq!(rows, &vec!["Person1: john".to_string()]);
            }
            other => panic!("unexpected report {other:?}"),
        }
    }

    #[test]
    fn retract_with_pattern_removes_every_match() {
        let engine = Engine::in_memory().unwrap();
        Program::from_json(
            r#"[
            {"op": "type", "name": "color", "bases": ["thing"]},
            {"op": "instance", "name": "red", "of": "color"},
            {"op": "type", "name": "seen", "bases": ["exists"], "slots": {"at": "number"}},
            {"op": "assert", "fact": {"verb": "seen", "args": {"subj": "red", "at": 1}}},
            {"op": "assert", "fact": {"verb": "seen", "args": {"subj": "red", "at": "2"}}}
        ]"#,
        )
        .unwrap()
        .run(&engine)
        .unwrap();
        let op = Op::Retract {
            fact: PredicateDoc {
                verb: "seen".into(),
                truth: true,
                args: [("subj".to_string(), ArgDoc::Name("red".into()))]
                    .into_iter()
                    .collect(),
            },
        };
        match op.execute(&engine).unwrap() {
            Report::Retracted { removed } => assert_eq!(removed.len(), 2),
            other => panic!("unexpected report {other:?}"),
        }
        assert_eq!(engine.info().unwrap().facts, 0);
    }

    #[test]
    fn failing_operation_stops_the_run() {
        let engine = Engine::in_memory().unwrap();
        let program = Program::from_json(
            r#"[
            {"op": "type", "name": "person", "bases": ["thing"]},
            {"op": "instance", "name": "john", "of": "person"},
            {"op": "type", "name": "sings", "bases": ["exists"]},
            {"op": "assert", "fact": {"verb": "sings", "args": {"subj": "john"}}},
            {"op": "assert", "fact": {"verb": "sings", "true": false, "args": {"subj": "john"}}},
            {"op": "tick"}
        ]"#,
        )
        .unwrap();
        let err = program.run(&engine).unwrap_err();
        assert!(matches!(
            err,
            TermsError::Fact(FactError::Contradiction { .. })
        ));
        assert_eq!(engine.info().unwrap().facts, 1);
        assert_eq!(engine.now().unwrap(), None);
    }

    fn ask_doc(json: &str) -> Op {
        Op::Ask {
            patterns: serde_json::from_str(json).unwrap(),
        }
    }

    #[test]
    fn questions_over_known_terms_do_not_touch_the_lexicon() {
        let engine = Engine::in_memory().unwrap();
        Program::from_json(FAMILY).unwrap().run(&engine).unwrap();
        let before = engine.info().unwrap();

        let patterns: Vec<PredicateDoc> =
            serde_json::from_str(r#"[{"verb": "loves", "args": {"subj": "Person1"}}]"#).unwrap();
        let report = engine
            .read(|net| {
                let mut lookup = Lookup::new(net.lexicon());
                let resolved = resolve_all(&mut lookup, &patterns).unwrap();
                assert!(!lookup.unknown_number);
                answer(net, &resolved).unwrap()
            })
            .unwrap();
        assert_eq!(report, Op::Ask { patterns }.execute(&engine).unwrap());
        assert_eq!(engine.info().unwrap(), before);
    }

    #[test]
    fn question_with_a_new_number_takes_the_write_path() {
        let engine = Engine::in_memory().unwrap();
        Program::from_json(
            r#"[
            {"op": "type", "name": "seen", "bases": ["exists"], "slots": {"at": "number"}},
            {"op": "instance", "name": "red", "of": "thing"},
            {"op": "assert", "fact": {"verb": "seen", "args": {"subj": "red", "at": 1}}}
        ]"#,
        )
        .unwrap()
        .run(&engine)
        .unwrap();
        let terms = engine.info().unwrap().terms;

        let known = ask_doc(r#"[{"verb": "seen", "args": {"subj": "Thing1", "at": 1}}]"#);
        match known.execute(&engine).unwrap() {
            Report::Answer { holds, rows, .. } => {
                assert!(holds);
                assert_eq!(rows, vec!["Thing1: red".to_string()]);
            }
            other => panic!("unexpected report {other:?}"),
        }
        assert_eq!(engine.info().unwrap().terms, terms);

        engine
            .read(|net| {
                let mut lookup = Lookup::new(net.lexicon());
                lookup.number(7.0).unwrap();
                assert!(lookup.unknown_number);
            })
            .unwrap();
        let fresh = ask_doc(r#"[{"verb": "seen", "args": {"at": 7}}]"#);
        match fresh.execute(&engine).unwrap() {
            Report::Answer {
                question, holds, ..
            } => {
                assert_eq!(question, "(seen, at 7)");
                assert!(!holds);
            }
            other => panic!("unexpected report {other:?}"),
        }
        assert_eq!(engine.info().unwrap().terms, terms + 1);
    }

    #[test]
    fn malformed_json_is_a_program_error() {
        assert!(matches!(
            Program::from_json(r#"[{"op": "fly"}]"#),
            Err(TermsError::Engine(EngineError::Program { .. }))
        ));
    }

    #[test]
    fn conditions_and_bound_consequences_parse() {
        let program = Program::from_json(
            r#"[{"op": "rule",
                "premises": [{"verb": "wants", "args": {"what": "Exists1"}}],
                "conditions": [{"code": "condition"}, {"isa": ["Person1", "person"]}],
                "consequences": ["Exists1"]}]"#,
        )
        .unwrap();
        let Op::Rule {
            conditions,
            consequences,
            ..
        } = &program.ops[0]
        else {
            panic!("expected a rule");
        };
        assert_eq!(conditions.len(), 2);
        assert_eq!(consequences, &vec![ConsequenceDoc::Bound("Exists1".into())]);
    }
}
