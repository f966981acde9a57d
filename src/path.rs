//! Structural paths through predicates.
//!
//! A predicate is flattened into an ordered list of [`Path`]s, each naming a
//! position (the labels leading to a nested predicate) and the test made
//! there. Both tries are keyed by these paths, so two predicates with the
//! same structure walk the same chain of nodes.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::lexicon::{Lexicon, TermId, VarKind, Variable};
use crate::predicate::{Atom, Predicate, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Test {
    /// The verb of the predicate at `labels`.
    Verb,
    /// Its truth polarity.
    Neg,
    /// Whether the last label is present.
    Label,
    /// The term under the last label.
    Term,
}

impl Test {
    fn marker(self) -> &'static str {
        match self {
            Test::Verb => "_verb",
            Test::Neg => "_neg",
            Test::Label => "_label",
            Test::Term => "_term",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Path {
    pub labels: Vec<String>,
    pub test: Test,
}

impl Path {
    fn new(labels: &[String], test: Test) -> Self {
        Self {
            labels: labels.to_vec(),
            test,
        }
    }
}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for label in &self.labels {
            write!(f, "{label}.")?;
        }
        f.write_str(self.test.marker())
    }
}

/// Flatten `pred` depth-first: verb, polarity, then each argument in label
/// order. A predicate placeholder argument is tested on its verb only.
pub fn paths_of(pred: &Predicate) -> Vec<Path> {
    let mut out = Vec::new();
    walk_paths(pred, &mut Vec::new(), &mut out);
    out
}

fn walk_paths(pred: &Predicate, prefix: &mut Vec<String>, out: &mut Vec<Path>) {
    out.push(Path::new(prefix, Test::Verb));
    out.push(Path::new(prefix, Test::Neg));
    for (label, value) in &pred.args {
        prefix.push(label.clone());
        out.push(Path::new(prefix, Test::Label));
        match value {
            Value::Pred(nested) => walk_paths(nested, prefix, out),
            Value::Atom(Atom::Var(v)) if v.kind == VarKind::Predicate => {
                out.push(Path::new(prefix, Test::Verb));
            }
            Value::Atom(_) => out.push(Path::new(prefix, Test::Term)),
        }
        prefix.pop();
    }
}

/// What a predicate holds at a path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Probe<'a> {
    Verb(&'a Atom),
    /// A predicate placeholder sits where a nested verb would be.
    PredVar(&'a Variable),
    Truth(bool),
    LabelPresent,
    Atom(&'a Atom),
    /// The predicate does not mention this position.
    Absent,
    /// The position lies inside the nested predicate a placeholder stands for.
    Inside(&'a Variable),
    /// The predicate has an incompatible shape here.
    Mismatch,
}

/// Resolve `path` against `pred`.
pub fn probe<'a>(pred: &'a Predicate, path: &Path) -> Probe<'a> {
    let mut current = pred;
    let depth = path.labels.len();
    for (i, label) in path.labels.iter().enumerate() {
        let Some(value) = current.args.get(label) else {
            return Probe::Absent;
        };
        let last = i + 1 == depth;
        if last && path.test == Test::Label {
            return Probe::LabelPresent;
        }
        if last && path.test == Test::Term {
            return match value {
                Value::Atom(a @ Atom::Term(_)) => Probe::Atom(a),
                Value::Atom(a @ Atom::Var(v)) if v.kind != VarKind::Predicate => Probe::Atom(a),
                _ => Probe::Mismatch,
            };
        }
        match value {
            Value::Pred(nested) => current = nested,
            Value::Atom(Atom::Var(v)) if v.kind == VarKind::Predicate => {
                return if last && path.test == Test::Verb {
                    Probe::PredVar(v)
                } else {
                    Probe::Inside(v)
                };
            }
            Value::Atom(_) => return Probe::Mismatch,
        }
    }
    match path.test {
        Test::Verb => Probe::Verb(&current.verb),
        Test::Neg => Probe::Truth(current.truth),
        Test::Label | Test::Term => Probe::Mismatch,
    }
}

/// Lattice queries made during one walk, with subtype sets cached.
pub struct Matcher<'a> {
    pub lex: &'a Lexicon,
    subtypes: HashMap<TermId, BTreeSet<TermId>>,
}

impl<'a> Matcher<'a> {
    pub fn new(lex: &'a Lexicon) -> Self {
        Self {
            lex,
            subtypes: HashMap::new(),
        }
    }

    fn subtypes(&mut self, ty: TermId) -> &BTreeSet<TermId> {
        let lex = self.lex;
        self.subtypes
            .entry(ty)
            .or_insert_with(|| lex.subtypes_of(ty))
    }

    /// Whether `a` is `b` or a subtype of it.
    pub fn are(&mut self, a: TermId, b: TermId) -> bool {
        a == b || self.subtypes(b).contains(&a)
    }

    /// Whether the term `candidate` may stand where `var` is.
    pub fn admits(&mut self, var: &Variable, candidate: TermId) -> bool {
        self.fits(var.kind, var.range, candidate)
    }

    pub fn fits(&mut self, kind: VarKind, range: TermId, candidate: TermId) -> bool {
        match kind {
            VarKind::Instance => {
                let ty = self.lex.term_type(candidate);
                self.are(ty, range)
            }
            VarKind::Subtype => self.are(candidate, range),
            VarKind::Predicate => false,
        }
    }

    /// Whether a nested predicate headed by `verb` may stand where the
    /// predicate placeholder `var` is.
    pub fn admits_verb(&mut self, var: &Variable, verb: TermId) -> bool {
        var.kind == VarKind::Predicate && self.are(verb, var.range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Lexicon, Predicate) {
        let mut lex = Lexicon::bootstrap();
        let person = lex.define_type("person", &[Lexicon::THING], &[]).unwrap();
        let john = lex.define_instance("john", person).unwrap();
        let anne = lex.define_instance("anne", person).unwrap();
        let loves = lex
            .define_type("loves", &[Lexicon::EXISTS], &[("who".into(), person)])
            .unwrap();
        let wants = lex
            .define_type("wants", &[Lexicon::EXISTS], &[("what".into(), Lexicon::EXISTS)])
            .unwrap();
        let inner = Predicate::new(loves).arg("subj", anne).arg("who", john);
        let outer = Predicate::new(wants).arg("subj", john).arg("what", inner);
        (lex, outer)
    }

    #[test]
    fn paths_are_depth_first_in_label_order() {
        let (_, outer) = setup();
        let rendered: Vec<String> = paths_of(&outer).iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "_verb",
                "_neg",
                "subj._label",
                "subj._term",
                "what._label",
                "what._verb",
                "what._neg",
                "what.subj._label",
                "what.subj._term",
                "what.who._label",
                "what.who._term",
            ]
        );
    }

    #[test]
    fn placeholder_paths_stop_at_the_verb() {
        let (lex, outer) = setup();
        let var = lex.variable("Loves1").unwrap();
        let pattern = Predicate {
            truth: true,
            verb: outer.verb.clone(),
            args: [("what".to_string(), Value::var(var.clone()))].into_iter().collect(),
        };
        let paths = paths_of(&pattern);
        assert_eq!(paths.len(), 4);
        let nested_verb = &paths[3];
        assert_eq!(probe(&pattern, nested_verb), Probe::PredVar(&var));
        let nested_neg = Path::new(&["what".into()], Test::Neg);
        assert_eq!(probe(&pattern, &nested_neg), Probe::Inside(&var));
    }

    #[test]
    fn probe_resolves_positions() {
        let (_, outer) = setup();
        let term_path = Path::new(&["what".into(), "who".into()], Test::Term);
        assert!(matches!(probe(&outer, &term_path), Probe::Atom(Atom::Term(_))));
        let absent = Path::new(&["where".into()], Test::Label);
        assert_eq!(probe(&outer, &absent), Probe::Absent);
        let shape = Path::new(&["subj".into()], Test::Verb);
        assert_eq!(probe(&outer, &shape), Probe::Mismatch);
        assert_eq!(probe(&outer, &Path::new(&[], Test::Neg)), Probe::Truth(true));
    }

    #[test]
    fn matcher_widens_to_subtypes() {
        let (mut lex, _) = setup();
        let animal = lex.define_type("animal", &[Lexicon::THING], &[]).unwrap();
        let dog = lex.define_type("dog", &[animal], &[]).unwrap();
        let rex = lex.define_instance("rex", dog).unwrap();
        let mut m = Matcher::new(&lex);
        let any_animal = lex.variable("Animal1").unwrap();
        let any_person = lex.variable("Person1").unwrap();
        assert!(m.admits(&any_animal, rex));
        assert!(!m.admits(&any_person, rex));
        let kind = lex.variable("AnimalNoun1").unwrap();
        assert!(m.admits(&kind, dog));
        assert!(!m.admits(&kind, rex));
    }
}
