//! End-to-end integration tests for the terms engine.
//!
//! These tests drive the public `Engine` API through the behaviours a caller
//! relies on: idempotent assertion, negation, polymorphic queries, joins,
//! truth maintenance and the JSON program format.

use terms_engine::binding::Answer;
use terms_engine::engine::Engine;
use terms_engine::error::{FactError, LexiconError, TermsError};
use terms_engine::lexicon::Lexicon;
use terms_engine::network::{Condition, RuleSpec};
use terms_engine::predicate::{Predicate, Value};
use terms_engine::program::Program;

fn test_engine() -> Engine {
    let engine = Engine::in_memory().unwrap();
    engine.define_type("animal", &["thing"], &[]).unwrap();
    engine.define_type("person", &["animal"], &[]).unwrap();
    engine.define_type("place", &["thing"], &[]).unwrap();
    engine.define_instance("john", "person").unwrap();
    engine.define_instance("anne", "person").unwrap();
    engine.define_instance("mary", "person").unwrap();
    engine.define_instance("paris", "place").unwrap();
    engine
        .define_type("loves", &["exists"], &[("who", "person")])
        .unwrap();
    engine
        .define_type("likes", &["exists"], &[("who", "person")])
        .unwrap();
    engine
        .define_type("lives", &["exists"], &[("where", "place")])
        .unwrap();
    engine
}

fn pred(engine: &Engine, verb: &str, args: &[(&str, &str)]) -> Predicate {
    args.iter().fold(
        Predicate::new(engine.term(verb).unwrap()),
        |p, (label, filler)| {
            let value: Value = if terms_engine::lexicon::is_variable_token(filler) {
                engine.variable(filler).unwrap().into()
            } else {
                engine.term(filler).unwrap().into()
            };
            p.arg(*label, value)
        },
    )
}

fn is_contradiction(err: &TermsError) -> bool {
    matches!(err, TermsError::Fact(FactError::Contradiction { .. }))
}

#[test]
fn idempotent_assert() {
    let engine = test_engine();
    let fact = pred(&engine, "loves", &[("subj", "john"), ("who", "anne")]);
    let first = engine.add_fact(fact.clone()).unwrap();
    let nodes = engine.info().unwrap().fact_nodes;
    let second = engine.add_fact(fact).unwrap();

    assert_eq!(first.fact, second.fact);
    assert!(!second.new);
    let info = engine.info().unwrap();
    assert_eq!(info.facts, 1);
    assert_eq!(info.fact_nodes, nodes);
}

#[test]
fn negation_exclusivity_both_ways() {
    let engine = test_engine();
    let fact = pred(&engine, "loves", &[("subj", "john"), ("who", "anne")]);

    engine.add_fact(fact.clone()).unwrap();
    let err = engine.add_fact(fact.negated()).unwrap_err();
    assert!(is_contradiction(&err));
    assert!(engine.ask(&[fact.clone()]).unwrap().is_true());

    let other = pred(&engine, "loves", &[("subj", "anne"), ("who", "john")]);
    engine.add_fact(other.negated()).unwrap();
    let err = engine.add_fact(other.clone()).unwrap_err();
    assert!(is_contradiction(&err));
    assert_eq!(engine.ask(&[other]).unwrap(), Answer::False);
    assert_eq!(engine.info().unwrap().facts, 2);
}

#[test]
fn polymorphic_query_widening() {
    let engine = test_engine();
    engine
        .add_fact(pred(&engine, "loves", &[("subj", "john"), ("who", "anne")]))
        .unwrap();

    let rows = engine
        .query(&pred(&engine, "loves", &[("subj", "john"), ("who", "Animal1")]))
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].get("Animal1"),
        Some(&Value::term(engine.term("anne").unwrap()))
    );

    let rows = engine
        .query(&pred(&engine, "loves", &[("subj", "john"), ("who", "Place1")]))
        .unwrap();
    assert!(rows.is_empty());
}

#[test]
fn multi_premise_join_does_not_cross_bind() {
    let engine = test_engine();
    let rule = RuleSpec::new()
        .named("neighbours")
        .premise(pred(&engine, "lives", &[("subj", "Person1"), ("where", "Place1")]))
        .premise(pred(&engine, "lives", &[("subj", "Person2"), ("where", "Place1")]))
        .condition(Condition::code("Person1 != Person2").unwrap())
        .consequence(pred(&engine, "likes", &[("subj", "Person1"), ("who", "Person2")]));
    engine.add_rule(rule).unwrap();

    engine.define_instance("rome", "place").unwrap();
    engine
        .add_fact(pred(&engine, "lives", &[("subj", "john"), ("where", "paris")]))
        .unwrap();
    engine
        .add_fact(pred(&engine, "lives", &[("subj", "anne"), ("where", "paris")]))
        .unwrap();
    engine
        .add_fact(pred(&engine, "lives", &[("subj", "mary"), ("where", "rome")]))
        .unwrap();

    let likes = engine
        .query(&pred(&engine, "likes", &[("subj", "Person1"), ("who", "Person2")]))
        .unwrap();
    assert_eq!(likes.len(), 2);
    for row in &likes {
        let rendered = engine.render_binding(row).unwrap();
        assert!(!rendered.contains("mary"), "cross-bound row {rendered}");
    }
}

#[test]
fn retraction_safety_and_cascade() {
    let engine = test_engine();
    // A & B => D, D => E
    engine
        .add_rule(
            RuleSpec::new()
                .premise(pred(&engine, "loves", &[("subj", "Person1"), ("who", "Person2")]))
                .premise(pred(&engine, "lives", &[("subj", "Person2"), ("where", "Place1")]))
                .consequence(pred(&engine, "likes", &[("subj", "Person1"), ("who", "Person2")])),
        )
        .unwrap();
    engine
        .add_rule(
            RuleSpec::new()
                .premise(pred(&engine, "likes", &[("subj", "Person1"), ("who", "Person2")]))
                .consequence(pred(&engine, "likes", &[("subj", "Person2"), ("who", "Person1")])),
        )
        .unwrap();

    let a = pred(&engine, "loves", &[("subj", "john"), ("who", "anne")]);
    let b = pred(&engine, "lives", &[("subj", "anne"), ("where", "paris")]);
    let d = pred(&engine, "likes", &[("subj", "john"), ("who", "anne")]);
    let e = pred(&engine, "likes", &[("subj", "anne"), ("who", "john")]);
    engine.add_fact(a.clone()).unwrap();
    engine.add_fact(b.clone()).unwrap();
    assert!(engine.ask(&[d.clone(), e.clone()]).unwrap().is_true());

    let err = engine.del_fact(&a).unwrap_err();
    assert!(is_contradiction(&err));
    assert!(engine.ask(&[d.clone(), b.clone()]).unwrap().is_true());

    // e is justified only through d, even though it re-derives d.
    let outcome = engine.del_fact(&d).unwrap();
    assert_eq!(outcome.removed.len(), 2);
    assert_eq!(outcome.removed.last(), Some(&d));
    assert_eq!(engine.ask(&[e]).unwrap(), Answer::False);

    engine.del_fact(&a).unwrap();
    assert_eq!(engine.info().unwrap().facts, 1);
}

#[test]
fn cascade_reaches_arbitrary_depth() {
    let engine = Engine::in_memory().unwrap();
    engine.define_type("counter", &["thing"], &[]).unwrap();
    let c = engine.define_instance("c", "counter").unwrap();
    engine.define_type("step", &["exists"], &[("at", "number")]).unwrap();
    let step = engine.term("step").unwrap();
    let at = |n: f64| {
        Predicate::new(step)
            .arg("subj", c)
            .arg("at", engine.number(n).unwrap())
    };

    // step N, N < 10, M = N + 1 => step M
    let n = engine.variable("N1").unwrap();
    let m = engine.variable("N2").unwrap();
    engine
        .add_rule(
            RuleSpec::new()
                .premise(Predicate::new(step).arg("subj", c).arg("at", n))
                .condition(Condition::code("N1 < 10; N2 = N1 + 1").unwrap())
                .consequence(Predicate::new(step).arg("subj", c).arg("at", m)),
        )
        .unwrap();

    engine.add_fact(at(0.0)).unwrap();
    assert_eq!(engine.info().unwrap().facts, 11);

    // step 1 is derived: retracting it removes steps 2..=10 too.
    let outcome = engine.del_fact(&at(1.0)).unwrap();
    assert_eq!(outcome.removed.len(), 10);
    assert_eq!(outcome.cascade_depth, 9);
    assert_eq!(engine.info().unwrap().facts, 1);
}

#[test]
fn standing_time_facts_are_superseded() {
    let engine = test_engine();
    let n = engine.variable("N1").unwrap();
    engine
        .add_rule(
            RuleSpec::new()
                .premise(Predicate::new(Lexicon::NOW).arg("subj", n))
                .consequence(pred(&engine, "loves", &[("subj", "mary"), ("who", "john")])),
        )
        .unwrap();

    assert_eq!(engine.tick().unwrap(), 0.0);
    assert_eq!(engine.tick().unwrap(), 1.0);
    assert_eq!(engine.now().unwrap(), Some(1.0));
    assert_eq!(engine.info().unwrap().facts, 2);
}

#[test]
fn end_to_end_scenario() {
    let engine = Engine::in_memory().unwrap();
    engine.define_type("person", &["thing"], &[]).unwrap();
    engine.define_instance("john", "person").unwrap();
    engine.define_instance("anne", "person").unwrap();
    engine
        .define_type("loves", &["exists"], &[("who", "person")])
        .unwrap();

    let fact = pred(&engine, "loves", &[("subj", "john"), ("who", "anne")]);
    engine.add_fact(fact.clone()).unwrap();

    let who_loves = pred(&engine, "loves", &[("subj", "Person1"), ("who", "anne")]);
    let rows = engine.query(&who_loves).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(engine.render_binding(&rows[0]).unwrap(), "Person1: john");

    let loved = pred(&engine, "loves", &[("subj", "john"), ("who", "Person1")]);
    let rows = engine.query(&loved).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(engine.render_binding(&rows[0]).unwrap(), "Person1: anne");

    engine.del_fact(&fact).unwrap();
    assert!(engine.query(&who_loves).unwrap().is_empty());
    assert!(engine.query(&loved).unwrap().is_empty());
}

#[test]
fn nested_predicates_and_bound_consequences() {
    let engine = test_engine();
    engine
        .define_type("wants", &["exists"], &[("what", "exists")])
        .unwrap();
    let wish = pred(&engine, "loves", &[("subj", "anne"), ("who", "john")]);
    let wants = engine.term("wants").unwrap();
    let john = engine.term("john").unwrap();

    // wants X (loves ...) => the wish comes true
    let placeholder = engine.variable("Loves1").unwrap();
    engine
        .add_rule(
            RuleSpec::new()
                .premise(Predicate::new(wants).arg("what", placeholder.clone()))
                .consequence_bound(placeholder),
        )
        .unwrap();
    engine
        .add_fact(Predicate::new(wants).arg("subj", john).arg("what", wish.clone()))
        .unwrap();
    assert!(engine.ask(&[wish.clone()]).unwrap().is_true());

    let explanation = engine.explain(&wish).unwrap().unwrap();
    let text = explanation.render();
    assert!(text.contains("(loves anne, who john)"));
    assert!(text.contains("(wants john, what (loves anne, who john))"));
}

#[test]
fn lexicon_errors_surface() {
    let engine = test_engine();
    assert!(matches!(
        engine.term("unicorn"),
        Err(TermsError::Lexicon(LexiconError::TermNotFound { .. }))
    ));
    assert!(matches!(
        engine.define_type("bad", &["exists"], &[("_term", "person")]),
        Err(TermsError::Lexicon(LexiconError::IllegalLabel { .. }))
    ));
    let missing = Predicate::new(engine.term("loves").unwrap()).arg("subj", engine.term("john").unwrap());
    assert!(matches!(
        engine.add_fact(missing),
        Err(TermsError::Fact(FactError::MissingObject { .. }))
    ));
    assert_eq!(engine.info().unwrap().facts, 0);
}

#[test]
fn json_program_end_to_end() {
    let engine = Engine::in_memory().unwrap();
    let program = Program::from_json(
        r#"[
        {"op": "type", "name": "person", "bases": ["thing"]},
        {"op": "instance", "name": "john", "of": "person"},
        {"op": "instance", "name": "anne", "of": "person"},
        {"op": "type", "name": "age", "bases": ["exists"], "slots": {"years": "number"}},
        {"op": "type", "name": "adult", "bases": ["exists"]},
        {"op": "rule", "name": "adulthood",
         "premises": [{"verb": "age", "args": {"subj": "Person1", "years": "N1"}}],
         "conditions": [{"code": "N1 >= 18"}],
         "consequences": [{"verb": "adult", "args": {"subj": "Person1"}}]},
        {"op": "assert", "fact": {"verb": "age", "args": {"subj": "john", "years": 30}}},
        {"op": "assert", "fact": {"verb": "age", "args": {"subj": "anne", "years": 12}}},
        {"op": "ask", "patterns": [{"verb": "adult", "args": {"subj": "Person1"}}]},
        {"op": "tick"}
    ]"#,
    )
    .unwrap();
    let reports = program.run(&engine).unwrap();
    let last_two: Vec<String> = reports[8..].iter().map(|r| r.to_string()).collect();
    assert_eq!(last_two[0], "(adult Person1)? \n  Person1: john");
    assert_eq!(last_two[1], "now 0");
}
