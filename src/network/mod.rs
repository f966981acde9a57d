//! Rule network: RETE-style matching over the fact store.
//!
//! The [`Network`] owns the lexicon, the fact store, the Ancestor ledger and
//! the premise trie. Asserting a fact runs the full pipeline:
//!
//! 1. Validate, and refuse if the negated fact is stored
//! 2. A fact already stored gains the new support and is not re-dispatched
//! 3. Insert into the fact trie and record its Ancestor
//! 4. Walk the premise trie with the fact, recording every premise match
//! 5. Beta-join each match with the other premises of its rules
//! 6. Test the rule's conditions on every joined binding
//! 7. Assert the instantiated consequences, supported by the joined facts
//!
//! Retraction plans the cascade with the ledger before removing anything.

pub mod condition;
pub mod expr;
pub mod join;
pub mod prem;
pub mod rule;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::binding::{Answer, Binding, merge_results};
use crate::error::{FactError, TermsResult};
use crate::factset::{FactId, FactSet, Trie};
use crate::lexicon::Lexicon;
use crate::path::Matcher;
use crate::predicate::{Predicate, Value};
use crate::provenance::{Explanation, RuleId, explain};
use crate::tms::{Ancestor, Ledger};

use join::{NumBinding, translate};
use prem::{PStep, PremId, PremNode};

pub use condition::Condition;
pub use expr::Guard;
pub use rule::{Consequence, Premise, Rule, RuleSpec, RuleState};

/// Result of asserting a fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertOutcome {
    pub fact: FactId,
    /// False when the fact was already stored.
    pub new: bool,
    /// Facts newly derived by the rule cascade.
    pub derived: Vec<FactId>,
    /// Guard failures that aborted a single firing.
    pub guard_errors: Vec<String>,
}

/// Result of activating a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOutcome {
    pub rule: RuleId,
    /// Facts derived while back-filling existing matches.
    pub derived: Vec<FactId>,
    pub guard_errors: Vec<String>,
}

/// Result of a retraction.
#[derive(Debug, Clone, PartialEq)]
pub struct RetractOutcome {
    /// Removed facts, dependents first and the retracted fact last.
    pub removed: Vec<Predicate>,
    pub cascade_depth: usize,
}

/// Counts reported by [`Network::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStats {
    pub terms: usize,
    pub facts: usize,
    pub fact_nodes: usize,
    pub ancestors: usize,
    pub rules: usize,
    pub premise_nodes: usize,
}

/// A joined binding and the facts that produced it.
#[derive(Debug, Clone, Default)]
struct Row {
    binding: Binding,
    parents: Vec<FactId>,
}

#[derive(Debug, Default)]
struct Firing {
    derived: Vec<FactId>,
    guard_errors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Network {
    lexicon: Lexicon,
    facts: FactSet,
    ledger: Ledger,
    premises: Trie<PStep, PremId>,
    prem_nodes: Vec<PremNode>,
    rules: Vec<Rule>,
}

impl Network {
    /// An empty network over a freshly bootstrapped lexicon.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    pub fn lexicon_mut(&mut self) -> &mut Lexicon {
        &mut self.lexicon
    }

    pub fn facts(&self) -> &FactSet {
        &self.facts
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn stats(&self) -> NetworkStats {
        NetworkStats {
            terms: self.lexicon.len(),
            facts: self.facts.len(),
            fact_nodes: self.facts.node_count(),
            ancestors: self.ledger.record_count(),
            rules: self.rules.len(),
            premise_nodes: self.prem_nodes.len(),
        }
    }

    pub fn render(&self, pred: &Predicate) -> String {
        pred.render(&self.lexicon)
    }

    fn rule_label(&self, rule: RuleId) -> String {
        match self.rules.get(rule).and_then(|r| r.name.as_deref()) {
            Some(name) => name.to_string(),
            None => format!("rule #{rule}"),
        }
    }

    // -----------------------------------------------------------------------
    // Questions
    // -----------------------------------------------------------------------

    /// Facts matching `pattern`, as variable bindings.
    pub fn query(&self, pattern: &Predicate) -> TermsResult<Vec<Binding>> {
        pattern.validate_pattern(&self.lexicon)?;
        Ok(self
            .facts
            .query(&self.lexicon, pattern)
            .into_iter()
            .map(|(_, b)| b)
            .collect())
    }

    /// Conjunctive question: every pattern must match, with shared variables
    /// agreeing across patterns.
    pub fn ask(&self, patterns: &[Predicate]) -> TermsResult<Answer> {
        let mut results = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            results.push(self.query(pattern)?);
        }
        Ok(merge_results(results))
    }

    /// Derivation tree of a stored fact.
    pub fn explain(&self, pred: &Predicate) -> Option<Explanation> {
        let id = self.facts.lookup(pred)?;
        explain(&self.lexicon, &self.facts, &self.ledger, id)
    }

    // -----------------------------------------------------------------------
    // Assertion
    // -----------------------------------------------------------------------

    pub fn add_fact(&mut self, pred: Predicate) -> TermsResult<AssertOutcome> {
        let mut firing = Firing::default();
        let (fact, new) = self.assert(pred, None, &mut firing)?;
        Ok(AssertOutcome {
            fact,
            new,
            derived: firing.derived,
            guard_errors: firing.guard_errors,
        })
    }

    fn assert(
        &mut self,
        pred: Predicate,
        support: Option<(&[FactId], RuleId)>,
        firing: &mut Firing,
    ) -> TermsResult<(FactId, bool)> {
        pred.validate_fact(&self.lexicon)?;
        let negated = pred.negated();
        if !self.facts.query(&self.lexicon, &negated).is_empty() {
            return Err(FactError::Contradiction {
                message: format!(
                    "{} contradicts stored {}",
                    self.render(&pred),
                    self.render(&negated)
                ),
            }
            .into());
        }
        let ancestor = |id: FactId| match support {
            None => Ancestor::asserted(id),
            Some((parents, rule)) => Ancestor::derived(parents.iter().copied(), rule),
        };

        if let Some(existing) = self.facts.lookup(&pred) {
            self.ledger.add(existing, ancestor(existing));
            debug!(fact = %self.render(&pred), "already known");
            return Ok((existing, false));
        }

        let rendered = self.render(&pred);
        let (id, _) = self.facts.insert(&self.lexicon, pred)?;
        self.ledger.add(id, ancestor(id));
        if support.is_some() {
            firing.derived.push(id);
        }
        debug!(fact = %rendered, derived = support.is_some(), "asserted");
        self.dispatch(id, firing)?;
        Ok((id, true))
    }

    /// Match a new fact against every premise and fire what it completes.
    fn dispatch(&mut self, fact: FactId, firing: &mut Firing) -> TermsResult<()> {
        let Some(pred) = self.facts.get(fact).map(|f| f.pred.clone()) else {
            return Ok(());
        };
        let hits = {
            let mut matcher = Matcher::new(&self.lexicon);
            prem::match_fact(&self.premises, &mut matcher, &pred)
        };
        if hits.is_empty() {
            return Ok(());
        }

        for (node, numbered) in &hits {
            self.prem_nodes[*node].matches.record(fact, numbered.clone());
        }

        // Join everything before firing: facts derived by one firing are
        // dispatched on their own and must not be joined here again.
        let mut pending: Vec<(RuleId, Row)> = Vec::new();
        for (node, numbered) in &hits {
            for &(rule_id, k) in &self.prem_nodes[*node].owners {
                let rule = &self.rules[rule_id];
                if rule.state != RuleState::Active {
                    continue;
                }
                let seed = Row {
                    binding: translate(numbered, &rule.premises[k].names),
                    parents: vec![fact],
                };
                for row in self.join(rule_id, Some((k, fact)), seed) {
                    pending.push((rule_id, row));
                }
            }
        }
        debug!(fact = %self.render(&pred), premises = hits.len(), rows = pending.len(), "dispatched");

        for (rule_id, row) in pending {
            self.fire(rule_id, row, firing)?;
        }
        Ok(())
    }

    /// Beta-join `seed` with the recorded matches of the rule's other
    /// premises. When a fact triggered the join at premise `k`, it is not
    /// reused at earlier premise positions, so each combination of facts is
    /// produced once even if the fact matches several premises.
    fn join(&self, rule_id: RuleId, trigger: Option<(usize, FactId)>, seed: Row) -> Vec<Row> {
        let rule = &self.rules[rule_id];
        let mut rows = vec![seed];
        for (j, premise) in rule.premises.iter().enumerate() {
            if trigger.is_some_and(|(k, _)| k == j) {
                continue;
            }
            let index = &self.prem_nodes[premise.node].matches;
            let mut next = Vec::new();
            for row in &rows {
                let constraints: Vec<(u32, &Value)> = premise
                    .names
                    .iter()
                    .enumerate()
                    .filter_map(|(num, name)| row.binding.get(name).map(|v| (num as u32, v)))
                    .collect();
                for candidate in index.candidates(&constraints) {
                    if let Some((k, fact)) = trigger {
                        if j < k && candidate == fact {
                            continue;
                        }
                    }
                    let Some(numbered) = index.get(candidate) else {
                        continue;
                    };
                    if let Some(merged) = row.binding.merge(&translate(numbered, &premise.names)) {
                        let mut parents = row.parents.clone();
                        parents.push(candidate);
                        next.push(Row {
                            binding: merged,
                            parents,
                        });
                    }
                }
            }
            rows = next;
            if rows.is_empty() {
                break;
            }
        }
        rows
    }

    fn fire(&mut self, rule_id: RuleId, row: Row, firing: &mut Firing) -> TermsResult<()> {
        let mut binding = row.binding;
        let conditions = self.rules[rule_id].conditions.clone();
        for condition in &conditions {
            match condition.test(&mut self.lexicon, &mut binding) {
                Ok(true) => {}
                Ok(false) => return Ok(()),
                Err(err) => {
                    let rule = self.rule_label(rule_id);
                    warn!(%rule, error = %err, "guard failed, firing aborted");
                    firing.guard_errors.push(format!("{rule}: {err}"));
                    return Ok(());
                }
            }
        }

        let consequences = self.rules[rule_id].consequences.clone();
        for consequence in &consequences {
            match consequence.instantiate(&binding) {
                Some(pred) => {
                    self.assert(pred, Some((&row.parents, rule_id)), firing)?;
                }
                None => {
                    let rule = self.rule_label(rule_id);
                    warn!(%rule, "consequence left unbound, skipped");
                    firing
                        .guard_errors
                        .push(format!("{rule}: consequence left unbound"));
                }
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Rules
    // -----------------------------------------------------------------------

    /// Compile a rule, wire it into the premise trie and fire it once for
    /// every combination of facts already stored.
    pub fn add_rule(&mut self, spec: RuleSpec) -> TermsResult<RuleOutcome> {
        spec.check()?;
        for pattern in &spec.premises {
            pattern.validate_pattern(&self.lexicon)?;
        }
        for consequence in &spec.consequences {
            if let Consequence::Assert(pattern) = consequence {
                pattern.validate_pattern(&self.lexicon)?;
            }
        }

        let rule_id = self.rules.len();
        let mut premises = Vec::with_capacity(spec.premises.len());
        for pattern in spec.premises {
            let compiled = prem::compile(&pattern);
            let terminal = self.premises.get_or_create(compiled.steps);
            let node = match self.premises.node(terminal).terminal {
                Some(node) => node,
                None => {
                    let node = self.prem_nodes.len();
                    let mut prem_node = PremNode::default();
                    for (fact, binding) in self.facts.query(&self.lexicon, &pattern) {
                        let numbered: NumBinding = compiled
                            .names
                            .iter()
                            .enumerate()
                            .filter_map(|(num, name)| {
                                binding.get(name).map(|v| (num as u32, v.clone()))
                            })
                            .collect();
                        prem_node.matches.record(fact, numbered);
                    }
                    self.prem_nodes.push(prem_node);
                    self.premises.node_mut(terminal).terminal = Some(node);
                    node
                }
            };
            premises.push(Premise {
                pattern,
                node,
                names: compiled.names,
            });
        }

        for (k, premise) in premises.iter().enumerate() {
            self.prem_nodes[premise.node].owners.push((rule_id, k));
        }
        self.rules.push(Rule {
            name: spec.name,
            premises,
            conditions: spec.conditions,
            consequences: spec.consequences,
            state: RuleState::Building,
        });

        let rows = self.join(rule_id, None, Row::default());
        self.rules[rule_id].state = RuleState::Active;
        info!(
            rule = %self.rule_label(rule_id),
            premises = self.rules[rule_id].premises.len(),
            backfill = rows.len(),
            "rule activated"
        );

        let mut firing = Firing::default();
        for row in rows {
            self.fire(rule_id, row, &mut firing)?;
        }
        Ok(RuleOutcome {
            rule: rule_id,
            derived: firing.derived,
            guard_errors: firing.guard_errors,
        })
    }

    // -----------------------------------------------------------------------
    // Retraction
    // -----------------------------------------------------------------------

    /// Retract a stored fact and everything left unsupported by its removal.
    pub fn del_fact(&mut self, pred: &Predicate) -> TermsResult<RetractOutcome> {
        let id = self.facts.lookup(pred).ok_or_else(|| FactError::NotFound {
            fact: self.render(pred),
        })?;
        self.retract(id)
    }

    /// Retract every fact matching `pattern`.
    pub fn retract_matching(&mut self, pattern: &Predicate) -> TermsResult<RetractOutcome> {
        pattern.validate_pattern(&self.lexicon)?;
        let targets: Vec<FactId> = self
            .facts
            .query(&self.lexicon, pattern)
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        let mut outcome = RetractOutcome {
            removed: Vec::new(),
            cascade_depth: 0,
        };
        for id in targets {
            if !self.facts.contains(id) {
                continue;
            }
            let step = self.retract(id)?;
            outcome.removed.extend(step.removed);
            outcome.cascade_depth = outcome.cascade_depth.max(step.cascade_depth);
        }
        Ok(outcome)
    }

    fn retract(&mut self, id: FactId) -> TermsResult<RetractOutcome> {
        let Some(fact) = self.facts.get(id) else {
            return Err(FactError::NotFound {
                fact: id.to_string(),
            }
            .into());
        };
        let standing = fact
            .pred
            .verb
            .as_term()
            .is_some_and(|v| self.lexicon.is_standing(v));
        let plan = self.ledger.plan_retraction(id);

        if self.ledger.is_asserted(id) && !standing && !plan.cascade.is_empty() {
            let relying: Vec<String> = plan
                .cascade
                .iter()
                .filter_map(|f| self.facts.get(*f))
                .map(|f| self.render(&f.pred))
                .collect();
            return Err(FactError::Contradiction {
                message: format!(
                    "cannot retract {}: {} still rely on it",
                    self.render(&fact.pred),
                    relying.join(", ")
                ),
            }
            .into());
        }

        let mut removed = Vec::new();
        for fact in plan.removal_order() {
            if let Some(pred) = self.remove_fact(fact) {
                debug!(fact = %self.render(&pred), "retracted");
                removed.push(pred);
            }
        }
        Ok(RetractOutcome {
            removed,
            cascade_depth: plan.cascade_depth,
        })
    }

    fn remove_fact(&mut self, id: FactId) -> Option<Predicate> {
        self.ledger.remove(id);
        for node in &mut self.prem_nodes {
            node.matches.remove(id);
        }
        self.facts.remove(id).map(|f| f.pred)
    }

    // -----------------------------------------------------------------------
    // Time
    // -----------------------------------------------------------------------

    /// The time recorded by the `(now subj T)` fact, if any.
    pub fn now(&self) -> Option<f64> {
        self.facts.iter().find_map(|(_, fact)| {
            if fact.pred.truth && fact.pred.verb.as_term() == Some(Lexicon::NOW) {
                fact.pred
                    .args
                    .get("subj")
                    .and_then(Value::as_term)
                    .and_then(|t| self.lexicon.number_value(t))
            } else {
                None
            }
        })
    }

    /// Replace `(now subj T)` by `(now subj T+1)`, starting from 0.
    pub fn tick(&mut self) -> TermsResult<f64> {
        let next = match self.now() {
            Some(current) => {
                let old = self.lexicon.number(current)?;
                let pattern = Predicate::new(Lexicon::NOW).arg("subj", old);
                self.del_fact(&pattern)?;
                current + 1.0
            }
            None => 0.0,
        };
        self.set_time(next)?;
        Ok(next)
    }

    /// Assert `(now subj T)`.
    pub fn set_time(&mut self, time: f64) -> TermsResult<AssertOutcome> {
        let t = self.lexicon.number(time)?;
        self.add_fact(Predicate::new(Lexicon::NOW).arg("subj", t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TermsError;
    use crate::lexicon::TermId;

    struct World {
        net: Network,
        person: TermId,
        john: TermId,
        anne: TermId,
        mary: TermId,
        loves: TermId,
        likes: TermId,
    }

    fn world() -> World {
        let mut net = Network::new();
        let lex = net.lexicon_mut();
        let person = lex.define_type("person", &[Lexicon::THING], &[]).unwrap();
        let john = lex.define_instance("john", person).unwrap();
        let anne = lex.define_instance("anne", person).unwrap();
        let mary = lex.define_instance("mary", person).unwrap();
        let loves = lex
            .define_type(
                "loves",
                &[Lexicon::EXISTS],
                &[("subj".into(), person), ("who".into(), person)],
            )
            .unwrap();
        let likes = lex
            .define_type(
                "likes",
                &[Lexicon::EXISTS],
                &[("subj".into(), person), ("who".into(), person)],
            )
            .unwrap();
        World {
            net,
            person,
            john,
            anne,
            mary,
            loves,
            likes,
        }
    }

    fn rel(verb: TermId, subj: impl Into<Value>, who: impl Into<Value>) -> Predicate {
        Predicate::new(verb).arg("subj", subj).arg("who", who)
    }

    #[test]
    fn assert_is_idempotent() {
        let mut w = world();
        let a = w.net.add_fact(rel(w.loves, w.john, w.anne)).unwrap();
        let b = w.net.add_fact(rel(w.loves, w.john, w.anne)).unwrap();
        assert!(a.new && !b.new);
        assert_eq!(a.fact, b.fact);
        assert_eq!(w.net.stats().facts, 1);
    }

    #[test]
    fn negation_is_exclusive() {
        let mut w = world();
        w.net.add_fact(rel(w.loves, w.john, w.anne)).unwrap();
        let err = w
            .net
            .add_fact(rel(w.loves, w.john, w.anne).truth(false))
            .unwrap_err();
        assert!(matches!(
            err,
            TermsError::Fact(FactError::Contradiction { .. })
        ));
        assert_eq!(w.net.stats().facts, 1);
        assert!(w.net.facts().lookup(&rel(w.loves, w.john, w.anne)).is_some());
    }

    #[test]
    fn simple_rule_fires_and_backfills() {
        let mut w = world();
        w.net.add_fact(rel(w.loves, w.john, w.anne)).unwrap();
        let x = w.net.lexicon().variable("Person1").unwrap();
        let y = w.net.lexicon().variable("Person2").unwrap();
        let outcome = w
            .net
            .add_rule(
                RuleSpec::new()
                    .premise(rel(w.loves, x.clone(), y.clone()))
                    .consequence(rel(w.likes, x, y)),
            )
            .unwrap();
        assert_eq!(outcome.derived.len(), 1);
        assert!(w.net.facts().lookup(&rel(w.likes, w.john, w.anne)).is_some());

        let later = w.net.add_fact(rel(w.loves, w.anne, w.mary)).unwrap();
        assert_eq!(later.derived.len(), 1);
        assert!(w.net.facts().lookup(&rel(w.likes, w.anne, w.mary)).is_some());
    }

    #[test]
    fn join_respects_shared_variables() {
        let mut w = world();
        let lex = w.net.lexicon();
        let (x, y, z) = (
            lex.variable("Person1").unwrap(),
            lex.variable("Person2").unwrap(),
            lex.variable("Person3").unwrap(),
        );
        // loves X Y, loves Y Z => likes X Z
        w.net
            .add_rule(
                RuleSpec::new()
                    .premise(rel(w.loves, x.clone(), y.clone()))
                    .premise(rel(w.loves, y, z.clone()))
                    .consequence(rel(w.likes, x, z)),
            )
            .unwrap();
        w.net.add_fact(rel(w.loves, w.john, w.anne)).unwrap();
        w.net.add_fact(rel(w.loves, w.mary, w.john)).unwrap();
        assert_eq!(w.net.stats().facts, 3);
        assert!(w.net.facts().lookup(&rel(w.likes, w.mary, w.anne)).is_some());
        assert!(w.net.facts().lookup(&rel(w.likes, w.john, w.john)).is_none());
    }

    #[test]
    fn self_join_fires_each_combination_once() {
        let mut w = world();
        let lex = w.net.lexicon();
        let (x, y) = (lex.variable("Person1").unwrap(), lex.variable("Person2").unwrap());
        w.net
            .add_rule(
                RuleSpec::new()
                    .premise(rel(w.loves, x.clone(), w.anne))
                    .premise(rel(w.loves, y.clone(), w.anne))
                    .consequence(rel(w.likes, x, y)),
            )
            .unwrap();
        let out = w.net.add_fact(rel(w.loves, w.john, w.anne)).unwrap();
        assert_eq!(out.derived.len(), 1);
        let out = w.net.add_fact(rel(w.loves, w.mary, w.anne)).unwrap();
        // (mary, john), (john, mary), (mary, mary)
        assert_eq!(out.derived.len(), 3);
    }

    #[test]
    fn retraction_safety_and_cascade() {
        let mut w = world();
        let lex = w.net.lexicon();
        let (x, y) = (lex.variable("Person1").unwrap(), lex.variable("Person2").unwrap());
        w.net
            .add_rule(
                RuleSpec::new()
                    .premise(rel(w.loves, x.clone(), y.clone()))
                    .consequence(rel(w.likes, x, y)),
            )
            .unwrap();
        let a = rel(w.loves, w.john, w.anne);
        let d = rel(w.likes, w.john, w.anne);
        w.net.add_fact(a.clone()).unwrap();

        let err = w.net.del_fact(&a).unwrap_err();
        assert!(matches!(
            err,
            TermsError::Fact(FactError::Contradiction { .. })
        ));
        assert!(w.net.facts().lookup(&d).is_some());

        let removed = w.net.del_fact(&d).unwrap();
        assert_eq!(removed.removed, vec![d.clone()]);
        w.net.del_fact(&a).unwrap();
        assert!(w.net.facts().is_empty());
        assert!(matches!(
            w.net.del_fact(&a),
            Err(TermsError::Fact(FactError::NotFound { .. }))
        ));
    }

    #[test]
    fn standing_facts_cascade_on_retraction() {
        let mut w = world();
        let n = w.net.lexicon().variable("N1").unwrap();
        w.net
            .add_rule(
                RuleSpec::new()
                    .premise(Predicate::new(Lexicon::NOW).arg("subj", n))
                    .consequence(rel(w.likes, w.john, w.anne)),
            )
            .unwrap();
        assert_eq!(w.net.tick().unwrap(), 0.0);
        assert!(w.net.facts().lookup(&rel(w.likes, w.john, w.anne)).is_some());
        assert_eq!(w.net.tick().unwrap(), 1.0);
        assert_eq!(w.net.now(), Some(1.0));
        // re-derived from the new time fact
        assert!(w.net.facts().lookup(&rel(w.likes, w.john, w.anne)).is_some());
        assert_eq!(w.net.stats().facts, 2);
    }

    #[test]
    fn guards_filter_and_assign() {
        let mut w = world();
        let lex = w.net.lexicon_mut();
        let age = lex
            .define_type("age", &[Lexicon::EXISTS], &[("subj".into(), w.person), ("years".into(), Lexicon::NUMBER)])
            .unwrap();
        let adult = lex
            .define_type("adult", &[Lexicon::EXISTS], &[("subj".into(), w.person), ("since".into(), Lexicon::NUMBER)])
            .unwrap();
        let x = lex.variable("Person1").unwrap();
        let n = lex.variable("N1").unwrap();
        let m = lex.variable("N2").unwrap();
        w.net
            .add_rule(
                RuleSpec::new()
                    .premise(Predicate::new(age).arg("subj", x.clone()).arg("years", n))
                    .condition(Condition::code("N1 >= 18; N2 = N1 - 18").unwrap())
                    .consequence(Predicate::new(adult).arg("subj", x).arg("since", m)),
            )
            .unwrap();
        let twenty = w.net.lexicon_mut().number(20.0).unwrap();
        let ten = w.net.lexicon_mut().number(10.0).unwrap();
        w.net
            .add_fact(Predicate::new(age).arg("subj", w.john).arg("years", twenty))
            .unwrap();
        w.net
            .add_fact(Predicate::new(age).arg("subj", w.anne).arg("years", ten))
            .unwrap();
        let two = w.net.lexicon_mut().number(2.0).unwrap();
        assert!(
            w.net
                .facts()
                .lookup(&Predicate::new(adult).arg("subj", w.john).arg("since", two))
                .is_some()
        );
        assert_eq!(w.net.stats().facts, 3);
    }

    #[test]
    fn guard_errors_abort_only_that_binding() {
        let mut w = world();
        let lex = w.net.lexicon();
        let (x, y) = (lex.variable("Person1").unwrap(), lex.variable("Person2").unwrap());
        w.net
            .add_rule(
                RuleSpec::new()
                    .named("broken")
                    .premise(rel(w.loves, x.clone(), y.clone()))
                    .condition(Condition::code("Person1 > 3").unwrap())
                    .consequence(rel(w.likes, x, y)),
            )
            .unwrap();
        let out = w.net.add_fact(rel(w.loves, w.john, w.anne)).unwrap();
        assert!(out.new);
        assert_eq!(out.guard_errors.len(), 1);
        assert!(out.guard_errors[0].starts_with("broken"));
        assert!(out.derived.is_empty());
    }

    #[test]
    fn ask_merges_patterns() {
        let mut w = world();
        w.net.add_fact(rel(w.loves, w.john, w.anne)).unwrap();
        w.net.add_fact(rel(w.likes, w.anne, w.mary)).unwrap();
        let lex = w.net.lexicon();
        let (x, y) = (lex.variable("Person1").unwrap(), lex.variable("Person2").unwrap());
        let answer = w
            .net
            .ask(&[rel(w.loves, w.john, x.clone()), rel(w.likes, x, y)])
            .unwrap();
        assert_eq!(answer.rows().len(), 1);
        assert_eq!(answer.rows()[0].get("Person2"), Some(&Value::term(w.mary)));

        let yes = w.net.ask(&[rel(w.loves, w.john, w.anne)]).unwrap();
        assert_eq!(yes, Answer::True);
        let no = w.net.ask(&[rel(w.loves, w.anne, w.john)]).unwrap();
        assert_eq!(no, Answer::False);
    }

    #[test]
    fn contradiction_inside_cascade_is_reported() {
        let mut w = world();
        let x = w.net.lexicon().variable("Person1").unwrap();
        w.net
            .add_rule(
                RuleSpec::new()
                    .premise(rel(w.loves, x.clone(), w.anne))
                    .consequence(rel(w.likes, x, w.anne).truth(false)),
            )
            .unwrap();
        w.net.add_fact(rel(w.likes, w.john, w.anne)).unwrap();
        let err = w.net.add_fact(rel(w.loves, w.john, w.anne)).unwrap_err();
        assert!(matches!(
            err,
            TermsError::Fact(FactError::Contradiction { .. })
        ));
    }
}
