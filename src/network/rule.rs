//! Rules: premises, conditions and consequences.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::condition::Condition;
use super::prem::PremId;
use crate::binding::Binding;
use crate::error::RuleError;
use crate::lexicon::{VarKind, Variable};
use crate::predicate::{Predicate, Value};

/// What a rule asserts when it fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Consequence {
    /// A predicate template, instantiated with the rule's binding.
    Assert(Predicate),
    /// The nested predicate bound to a predicate placeholder.
    Bound(Variable),
}

impl Consequence {
    fn variables(&self) -> Vec<&str> {
        match self {
            Consequence::Assert(p) => p.variables().into_iter().map(|v| v.name.as_str()).collect(),
            Consequence::Bound(v) => vec![v.name.as_str()],
        }
    }

    /// The ground predicate to assert under `binding`, if every variable is bound.
    pub fn instantiate(&self, binding: &Binding) -> Option<Predicate> {
        match self {
            Consequence::Assert(p) => {
                let ground = p.substitute(binding);
                ground.is_ground().then_some(ground)
            }
            Consequence::Bound(v) => match binding.get(&v.name)? {
                Value::Pred(p) if p.is_ground() => Some((**p).clone()),
                _ => None,
            },
        }
    }
}

/// A rule as handed to the network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub name: Option<String>,
    pub premises: Vec<Predicate>,
    pub conditions: Vec<Condition>,
    pub consequences: Vec<Consequence>,
}

impl RuleSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn premise(mut self, pattern: Predicate) -> Self {
        self.premises.push(pattern);
        self
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn consequence(mut self, pattern: Predicate) -> Self {
        self.consequences.push(Consequence::Assert(pattern));
        self
    }

    pub fn consequence_bound(mut self, var: Variable) -> Self {
        self.consequences.push(Consequence::Bound(var));
        self
    }

    /// Structural checks that need no lexicon: at least one premise, and
    /// every consequence variable bound by a premise or a guard.
    pub fn check(&self) -> Result<(), RuleError> {
        if self.premises.is_empty() {
            return Err(RuleError::NoPremises);
        }
        let mut bound: BTreeSet<&str> = self
            .premises
            .iter()
            .flat_map(|p| p.variables())
            .map(|v| v.name.as_str())
            .collect();
        for condition in &self.conditions {
            for var in condition.variables() {
                if !bound.contains(var) {
                    return Err(RuleError::UnboundConsequence {
                        var: var.to_string(),
                    });
                }
            }
            bound.extend(condition.assigned_names());
        }
        for consequence in &self.consequences {
            if let Consequence::Bound(v) = consequence {
                if v.kind != VarKind::Predicate {
                    return Err(RuleError::UnboundConsequence {
                        var: v.name.clone(),
                    });
                }
            }
            for var in consequence.variables() {
                if !bound.contains(var) {
                    return Err(RuleError::UnboundConsequence {
                        var: var.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Premise {
    pub pattern: Predicate,
    pub node: PremId,
    /// Rule-level variable name for each premise-local number.
    pub names: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleState {
    /// Premises compiled, not yet wired for dispatch.
    Building,
    Active,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub name: Option<String>,
    pub premises: Vec<Premise>,
    pub conditions: Vec<Condition>,
    pub consequences: Vec<Consequence>,
    pub state: RuleState,
}
