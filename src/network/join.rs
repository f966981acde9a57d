//! Join index for premise matches.
//!
//! Each premise node keeps every fact that matched it together with the
//! premise-local numbered binding. Posting lists keyed by `(variable, value)`
//! let a beta-join find the matches agreeing with a partial binding without
//! scanning all of them.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::binding::Binding;
use crate::factset::FactId;
use crate::predicate::Value;

/// Premise-local binding: variable number to value.
pub type NumBinding = BTreeMap<u32, Value>;

/// Translate a numbered binding into rule-level names.
pub fn translate(numbered: &NumBinding, names: &[String]) -> Binding {
    numbered
        .iter()
        .filter_map(|(num, value)| {
            let name = names.get(*num as usize)?;
            Some((name.clone(), value.clone()))
        })
        .collect()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchIndex {
    by_fact: BTreeMap<FactId, NumBinding>,
    postings: HashMap<(u32, Value), BTreeSet<FactId>>,
}

impl MatchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a match. Returns false if the fact was already recorded.
    pub fn record(&mut self, fact: FactId, binding: NumBinding) -> bool {
        if self.by_fact.contains_key(&fact) {
            return false;
        }
        for (num, value) in &binding {
            self.postings
                .entry((*num, value.clone()))
                .or_default()
                .insert(fact);
        }
        self.by_fact.insert(fact, binding);
        true
    }

    pub fn remove(&mut self, fact: FactId) -> bool {
        let Some(binding) = self.by_fact.remove(&fact) else {
            return false;
        };
        for (num, value) in binding {
            let key = (num, value);
            if let Some(facts) = self.postings.get_mut(&key) {
                facts.remove(&fact);
                if facts.is_empty() {
                    self.postings.remove(&key);
                }
            }
        }
        true
    }

    pub fn get(&self, fact: FactId) -> Option<&NumBinding> {
        self.by_fact.get(&fact)
    }

    pub fn contains(&self, fact: FactId) -> bool {
        self.by_fact.contains_key(&fact)
    }

    pub fn len(&self) -> usize {
        self.by_fact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_fact.is_empty()
    }

    pub fn facts(&self) -> impl Iterator<Item = (FactId, &NumBinding)> {
        self.by_fact.iter().map(|(f, b)| (*f, b))
    }

    /// Facts whose binding holds every `(variable, value)` constraint. No
    /// constraints means every recorded fact.
    pub fn candidates(&self, constraints: &[(u32, &Value)]) -> Vec<FactId> {
        let mut lists: Vec<&BTreeSet<FactId>> = Vec::with_capacity(constraints.len());
        for (num, value) in constraints {
            match self.postings.get(&(*num, (*value).clone())) {
                Some(list) => lists.push(list),
                None => return Vec::new(),
            }
        }
        lists.sort_by_key(|l| l.len());
        let Some((smallest, rest)) = lists.split_first() else {
            return self.by_fact.keys().copied().collect();
        };
        smallest
            .iter()
            .copied()
            .filter(|f| rest.iter().all(|l| l.contains(f)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::lexicon::TermId;

    fn v(i: u32) -> Value {
        Value::term(TermId::from_index(i))
    }

    fn nb(pairs: &[(u32, u32)]) -> NumBinding {
        pairs.iter().map(|(n, t)| (*n, v(*t))).collect()
    }

    #[test]
    fn postings_narrow_candidates() {
        let mut arena = Arena::new();
        let f: Vec<FactId> = (0..3).map(|i| arena.insert(i)).collect();
        let mut index = MatchIndex::new();
        index.record(f[0], nb(&[(0, 10), (1, 20)]));
        index.record(f[1], nb(&[(0, 10), (1, 21)]));
        index.record(f[2], nb(&[(0, 11), (1, 20)]));
        assert!(!index.record(f[0], nb(&[(0, 99)])));

        assert_eq!(index.candidates(&[]).len(), 3);
        assert_eq!(index.candidates(&[(0, &v(10))]), vec![f[0], f[1]]);
        assert_eq!(index.candidates(&[(0, &v(10)), (1, &v(20))]), vec![f[0]]);
        assert!(index.candidates(&[(0, &v(12))]).is_empty());

        assert!(index.remove(f[0]));
        assert!(!index.remove(f[0]));
        assert_eq!(index.candidates(&[(1, &v(20))]), vec![f[2]]);
    }

    #[test]
    fn translate_uses_rule_names() {
        let names = vec!["Person1".to_string(), "Person2".to_string()];
        let b = translate(&nb(&[(0, 1), (1, 2)]), &names);
        assert_eq!(b.get("Person2"), Some(&v(2)));
        assert_eq!(b.len(), 2);
    }
}
