//! Variable bindings and the merge of several query results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::lexicon::Lexicon;
use crate::predicate::Value;

/// Variable name to matched value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Binding(BTreeMap<String, Value>);

impl Binding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Bind `name` to `value`. Returns false, leaving the binding untouched,
    /// when `name` is already bound to something else.
    pub fn bind(&mut self, name: &str, value: Value) -> bool {
        match self.0.get(name) {
            Some(existing) => *existing == value,
            None => {
                self.0.insert(name.to_string(), value);
                true
            }
        }
    }

    /// Overwrite the value of `name`.
    pub fn set(&mut self, name: &str, value: Value) {
        self.0.insert(name.to_string(), value);
    }

    /// The union of two bindings, if they agree on every shared variable.
    pub fn merge(&self, other: &Binding) -> Option<Binding> {
        let mut out = self.clone();
        for (name, value) in &other.0 {
            if !out.bind(name, value.clone()) {
                return None;
            }
        }
        Some(out)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn render(&self, lex: &Lexicon) -> String {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(name, value)| format!("{name}: {}", value.render(lex)))
            .collect();
        parts.join(", ")
    }
}

impl FromIterator<(String, Value)> for Binding {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Binding(iter.into_iter().collect())
    }
}

/// Result of a conjunctive question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Answer {
    /// Some pattern matched nothing, or the matches do not agree.
    False,
    /// Every pattern matched and none of them binds a variable.
    True,
    Rows(Vec<Binding>),
}

impl Answer {
    pub fn is_true(&self) -> bool {
        !matches!(self, Answer::False)
    }

    pub fn rows(&self) -> &[Binding] {
        match self {
            Answer::Rows(rows) => rows,
            _ => &[],
        }
    }
}

/// Merge the per-pattern results of a conjunctive query.
///
/// An empty result makes the whole answer false. A result whose first row is
/// empty came from a ground pattern that matched: it is true and constrains
/// nothing. The remaining results are cross-merged, keeping only rows that
/// agree on shared variables.
pub fn merge_results(results: Vec<Vec<Binding>>) -> Answer {
    let mut acc: Option<Vec<Binding>> = None;
    for rows in results {
        let Some(first) = rows.first() else {
            return Answer::False;
        };
        if first.is_empty() {
            continue;
        }
        acc = Some(match acc {
            None => rows,
            Some(prev) => {
                let mut merged = Vec::new();
                for a in &prev {
                    for b in &rows {
                        if let Some(m) = a.merge(b) {
                            if !merged.contains(&m) {
                                merged.push(m);
                            }
                        }
                    }
                }
                if merged.is_empty() {
                    return Answer::False;
                }
                merged
            }
        });
    }
    match acc {
        None => Answer::True,
        Some(rows) => Answer::Rows(rows),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::TermId;

    fn b(pairs: &[(&str, u32)]) -> Binding {
        pairs
            .iter()
            .map(|(n, t)| (n.to_string(), Value::term(TermId::from_index(*t))))
            .collect()
    }

    #[test]
    fn bind_refuses_conflicts() {
        let mut x = b(&[("X1", 1)]);
        assert!(x.bind("X1", Value::term(TermId::from_index(1))));
        assert!(!x.bind("X1", Value::term(TermId::from_index(2))));
        assert!(x.bind("Y1", Value::term(TermId::from_index(2))));
        assert_eq!(x.len(), 2);
    }

    #[test]
    fn merge_requires_agreement() {
        let a = b(&[("X1", 1), ("Y1", 2)]);
        let c = b(&[("X1", 1), ("Z1", 3)]);
        let d = b(&[("X1", 9)]);
        assert_eq!(a.merge(&c).unwrap().len(), 3);
        assert!(a.merge(&d).is_none());
    }

    #[test]
    fn empty_result_is_false() {
        let answer = merge_results(vec![vec![b(&[("X1", 1)])], vec![]]);
        assert_eq!(answer, Answer::False);
    }

    #[test]
    fn ground_matches_are_true_without_rows() {
        let answer = merge_results(vec![vec![Binding::new()], vec![Binding::new()]]);
        assert_eq!(answer, Answer::True);
        assert!(answer.rows().is_empty());
    }

    #[test]
    fn cross_merge_keeps_agreeing_rows() {
        let answer = merge_results(vec![
            vec![b(&[("X1", 1), ("Y1", 2)]), b(&[("X1", 3), ("Y1", 4)])],
            vec![Binding::new()],
            vec![b(&[("X1", 3), ("Z1", 5)])],
        ]);
        assert_eq!(answer, Answer::Rows(vec![b(&[("X1", 3), ("Y1", 4), ("Z1", 5)])]));
    }

    #[test]
    fn disagreeing_rows_are_false() {
        let answer = merge_results(vec![vec![b(&[("X1", 1)])], vec![b(&[("X1", 2)])]]);
        assert_eq!(answer, Answer::False);
    }
}
