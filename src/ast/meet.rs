//! In-memory evaluation of queries.
//!
//! Follows SQL three-valued logic so that `Query::is_meet` selects exactly the
//! rows the compiled WHERE clause selects: any comparison against a NULL field
//! is unknown, negating unknown stays unknown, and only `true` matches.

use std::cmp::Ordering;

use crate::ast::{Disjunction, Query, RangeBound, Restriction, Value};

/// Read access to a candidate object's properties by name.
pub trait PropertyAccessor {
    /// Property value, or `None` when the object has no such property.
    fn property(&self, name: &str) -> Option<Value>;
}

impl PropertyAccessor for std::collections::BTreeMap<String, Value> {
    fn property(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl PropertyAccessor for std::collections::HashMap<String, Value> {
    fn property(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl Query {
    /// True when the object satisfies every restriction and disjunction group.
    pub fn is_meet(&self, accessor: &dyn PropertyAccessor) -> bool {
        self.eval(accessor) == Some(true)
    }

    fn eval(&self, accessor: &dyn PropertyAccessor) -> Option<bool> {
        let leaves = self.restrictions.iter().map(|r| r.eval(accessor));
        let groups = self.disjunctions.iter().map(|d| d.eval(accessor));
        and_all(leaves.chain(groups))
    }
}

impl Disjunction {
    fn eval(&self, accessor: &dyn PropertyAccessor) -> Option<bool> {
        let result = or_any(self.queries.iter().map(|q| q.eval(accessor)));
        if self.negated { result.map(|b| !b) } else { result }
    }
}

impl Restriction {
    /// Evaluate against one object. `None` means SQL unknown.
    pub fn eval(&self, accessor: &dyn PropertyAccessor) -> Option<bool> {
        let actual = accessor.property(self.field()).unwrap_or(Value::Null);
        let result = match self {
            Restriction::Equals { value: Value::Null, .. } => Some(actual.is_null()),
            Restriction::Equals { value, .. } => values_equal(&actual, value),
            Restriction::Contains { value, .. } => match &actual {
                Value::String(s) => Some(s.to_lowercase().contains(&value.to_lowercase())),
                _ => None,
            },
            Restriction::Range { lower, upper, .. } => {
                if actual.is_null() {
                    None
                } else {
                    and_all([above(&actual, lower), below(&actual, upper)])
                }
            }
            Restriction::In { values, .. } => {
                if values.is_empty() {
                    Some(false)
                } else {
                    or_any(values.iter().map(|v| values_equal(&actual, v)))
                }
            }
        };
        if self.negated() { result.map(|b| !b) } else { result }
    }
}

fn values_equal(actual: &Value, expected: &Value) -> Option<bool> {
    if actual.is_null() || expected.is_null() {
        return None;
    }
    actual.compare(expected).map(|o| o == Ordering::Equal)
}

fn above(actual: &Value, bound: &RangeBound) -> Option<bool> {
    match bound {
        RangeBound::Unbounded => Some(true),
        RangeBound::Inclusive(v) => actual.compare(v).map(|o| o != Ordering::Less),
        RangeBound::Exclusive(v) => actual.compare(v).map(|o| o == Ordering::Greater),
    }
}

fn below(actual: &Value, bound: &RangeBound) -> Option<bool> {
    match bound {
        RangeBound::Unbounded => Some(true),
        RangeBound::Inclusive(v) => actual.compare(v).map(|o| o != Ordering::Greater),
        RangeBound::Exclusive(v) => actual.compare(v).map(|o| o == Ordering::Less),
    }
}

fn and_all(items: impl IntoIterator<Item = Option<bool>>) -> Option<bool> {
    let mut unknown = false;
    for item in items {
        match item {
            Some(false) => return Some(false),
            None => unknown = true,
            Some(true) => {}
        }
    }
    if unknown { None } else { Some(true) }
}

fn or_any(items: impl IntoIterator<Item = Option<bool>>) -> Option<bool> {
    let mut unknown = false;
    for item in items {
        match item {
            Some(true) => return Some(true),
            None => unknown = true,
            Some(false) => {}
        }
    }
    if unknown { None } else { Some(false) }
}
