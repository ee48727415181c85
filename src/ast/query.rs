use serde::{Deserialize, Serialize};

use crate::ast::Restriction;

/// Sort order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// ORDER BY entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    #[serde(default)]
    pub direction: Direction,
}

/// A group of sub-queries OR'd together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Disjunction {
    pub queries: Vec<Query>,
    #[serde(default)]
    pub negated: bool,
}

impl Disjunction {
    pub fn new(queries: Vec<Query>) -> Self {
        Self { queries, negated: false }
    }

    pub fn not(mut self) -> Self {
        self.negated = !self.negated;
        self
    }
}

/// Root conjunction of field restrictions and disjunction groups.
///
/// ```
/// use rowkit::ast::{Direction, Query, Restriction};
///
/// let query = Query::new()
///     .filter(Restriction::eq("envId", 1))
///     .any_of(vec![
///         Query::new().filter(Restriction::contains("name", "yes")),
///         Query::new().filter(Restriction::is_null("name")),
///     ])
///     .order_by("name", Direction::Asc);
/// assert_eq!(query.restrictions.len(), 1);
/// assert_eq!(query.disjunctions.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Query {
    #[serde(default)]
    pub restrictions: Vec<Restriction>,
    #[serde(default)]
    pub disjunctions: Vec<Disjunction>,
    #[serde(default)]
    pub order_by: Vec<OrderBy>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// AND a restriction onto the query.
    pub fn filter(mut self, restriction: Restriction) -> Self {
        self.restrictions.push(restriction);
        self
    }

    /// AND a group of sub-queries, any of which may match.
    pub fn any_of(mut self, queries: Vec<Query>) -> Self {
        self.disjunctions.push(Disjunction::new(queries));
        self
    }

    pub fn disjunction(mut self, disjunction: Disjunction) -> Self {
        self.disjunctions.push(disjunction);
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by.push(OrderBy { field: field.into(), direction });
        self
    }

    pub fn push(&mut self, restriction: Restriction) -> &mut Self {
        self.restrictions.push(restriction);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.restrictions.is_empty() && self.disjunctions.is_empty()
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts: Vec<String> = self.restrictions.iter().map(|r| r.to_string()).collect();
        for d in &self.disjunctions {
            let alternatives: Vec<String> = d.queries.iter().map(|q| format!("({})", q)).collect();
            let group = format!("[{}]", alternatives.join(" | "));
            parts.push(if d.negated { format!("NOT {}", group) } else { group });
        }
        write!(f, "{}", parts.join(" AND "))
    }
}
