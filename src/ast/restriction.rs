use serde::{Deserialize, Serialize};

use crate::ast::Value;

/// One end of a range restriction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RangeBound {
    Unbounded,
    Inclusive(Value),
    Exclusive(Value),
}

impl RangeBound {
    pub fn value(&self) -> Option<&Value> {
        match self {
            RangeBound::Unbounded => None,
            RangeBound::Inclusive(v) | RangeBound::Exclusive(v) => Some(v),
        }
    }
}

/// Restriction type used to pick a condition converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RestrictionKind {
    Equals,
    Contains,
    Range,
    In,
}

impl std::fmt::Display for RestrictionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RestrictionKind::Equals => write!(f, "EQUALS"),
            RestrictionKind::Contains => write!(f, "CONTAINS"),
            RestrictionKind::Range => write!(f, "RANGE"),
            RestrictionKind::In => write!(f, "IN"),
        }
    }
}

/// A typed, negatable predicate over one field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Restriction {
    /// `field = value`, or `IS NULL` when the value is NULL
    Equals {
        field: String,
        value: Value,
        #[serde(default)]
        negated: bool,
    },
    /// Substring match (LIKE '%value%')
    Contains {
        field: String,
        value: String,
        #[serde(default)]
        negated: bool,
    },
    /// BETWEEN with independently open, inclusive or exclusive ends
    Range {
        field: String,
        lower: RangeBound,
        upper: RangeBound,
        #[serde(default)]
        negated: bool,
    },
    /// Set membership
    In {
        field: String,
        values: Vec<Value>,
        #[serde(default)]
        negated: bool,
    },
}

impl Restriction {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Restriction::Equals { field: field.into(), value: value.into(), negated: false }
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::eq(field, value).not()
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Self::eq(field, Value::Null)
    }

    pub fn not_null(field: impl Into<String>) -> Self {
        Self::is_null(field).not()
    }

    pub fn contains(field: impl Into<String>, value: impl Into<String>) -> Self {
        Restriction::Contains { field: field.into(), value: value.into(), negated: false }
    }

    /// Inclusive range `lower <= field <= upper`.
    pub fn between(field: impl Into<String>, lower: impl Into<Value>, upper: impl Into<Value>) -> Self {
        Self::range(field, RangeBound::Inclusive(lower.into()), RangeBound::Inclusive(upper.into()))
    }

    pub fn greater(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::range(field, RangeBound::Exclusive(value.into()), RangeBound::Unbounded)
    }

    pub fn greater_or_equal(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::range(field, RangeBound::Inclusive(value.into()), RangeBound::Unbounded)
    }

    pub fn less(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::range(field, RangeBound::Unbounded, RangeBound::Exclusive(value.into()))
    }

    pub fn less_or_equal(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::range(field, RangeBound::Unbounded, RangeBound::Inclusive(value.into()))
    }

    pub fn range(field: impl Into<String>, lower: RangeBound, upper: RangeBound) -> Self {
        Restriction::Range { field: field.into(), lower, upper, negated: false }
    }

    pub fn is_in<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Restriction::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    pub fn not_in<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self::is_in(field, values).not()
    }

    /// Flip the negation flag.
    pub fn not(mut self) -> Self {
        match &mut self {
            Restriction::Equals { negated, .. }
            | Restriction::Contains { negated, .. }
            | Restriction::Range { negated, .. }
            | Restriction::In { negated, .. } => *negated = !*negated,
        }
        self
    }

    pub fn field(&self) -> &str {
        match self {
            Restriction::Equals { field, .. }
            | Restriction::Contains { field, .. }
            | Restriction::Range { field, .. }
            | Restriction::In { field, .. } => field,
        }
    }

    pub fn negated(&self) -> bool {
        match self {
            Restriction::Equals { negated, .. }
            | Restriction::Contains { negated, .. }
            | Restriction::Range { negated, .. }
            | Restriction::In { negated, .. } => *negated,
        }
    }

    pub fn kind(&self) -> RestrictionKind {
        match self {
            Restriction::Equals { .. } => RestrictionKind::Equals,
            Restriction::Contains { .. } => RestrictionKind::Contains,
            Restriction::Range { .. } => RestrictionKind::Range,
            Restriction::In { .. } => RestrictionKind::In,
        }
    }
}

impl std::fmt::Display for Restriction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.negated() {
            write!(f, "NOT ")?;
        }
        match self {
            Restriction::Equals { field, value, .. } => write!(f, "{} = {}", field, value),
            Restriction::Contains { field, value, .. } => write!(f, "{} ~ '{}'", field, value),
            Restriction::Range { field, lower, upper, .. } => {
                let lo = match lower {
                    RangeBound::Unbounded => "(-inf".to_string(),
                    RangeBound::Inclusive(v) => format!("[{}", v),
                    RangeBound::Exclusive(v) => format!("({}", v),
                };
                let hi = match upper {
                    RangeBound::Unbounded => "+inf)".to_string(),
                    RangeBound::Inclusive(v) => format!("{}]", v),
                    RangeBound::Exclusive(v) => format!("{})", v),
                };
                write!(f, "{} IN {}, {}", field, lo, hi)
            }
            Restriction::In { field, values, .. } => write!(f, "{} IN {}", field, Value::List(values.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_flips_negation() {
        let r = Restriction::eq("name", "x");
        assert!(!r.negated());
        assert!(r.clone().not().negated());
        assert_eq!(r.clone().not().not(), r);
    }

    #[test]
    fn test_shorthand_ranges() {
        assert_eq!(
            Restriction::greater("qty", 5),
            Restriction::Range {
                field: "qty".into(),
                lower: RangeBound::Exclusive(Value::Int(5)),
                upper: RangeBound::Unbounded,
                negated: false,
            }
        );
        assert_eq!(Restriction::less_or_equal("qty", 5).kind(), RestrictionKind::Range);
    }

    #[test]
    fn test_display() {
        assert_eq!(Restriction::ne("name", "x").to_string(), "NOT name = 'x'");
        assert_eq!(Restriction::between("qty", 1, 3).to_string(), "qty IN [1, 3]");
        assert_eq!(Restriction::is_in("id", [1, 2]).to_string(), "id IN (1, 2)");
    }

    #[test]
    fn test_json_shape() {
        let r: Restriction =
            serde_json::from_str(r#"{"type":"equals","field":"envId","value":1}"#).unwrap();
        assert_eq!(r, Restriction::eq("envId", 1));
    }
}
