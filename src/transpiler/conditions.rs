use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::ast::*;
use crate::error::{CompileError, CompileResult};
use super::dialect::Dialect;
use super::traits::SqlGenerator;

/// Context for parameterized query building.
///
/// One context per compiled statement: every value gets a fresh `:pN` name,
/// so parameters never collide across restrictions or disjunctions.
#[derive(Debug, Default)]
pub struct ParamContext {
    /// Next parameter number
    pub index: usize,
    /// Collected `(name, value)` pairs in order
    pub params: Vec<(String, Value)>,
}

impl ParamContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value and return the named placeholder for it.
    pub fn add_param(&mut self, value: Value) -> String {
        let name = format!("p{}", self.index);
        self.index += 1;
        self.params.push((name.clone(), value));
        format!(":{}", name)
    }

    pub fn into_params(self) -> Vec<(String, Value)> {
        self.params
    }
}

/// Renders one restriction kind for one dialect.
///
/// `column` is already mapped and quoted.
pub trait ConditionConverter: Send + Sync {
    fn convert(&self, column: &str, restriction: &Restriction, params: &mut ParamContext)
        -> CompileResult<String>;
}

/// Condition converters of one dialect, keyed by restriction kind.
///
/// Built once and injected into the compiler; never mutated afterwards.
pub struct ConverterRegistry {
    dialect: Dialect,
    generator: Box<dyn SqlGenerator>,
    converters: HashMap<RestrictionKind, Box<dyn ConditionConverter>>,
}

impl ConverterRegistry {
    pub fn builder(dialect: Dialect) -> ConverterRegistryBuilder {
        ConverterRegistryBuilder {
            dialect,
            generator: dialect.generator(),
            converters: HashMap::new(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn generator(&self) -> &dyn SqlGenerator {
        self.generator.as_ref()
    }

    pub fn get(&self, kind: RestrictionKind) -> CompileResult<&dyn ConditionConverter> {
        self.converters
            .get(&kind)
            .map(|c| c.as_ref())
            .ok_or(CompileError::NoConverter(kind))
    }
}

pub struct ConverterRegistryBuilder {
    dialect: Dialect,
    generator: Box<dyn SqlGenerator>,
    converters: HashMap<RestrictionKind, Box<dyn ConditionConverter>>,
}

impl ConverterRegistryBuilder {
    pub fn generator(mut self, generator: Box<dyn SqlGenerator>) -> Self {
        self.generator = generator;
        self
    }

    /// Register (or replace) the converter for `kind`.
    pub fn register(mut self, kind: RestrictionKind, converter: impl ConditionConverter + 'static) -> Self {
        self.converters.insert(kind, Box::new(converter));
        self
    }

    pub fn build(self) -> ConverterRegistry {
        ConverterRegistry {
            dialect: self.dialect,
            generator: self.generator,
            converters: self.converters,
        }
    }
}

/// Always-false / always-true fragments.
pub fn constant(value: bool) -> String {
    if value { "1 = 1".to_string() } else { "1 = 0".to_string() }
}

/// `IS NULL` / `IS NOT NULL`.
pub fn null_check(column: &str, negated: bool) -> String {
    if negated {
        format!("{} IS NOT NULL", column)
    } else {
        format!("{} IS NULL", column)
    }
}

/// `%value%` with LIKE wildcards and the escape character escaped.
pub fn like_pattern(value: &str) -> String {
    let mut pattern = String::with_capacity(value.len() + 2);
    pattern.push('%');
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

pub(crate) fn mismatch(restriction: &Restriction) -> CompileError {
    CompileError::NoConverter(restriction.kind())
}

/// 1000-01-01T00:00:00Z
pub fn min_timestamp() -> DateTime<Utc> {
    DateTime::from_timestamp(-30_610_224_000, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// 9999-12-31T23:59:59Z
pub fn max_timestamp() -> DateTime<Utc> {
    DateTime::from_timestamp(253_402_300_799, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RangeType {
    Int,
    Float,
    Timestamp,
}

fn range_type(field: &str, lower: &RangeBound, upper: &RangeBound) -> CompileResult<RangeType> {
    let classify = |v: &Value| match v {
        Value::Int(_) => Ok(RangeType::Int),
        Value::Float(_) => Ok(RangeType::Float),
        Value::Timestamp(_) => Ok(RangeType::Timestamp),
        other => Err(CompileError::UnsupportedRangeValue {
            field: field.to_string(),
            value: other.to_string(),
        }),
    };
    match (lower.value().map(classify).transpose()?, upper.value().map(classify).transpose()?) {
        (None, None) => Err(CompileError::UnboundedRange(field.to_string())),
        (Some(t), None) | (None, Some(t)) => Ok(t),
        (Some(a), Some(b)) if a == b => Ok(a),
        (Some(RangeType::Int), Some(RangeType::Float)) | (Some(RangeType::Float), Some(RangeType::Int)) => {
            Ok(RangeType::Float)
        }
        _ => Err(CompileError::MixedRange(field.to_string())),
    }
}

fn as_float(value: &Value) -> f64 {
    match value {
        Value::Int(n) => *n as f64,
        Value::Float(f) => *f,
        _ => 0.0,
    }
}

fn between(column: &str, lower: Value, upper: Value, negated: bool, params: &mut ParamContext) -> String {
    let lo = params.add_param(lower);
    let hi = params.add_param(upper);
    let op = if negated { "NOT BETWEEN" } else { "BETWEEN" };
    format!("{} {} {} AND {}", column, op, lo, hi)
}

/// Range restrictions, shared by every dialect.
///
/// Inclusive and open ends are closed with the type's sentinel so the result
/// is a `BETWEEN`. Any exclusive end, integer or not, becomes a strict
/// comparison: the column may hold fractional values even when the bound
/// is an integer.
#[derive(Debug, Default, Clone, Copy)]
pub struct RangeConverter;

impl ConditionConverter for RangeConverter {
    fn convert(&self, column: &str, restriction: &Restriction, params: &mut ParamContext)
        -> CompileResult<String>
    {
        let Restriction::Range { field, lower, upper, negated } = restriction else {
            return Err(mismatch(restriction));
        };
        let negated = *negated;
        let kind = range_type(field, lower, upper)?;
        let normalize = |v: &Value| {
            if kind == RangeType::Float { Value::Float(as_float(v)) } else { v.clone() }
        };

        let exclusive = matches!(lower, RangeBound::Exclusive(_)) || matches!(upper, RangeBound::Exclusive(_));
        if !exclusive {
            let (floor, ceiling) = match kind {
                RangeType::Int => (Value::Int(i64::MIN), Value::Int(i64::MAX)),
                RangeType::Float => (Value::Float(f64::MIN), Value::Float(f64::MAX)),
                RangeType::Timestamp => (Value::Timestamp(min_timestamp()), Value::Timestamp(max_timestamp())),
            };
            let lo = lower.value().map(normalize).unwrap_or(floor);
            let hi = upper.value().map(normalize).unwrap_or(ceiling);
            return Ok(between(column, lo, hi, negated, params));
        }

        let mut parts = Vec::with_capacity(2);
        match lower {
            RangeBound::Inclusive(v) => parts.push(format!("{} >= {}", column, params.add_param(normalize(v)))),
            RangeBound::Exclusive(v) => parts.push(format!("{} > {}", column, params.add_param(normalize(v)))),
            RangeBound::Unbounded => {}
        }
        match upper {
            RangeBound::Inclusive(v) => parts.push(format!("{} <= {}", column, params.add_param(normalize(v)))),
            RangeBound::Exclusive(v) => parts.push(format!("{} < {}", column, params.add_param(normalize(v)))),
            RangeBound::Unbounded => {}
        }
        let sql = if parts.len() > 1 {
            format!("({})", parts.join(" AND "))
        } else {
            parts.join("")
        };
        if negated {
            if parts.len() > 1 { Ok(format!("NOT {}", sql)) } else { Ok(format!("NOT ({})", sql)) }
        } else {
            Ok(sql)
        }
    }
}
