use crate::ast::*;
use crate::error::CompileResult;
use crate::transpiler::conditions::{
    constant, like_pattern, mismatch, null_check, ConditionConverter, ConverterRegistry, ParamContext,
    RangeConverter,
};
use crate::transpiler::dialect::Dialect;
use crate::transpiler::traits::{escape_identifier, SqlGenerator};

/// PostgreSQL Generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresGenerator;

impl SqlGenerator for PostgresGenerator {
    fn quote_identifier(&self, name: &str) -> String {
        escape_identifier(name)
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }
}

/// PostgreSQL converters. Text comparisons fold case with `lower()` and
/// `ILIKE` to match MySQL's case-insensitive collations.
pub fn registry() -> ConverterRegistry {
    ConverterRegistry::builder(Dialect::Postgres)
        .register(RestrictionKind::Equals, PostgresEquals)
        .register(RestrictionKind::Contains, PostgresContains)
        .register(RestrictionKind::Range, RangeConverter)
        .register(RestrictionKind::In, PostgresIn)
        .build()
}

fn lower(column: &str) -> String {
    format!("lower({})", column)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresEquals;

impl ConditionConverter for PostgresEquals {
    fn convert(&self, column: &str, restriction: &Restriction, params: &mut ParamContext)
        -> CompileResult<String>
    {
        let Restriction::Equals { value, negated, .. } = restriction else {
            return Err(mismatch(restriction));
        };
        let op = if *negated { "<>" } else { "=" };
        match value {
            Value::Null => Ok(null_check(column, *negated)),
            Value::String(_) => {
                Ok(format!("{} {} {}", lower(column), op, params.add_param(value.to_lowercase())))
            }
            _ => Ok(format!("{} {} {}", column, op, params.add_param(value.clone()))),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresContains;

impl ConditionConverter for PostgresContains {
    fn convert(&self, column: &str, restriction: &Restriction, params: &mut ParamContext)
        -> CompileResult<String>
    {
        let Restriction::Contains { value, negated, .. } = restriction else {
            return Err(mismatch(restriction));
        };
        let op = if *negated { "NOT ILIKE" } else { "ILIKE" };
        Ok(format!("{} {} {}", column, op, params.add_param(Value::String(like_pattern(value)))))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresIn;

impl ConditionConverter for PostgresIn {
    fn convert(&self, column: &str, restriction: &Restriction, params: &mut ParamContext)
        -> CompileResult<String>
    {
        let Restriction::In { values, negated, .. } = restriction else {
            return Err(mismatch(restriction));
        };
        if values.is_empty() {
            return Ok(constant(*negated));
        }
        let op = if *negated { "NOT IN" } else { "IN" };
        let text = values.iter().all(|v| matches!(v, Value::String(_)));
        if text {
            let folded = Value::List(values.iter().map(Value::to_lowercase).collect());
            Ok(format!("{} {} ({})", lower(column), op, params.add_param(folded)))
        } else {
            Ok(format!("{} {} ({})", column, op, params.add_param(Value::List(values.clone()))))
        }
    }
}
