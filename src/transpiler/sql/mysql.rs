use crate::ast::*;
use crate::error::CompileResult;
use crate::transpiler::conditions::{
    constant, like_pattern, mismatch, null_check, ConditionConverter, ConverterRegistry, ParamContext,
    RangeConverter,
};
use crate::transpiler::dialect::Dialect;
use crate::transpiler::traits::SqlGenerator;

/// MySQL Generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct MysqlGenerator;

impl SqlGenerator for MysqlGenerator {
    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }
}

/// MySQL converters. String comparisons rely on the column's `_ci` collation.
pub fn registry() -> ConverterRegistry {
    ConverterRegistry::builder(Dialect::MySQL)
        .register(RestrictionKind::Equals, MysqlEquals)
        .register(RestrictionKind::Contains, MysqlContains)
        .register(RestrictionKind::Range, RangeConverter)
        .register(RestrictionKind::In, MysqlIn)
        .build()
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MysqlEquals;

impl ConditionConverter for MysqlEquals {
    fn convert(&self, column: &str, restriction: &Restriction, params: &mut ParamContext)
        -> CompileResult<String>
    {
        let Restriction::Equals { value, negated, .. } = restriction else {
            return Err(mismatch(restriction));
        };
        if value.is_null() {
            return Ok(null_check(column, *negated));
        }
        let op = if *negated { "<>" } else { "=" };
        Ok(format!("{} {} {}", column, op, params.add_param(value.clone())))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MysqlContains;

impl ConditionConverter for MysqlContains {
    fn convert(&self, column: &str, restriction: &Restriction, params: &mut ParamContext)
        -> CompileResult<String>
    {
        let Restriction::Contains { value, negated, .. } = restriction else {
            return Err(mismatch(restriction));
        };
        let op = if *negated { "NOT LIKE" } else { "LIKE" };
        Ok(format!("{} {} {}", column, op, params.add_param(Value::String(like_pattern(value)))))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MysqlIn;

impl ConditionConverter for MysqlIn {
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
        Ok(format!("{} {} ({})", column, op, params.add_param(Value::List(values.clone()))))
    }
}
