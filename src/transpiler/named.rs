//! Named-to-positional parameter expansion.
//!
//! Compiled fragments use `:name` placeholders. Drivers want `?` or `$n`,
//! one per bound value, so list parameters expand to one placeholder per
//! element: `col IN (:p0)` with `[1, 2]` becomes `col IN ($1, $2)`.

use crate::ast::Value;
use crate::error::{CompileError, CompileResult};
use super::traits::SqlGenerator;

/// Rewrite `:name` references into the generator's positional placeholders.
///
/// Text inside single-quoted literals and `::` casts are left alone. Returns
/// the rewritten SQL and the values in binding order.
pub fn expand(
    sql: &str,
    params: &[(String, Value)],
    generator: &dyn SqlGenerator,
) -> CompileResult<(String, Vec<Value>)> {
    let mut out = String::with_capacity(sql.len());
    let mut values = Vec::with_capacity(params.len());
    let mut chars = sql.chars().peekable();
    let mut in_literal = false;

    while let Some(c) = chars.next() {
        if c == '\'' {
            in_literal = !in_literal;
            out.push(c);
            continue;
        }
        if in_literal || c != ':' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some(':') => {
                chars.next();
                out.push_str("::");
            }
            Some(&n) if n.is_ascii_alphabetic() || n == '_' => {
                let mut name = String::new();
                while let Some(&n) = chars.peek() {
                    if !(n.is_ascii_alphanumeric() || n == '_') {
                        break;
                    }
                    name.push(n);
                    chars.next();
                }
                let value = params
                    .iter()
                    .find(|(key, _)| *key == name)
                    .map(|(_, v)| v)
                    .ok_or_else(|| CompileError::UnboundParameter(name.clone()))?;
                bind(&name, value, &mut out, &mut values, generator)?;
            }
            _ => out.push(c),
        }
    }

    Ok((out, values))
}

fn bind(
    name: &str,
    value: &Value,
    out: &mut String,
    values: &mut Vec<Value>,
    generator: &dyn SqlGenerator,
) -> CompileResult<()> {
    match value {
        Value::List(items) => {
            if items.is_empty() {
                return Err(CompileError::InvalidValue(format!("empty list bound to :{}", name)));
            }
            for (i, item) in items.iter().enumerate() {
                if matches!(item, Value::List(_)) {
                    return Err(CompileError::InvalidValue(format!("nested list bound to :{}", name)));
                }
                if i > 0 {
                    out.push_str(", ");
                }
                values.push(item.clone());
                out.push_str(&generator.placeholder(values.len()));
            }
        }
        scalar => {
            values.push(scalar.clone());
            out.push_str(&generator.placeholder(values.len()));
        }
    }
    Ok(())
}
