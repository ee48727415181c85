//! Query-to-SQL compiler.
//!
//! Renders a [`Query`] into a WHERE fragment with `:pN` named parameters and
//! an ORDER BY fragment. Dialect differences live in the injected
//! [`ConverterRegistry`]; [`named::expand`] turns the result into what a
//! driver binds.

pub mod conditions;
pub mod dialect;
pub mod named;
pub mod sql;
pub mod traits;

#[cfg(test)]
mod tests;

use tracing::debug;

use crate::ast::*;
use crate::error::CompileResult;
use crate::naming::column_name;
pub use conditions::{ConditionConverter, ConverterRegistry, ParamContext, RangeConverter};
pub use dialect::Dialect;
pub use traits::{escape_identifier, SqlGenerator};

/// Output of one compile call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompiledQuery {
    /// Conditions without the `WHERE` keyword; empty when unrestricted
    pub where_clause: String,
    /// Sort keys without `ORDER BY`; empty when unordered
    pub order_by: String,
    /// `(name, value)` pairs referenced as `:name`
    pub params: Vec<(String, Value)>,
}

impl CompiledQuery {
    /// ` WHERE …` or nothing.
    pub fn where_sql(&self) -> String {
        if self.where_clause.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.where_clause)
        }
    }

    /// ` ORDER BY …` or nothing.
    pub fn order_sql(&self) -> String {
        if self.order_by.is_empty() {
            String::new()
        } else {
            format!(" ORDER BY {}", self.order_by)
        }
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// Compiles queries for one dialect.
pub struct QueryCompiler {
    registry: ConverterRegistry,
}

impl QueryCompiler {
    pub fn new(registry: ConverterRegistry) -> Self {
        Self { registry }
    }

    /// Compiler with the dialect's default converters.
    pub fn for_dialect(dialect: Dialect) -> Self {
        Self::new(dialect.registry())
    }

    pub fn dialect(&self) -> Dialect {
        self.registry.dialect()
    }

    pub fn generator(&self) -> &dyn SqlGenerator {
        self.registry.generator()
    }

    /// Quoted column for a property name.
    pub fn column(&self, property: &str) -> String {
        self.generator().quote_identifier(&column_name(property))
    }

    pub fn compile(&self, query: &Query) -> CompileResult<CompiledQuery> {
        let mut params = ParamContext::new();
        let where_clause = self.compile_where(query, &mut params)?;
        let order_by = self.compile_order_by(&query.order_by);
        let compiled = CompiledQuery { where_clause, order_by, params: params.into_params() };
        debug!(dialect = %self.dialect(), sql = %compiled.where_clause, params = compiled.params.len(), "compiled query");
        Ok(compiled)
    }

    /// WHERE conditions using a caller-owned counter, for statements that
    /// bind further values (SET lists, lock checks) around the filter.
    pub fn compile_where(&self, query: &Query, params: &mut ParamContext) -> CompileResult<String> {
        let mut parts = Vec::with_capacity(query.restrictions.len() + query.disjunctions.len());
        for restriction in &query.restrictions {
            parts.push(self.compile_restriction(restriction, params)?);
        }
        for disjunction in &query.disjunctions {
            parts.push(self.compile_disjunction(disjunction, params)?);
        }
        Ok(parts.join(" AND "))
    }

    pub fn compile_restriction(&self, restriction: &Restriction, params: &mut ParamContext) -> CompileResult<String> {
        let converter = self.registry.get(restriction.kind())?;
        converter.convert(&self.column(restriction.field()), restriction, params)
    }

    fn compile_disjunction(&self, disjunction: &Disjunction, params: &mut ParamContext) -> CompileResult<String> {
        if disjunction.queries.is_empty() {
            return Ok(conditions::constant(disjunction.negated));
        }
        let mut groups = Vec::with_capacity(disjunction.queries.len());
        for query in &disjunction.queries {
            let group = self.compile_where(query, params)?;
            groups.push(if group.is_empty() {
                conditions::constant(true)
            } else if query.restrictions.len() + query.disjunctions.len() > 1 {
                format!("({})", group)
            } else {
                group
            });
        }
        let sql = format!("({})", groups.join(" OR "));
        Ok(if disjunction.negated { format!("NOT {}", sql) } else { sql })
    }

    fn compile_order_by(&self, order_by: &[OrderBy]) -> String {
        order_by
            .iter()
            .map(|o| {
                let dir = match o.direction {
                    Direction::Asc => "ASC",
                    Direction::Desc => "DESC",
                };
                format!("{} {}", self.column(&o.field), dir)
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}
