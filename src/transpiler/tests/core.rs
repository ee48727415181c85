//! Compiler core tests (dialect-neutral behaviour, checked on MySQL output).

use std::collections::HashSet;

use pretty_assertions::assert_eq;

use crate::ast::*;
use crate::error::{CompileError, CompileResult};
use crate::transpiler::conditions::{ConditionConverter, ConverterRegistry, ParamContext};
use crate::transpiler::sql::mysql::MysqlEquals;
use crate::transpiler::{Dialect, QueryCompiler};

fn mysql() -> QueryCompiler {
    QueryCompiler::for_dialect(Dialect::MySQL)
}

#[test]
fn test_empty_query() {
    let compiled = mysql().compile(&Query::new()).unwrap();
    assert_eq!(compiled.where_clause, "");
    assert_eq!(compiled.where_sql(), "");
    assert_eq!(compiled.order_sql(), "");
    assert!(compiled.params.is_empty());
}

#[test]
fn test_restrictions_and_order() {
    let q = Query::new()
        .filter(Restriction::eq("envId", 1))
        .filter(Restriction::not_null("name"))
        .order_by("name", Direction::Asc)
        .order_by("modifiedAt", Direction::Desc);
    let compiled = mysql().compile(&q).unwrap();
    assert_eq!(compiled.where_clause, "`env_id` = :p0 AND `name` IS NOT NULL");
    assert_eq!(compiled.order_by, "`name` ASC, `modified_at` DESC");
    assert_eq!(compiled.params, vec![("p0".to_string(), Value::Int(1))]);
}

#[test]
fn test_disjunction_groups() {
    let q = Query::new().filter(Restriction::eq("a", 0)).any_of(vec![
        Query::new().filter(Restriction::eq("a", 1)),
        Query::new().filter(Restriction::eq("b", 2)).filter(Restriction::eq("c", 3)),
    ]);
    let compiled = mysql().compile(&q).unwrap();
    assert_eq!(
        compiled.where_clause,
        "`a` = :p0 AND (`a` = :p1 OR (`b` = :p2 AND `c` = :p3))"
    );
    assert_eq!(compiled.params.len(), 4);
}

#[test]
fn test_negated_disjunction() {
    let q = Query::new().disjunction(
        Disjunction::new(vec![
            Query::new().filter(Restriction::eq("a", 1)),
            Query::new().filter(Restriction::eq("b", 2)),
        ])
        .not(),
    );
    assert_eq!(mysql().compile(&q).unwrap().where_clause, "NOT (`a` = :p0 OR `b` = :p1)");
}

#[test]
fn test_empty_disjunction_parts() {
    let q = Query::new().any_of(vec![Query::new(), Query::new().filter(Restriction::eq("a", 1))]);
    assert_eq!(mysql().compile(&q).unwrap().where_clause, "(1 = 1 OR `a` = :p0)");

    let q = Query::new().any_of(vec![]);
    assert_eq!(mysql().compile(&q).unwrap().where_clause, "1 = 0");

    let q = Query::new().disjunction(Disjunction::new(vec![]).not());
    assert_eq!(mysql().compile(&q).unwrap().where_clause, "1 = 1");
}

#[test]
fn test_param_names_unique_across_nesting() {
    let inner = Query::new().any_of(vec![
        Query::new().filter(Restriction::between("qty", 1, 2)),
        Query::new().filter(Restriction::is_in("id", [1, 2, 3])),
    ]);
    let q = Query::new()
        .filter(Restriction::contains("name", "x"))
        .any_of(vec![inner.clone(), inner]);
    let compiled = mysql().compile(&q).unwrap();

    let names: HashSet<&str> = compiled.params.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names.len(), compiled.params.len());
    assert_eq!(compiled.params.len(), 1 + 2 * 3);
    for (name, _) in &compiled.params {
        assert!(compiled.where_clause.contains(&format!(":{}", name)));
    }
}

#[test]
fn test_compile_is_repeatable() {
    let q = Query::new().filter(Restriction::eq("a", 1));
    let compiler = mysql();
    assert_eq!(compiler.compile(&q).unwrap(), compiler.compile(&q).unwrap());
}

#[test]
fn test_unbounded_range_is_rejected() {
    let q = Query::new().filter(Restriction::range("qty", RangeBound::Unbounded, RangeBound::Unbounded));
    let err = mysql().compile(&q).unwrap_err();
    assert!(matches!(err, CompileError::UnboundedRange(field) if field == "qty"));
}

#[test]
fn test_unsupported_range_values() {
    let q = Query::new().filter(Restriction::between("name", "a", "z"));
    assert!(matches!(
        mysql().compile(&q),
        Err(CompileError::UnsupportedRangeValue { .. })
    ));

    let q = Query::new().filter(Restriction::between("qty", 1, chrono::Utc::now()));
    assert!(matches!(mysql().compile(&q), Err(CompileError::MixedRange(_))));
}

#[test]
fn test_missing_converter() {
    let registry = ConverterRegistry::builder(Dialect::MySQL)
        .register(RestrictionKind::Equals, MysqlEquals)
        .build();
    let compiler = QueryCompiler::new(registry);

    assert!(compiler.compile(&Query::new().filter(Restriction::eq("a", 1))).is_ok());
    let err = compiler.compile(&Query::new().filter(Restriction::contains("a", "x"))).unwrap_err();
    assert!(matches!(err, CompileError::NoConverter(RestrictionKind::Contains)));
}

struct SoundexEquals;

impl ConditionConverter for SoundexEquals {
    fn convert(&self, column: &str, restriction: &Restriction, params: &mut ParamContext)
        -> CompileResult<String>
    {
        let Restriction::Equals { value, .. } = restriction else {
            return Err(CompileError::NoConverter(restriction.kind()));
        };
        Ok(format!("SOUNDEX({}) = SOUNDEX({})", column, params.add_param(value.clone())))
    }
}

#[test]
fn test_injected_converter() {
    let registry = ConverterRegistry::builder(Dialect::MySQL)
        .register(RestrictionKind::Equals, SoundexEquals)
        .build();
    let q = Query::new().filter(Restriction::eq("name", "Robert"));
    assert_eq!(
        QueryCompiler::new(registry).compile(&q).unwrap().where_clause,
        "SOUNDEX(`name`) = SOUNDEX(:p0)"
    );
}
