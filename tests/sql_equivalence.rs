//! Compiled SQL selects exactly the rows `Query::is_meet` selects.
//!
//! Queries are compiled for both dialects, expanded to `?` placeholders and
//! run against an in-memory SQLite table whose text column is `NOCASE`, the
//! way MySQL's default collation compares. Postgres compilations skip
//! `Contains`, since SQLite has no `ILIKE`.

use proptest::prelude::*;
use proptest::test_runner::{TestCaseError, TestRunner};
use rowkit::prelude::*;
use rowkit::transpiler::named;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

#[derive(Debug, Clone)]
struct Item {
    name: Option<String>,
    qty: Option<i64>,
    price: Option<f64>,
}

impl Item {
    fn record(&self, id: i64) -> Record {
        let mut record = Record::new();
        record.insert("id".into(), Value::Int(id));
        record.insert("name".into(), self.name.clone().into());
        record.insert("qty".into(), self.qty.into());
        record.insert("price".into(), self.price.into());
        record
    }
}

// ============================================================================
// Generators
// ============================================================================

fn arb_name() -> impl Strategy<Value = String> {
    "[a-cA-C]{0,3}"
}

fn arb_item() -> impl Strategy<Value = Item> {
    (
        prop::option::of(arb_name()),
        prop::option::of(-5i64..5),
        prop::option::of((-10i32..10).prop_map(|n| n as f64 / 2.0)),
    )
        .prop_map(|(name, qty, price)| Item { name, qty, price })
}

fn arb_bound(value: BoxedStrategy<Value>) -> impl Strategy<Value = RangeBound> {
    prop_oneof![
        Just(RangeBound::Unbounded),
        value.clone().prop_map(RangeBound::Inclusive),
        value.prop_map(RangeBound::Exclusive),
    ]
}

fn arb_range(field: &'static str, value: BoxedStrategy<Value>) -> impl Strategy<Value = Restriction> {
    (arb_bound(value.clone()), arb_bound(value))
        .prop_filter("at least one end bounded", |(lo, hi)| {
            !(matches!(lo, RangeBound::Unbounded) && matches!(hi, RangeBound::Unbounded))
        })
        .prop_map(move |(lo, hi)| Restriction::range(field, lo, hi))
}

fn arb_restriction() -> impl Strategy<Value = Restriction> {
    let qty = (-6i64..6).prop_map(Value::Int).boxed();
    let price = (-12i32..12).prop_map(|n| Value::Float(n as f64 / 2.0)).boxed();
    let whole_price = (-6i64..6).prop_map(Value::Int).boxed();

    let leaf = prop_oneof![
        prop::option::of(arb_name()).prop_map(|v| Restriction::eq("name", v)),
        prop::option::of(-5i64..5).prop_map(|v| Restriction::eq("qty", v)),
        price.clone().prop_map(|v| Restriction::eq("price", v)),
        "[a-cA-C]{0,2}".prop_map(|v| Restriction::contains("name", v)),
        arb_range("qty", qty.clone()),
        arb_range("price", price),
        arb_range("price", whole_price),
        prop::collection::vec(qty, 0..4).prop_map(|vs| Restriction::is_in("qty", vs)),
        prop::collection::vec(arb_name(), 0..3).prop_map(|vs| Restriction::is_in("name", vs)),
    ];
    (leaf, any::<bool>()).prop_map(|(r, negated)| if negated { r.not() } else { r })
}

fn arb_query() -> impl Strategy<Value = Query> {
    let group = prop::collection::vec(arb_restriction(), 0..3)
        .prop_map(|rs| rs.into_iter().fold(Query::new(), Query::filter));
    let disjunction = (prop::collection::vec(group, 0..3), any::<bool>()).prop_map(|(queries, negated)| {
        let d = Disjunction::new(queries);
        if negated { d.not() } else { d }
    });
    (
        prop::collection::vec(arb_restriction(), 0..3),
        prop::collection::vec(disjunction, 0..2),
    )
        .prop_map(|(restrictions, disjunctions)| Query {
            restrictions,
            disjunctions,
            order_by: Vec::new(),
        })
}

fn has_contains(query: &Query) -> bool {
    query.restrictions.iter().any(|r| r.kind() == RestrictionKind::Contains)
        || query.disjunctions.iter().any(|d| d.queries.iter().any(has_contains))
}

// ============================================================================
// SQLite harness
// ============================================================================

async fn setup() -> sqlx::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await?;
    sqlx::query("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT COLLATE NOCASE, qty INTEGER, price REAL)")
        .execute(&pool)
        .await?;
    Ok(pool)
}

async fn store(pool: &SqlitePool, items: &[Item]) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM items").execute(pool).await?;
    for (id, item) in items.iter().enumerate() {
        sqlx::query("INSERT INTO items (id, name, qty, price) VALUES (?, ?, ?, ?)")
            .bind(id as i64)
            .bind(item.name.clone())
            .bind(item.qty)
            .bind(item.price)
            .execute(pool)
            .await?;
    }
    Ok(())
}

async fn select_ids(pool: &SqlitePool, dialect: Dialect, query: &Query) -> Result<Vec<i64>, TestCaseError> {
    let compiled = QueryCompiler::for_dialect(dialect)
        .compile(query)
        .map_err(|e| TestCaseError::fail(e.to_string()))?;
    let sql = format!("SELECT id FROM items{} ORDER BY id", compiled.where_sql());
    // SQLite takes `?` whichever dialect quoted the identifiers
    let placeholders = Dialect::MySQL.generator();
    let (sql, values) =
        named::expand(&sql, &compiled.params, placeholders.as_ref()).map_err(|e| TestCaseError::fail(e.to_string()))?;

    let mut statement = sqlx::query_scalar::<_, i64>(&sql);
    for value in values {
        statement = match value {
            Value::Int(n) => statement.bind(n),
            Value::Float(f) => statement.bind(f),
            Value::String(s) => statement.bind(s),
            Value::Bool(b) => statement.bind(b),
            Value::Null => statement.bind(None::<i64>),
            other => return Err(TestCaseError::fail(format!("unexpected parameter {}", other))),
        };
    }
    statement
        .fetch_all(pool)
        .await
        .map_err(|e| TestCaseError::fail(format!("{}: {}", sql, e)))
}

async fn check(pool: &SqlitePool, items: &[Item], query: &Query) -> Result<(), TestCaseError> {
    store(pool, items).await.map_err(|e| TestCaseError::fail(e.to_string()))?;
    let expected: Vec<i64> = items
        .iter()
        .enumerate()
        .filter(|(id, item)| query.is_meet(&item.record(*id as i64)))
        .map(|(id, _)| id as i64)
        .collect();

    let mysql = select_ids(pool, Dialect::MySQL, query).await?;
    prop_assert_eq!(&mysql, &expected, "mysql: {}", query);

    if !has_contains(query) {
        let postgres = select_ids(pool, Dialect::Postgres, query).await?;
        prop_assert_eq!(&postgres, &expected, "postgres: {}", query);
    }
    Ok(())
}

#[test]
fn compiled_sql_matches_is_meet() {
    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
    let pool = rt.block_on(setup()).unwrap();

    let mut runner = TestRunner::new(ProptestConfig::with_cases(256));
    let strategy = (prop::collection::vec(arb_item(), 0..8), arb_query());
    runner
        .run(&strategy, |(items, query)| rt.block_on(check(&pool, &items, &query)))
        .unwrap();
}

#[test]
fn case_insensitive_equality_on_both_dialects() {
    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
    let pool = rt.block_on(setup()).unwrap();
    let items = vec![Item {
        name: Some("Hurray".into()),
        qty: Some(1),
        price: None,
    }];
    let query = Query::new().filter(Restriction::eq("name", "hurray"));
    rt.block_on(check(&pool, &items, &query)).unwrap();

    let found = rt.block_on(select_ids(&pool, Dialect::Postgres, &query)).unwrap();
    assert_eq!(found, vec![0]);
}

#[test]
fn integer_bound_on_fractional_column() {
    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
    let pool = rt.block_on(setup()).unwrap();
    let items = vec![
        Item { name: None, qty: None, price: Some(1.5) },
        Item { name: None, qty: None, price: Some(1.0) },
        Item { name: None, qty: None, price: Some(0.5) },
    ];
    for query in [
        Query::new().filter(Restriction::greater("price", 1)),
        Query::new().filter(Restriction::less("price", 1)),
        Query::new().filter(Restriction::greater("price", 1).not()),
        Query::new().filter(Restriction::range("price", RangeBound::Exclusive(Value::Int(0)), RangeBound::Exclusive(Value::Int(2)))),
    ] {
        rt.block_on(check(&pool, &items, &query)).unwrap();
    }

    let query = Query::new().filter(Restriction::greater("price", 1));
    assert_eq!(rt.block_on(select_ids(&pool, Dialect::MySQL, &query)).unwrap(), vec![0]);
}
