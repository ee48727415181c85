//! sqlx-backed DAO for PostgreSQL and MySQL.
//!
//! Statements are built from the compiler's named fragments and expanded to
//! the pool's placeholder style just before execution.

use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row as _;
use tracing::debug;

use super::{expected_version, now, record_id, stale, stamp_create, stamp_update, Dao, Pager};
use crate::ast::{Query, Value};
use crate::config::DatabaseConfig;
use crate::entity::{EntityMeta, Kind, Record, CREATED_AT, CREATED_BY, MODIFIED_AT};
use crate::error::{CompileError, DaoError, DaoResult};
use crate::naming::column_name;
use crate::translator::ExceptionTranslator;
use crate::transpiler::named::expand;
use crate::transpiler::{CompiledQuery, Dialect, ParamContext, QueryCompiler};

/// Connection pool for the configured dialect.
#[derive(Debug, Clone)]
pub enum Pool {
    Postgres(PgPool),
    MySql(MySqlPool),
}

impl Pool {
    pub fn dialect(&self) -> Dialect {
        match self {
            Pool::Postgres(_) => Dialect::Postgres,
            Pool::MySql(_) => Dialect::MySQL,
        }
    }
}

/// Bind already-expanded values in order. NULLs never reach here: statements
/// spell them as literals.
macro_rules! bind_values {
    ($query:expr, $values:expr) => {{
        let mut query = $query;
        for value in $values {
            query = match value {
                Value::Null => query.bind(None::<String>),
                Value::Bool(v) => query.bind(*v),
                Value::Int(v) => query.bind(*v),
                Value::Float(v) => query.bind(*v),
                Value::Timestamp(v) => query.bind(*v),
                Value::String(v) => query.bind(v.clone()),
                Value::List(_) => {
                    return Err(CompileError::InvalidValue("unexpanded list parameter".into()).into());
                }
            };
        }
        query
    }};
}

/// Decode a row's declared properties by kind, accepting narrower column
/// types than the property's.
macro_rules! decode_record {
    ($row:expr, $meta:expr) => {{
        let row = $row;
        let mut record = Record::new();
        for property in $meta.properties {
            let column = column_name(property.name);
            let col = column.as_str();
            let value: Value = match property.kind {
                Kind::Bool => row.try_get::<Option<bool>, _>(col)?.into(),
                Kind::Int => match row.try_get::<Option<i64>, _>(col) {
                    Ok(v) => v.into(),
                    Err(_) => match row.try_get::<Option<i32>, _>(col) {
                        Ok(v) => v.map(i64::from).into(),
                        Err(_) => row.try_get::<Option<i16>, _>(col)?.map(i64::from).into(),
                    },
                },
                Kind::Float => match row.try_get::<Option<f64>, _>(col) {
                    Ok(v) => v.into(),
                    Err(_) => row.try_get::<Option<f32>, _>(col)?.map(f64::from).into(),
                },
                Kind::Text => row.try_get::<Option<String>, _>(col)?.into(),
                Kind::Timestamp => match row.try_get::<Option<DateTime<Utc>>, _>(col) {
                    Ok(v) => v.into(),
                    Err(_) => row
                        .try_get::<Option<NaiveDateTime>, _>(col)?
                        .map(|t| t.and_utc())
                        .into(),
                },
            };
            record.insert(property.name.to_string(), value);
        }
        record
    }};
}

/// DAO over a PostgreSQL or MySQL pool.
pub struct SqlDao {
    pool: Pool,
    compiler: QueryCompiler,
    translator: Box<dyn ExceptionTranslator>,
}

impl SqlDao {
    /// Wrap a pool, using its dialect's compiler and translator.
    pub fn new(pool: Pool) -> Self {
        let dialect = pool.dialect();
        Self {
            pool,
            compiler: QueryCompiler::for_dialect(dialect),
            translator: dialect.translator(),
        }
    }

    /// Connect using `[database]` settings.
    pub async fn connect(config: &DatabaseConfig) -> DaoResult<Self> {
        let pool = match config.dialect {
            Dialect::Postgres => Pool::Postgres(
                PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .connect(&config.url)
                    .await?,
            ),
            Dialect::MySQL => Pool::MySql(
                MySqlPoolOptions::new()
                    .max_connections(config.max_connections)
                    .connect(&config.url)
                    .await?,
            ),
        };
        debug!(dialect = %config.dialect, "connected");
        Ok(Self::new(pool))
    }

    /// Replace the compiler, e.g. one built from a customised registry.
    pub fn with_compiler(mut self, compiler: QueryCompiler) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn compiler(&self) -> &QueryCompiler {
        &self.compiler
    }

    /// Driver errors become validation errors when the dialect recognises them.
    fn translate(&self, error: sqlx::Error) -> DaoError {
        match self.translator.translate(&error) {
            Some(errors) => DaoError::Validation(errors),
            None => DaoError::Database(error),
        }
    }

    fn expand(&self, sql: &str, params: &ParamContext) -> DaoResult<(String, Vec<Value>)> {
        Ok(expand(sql, &params.params, self.compiler.generator())?)
    }

    async fn fetch(&self, meta: &EntityMeta, sql: &str, values: &[Value]) -> DaoResult<Vec<Record>> {
        debug!(sql, params = values.len(), "fetch");
        let mut records = Vec::new();
        match &self.pool {
            Pool::Postgres(pool) => {
                let query = bind_values!(sqlx::query(sql), values);
                let rows = query.fetch_all(pool).await.map_err(|e| self.translate(e))?;
                for row in &rows {
                    records.push(decode_record!(row, meta));
                }
            }
            Pool::MySql(pool) => {
                let query = bind_values!(sqlx::query(sql), values);
                let rows = query.fetch_all(pool).await.map_err(|e| self.translate(e))?;
                for row in &rows {
                    records.push(decode_record!(row, meta));
                }
            }
        }
        Ok(records)
    }

    async fn execute(&self, sql: &str, values: &[Value]) -> DaoResult<u64> {
        debug!(sql, params = values.len(), "execute");
        let affected = match &self.pool {
            Pool::Postgres(pool) => bind_values!(sqlx::query(sql), values)
                .execute(pool)
                .await
                .map_err(|e| self.translate(e))?
                .rows_affected(),
            Pool::MySql(pool) => bind_values!(sqlx::query(sql), values)
                .execute(pool)
                .await
                .map_err(|e| self.translate(e))?
                .rows_affected(),
        };
        Ok(affected)
    }
}

/// Placeholder for a value, or a literal NULL.
fn assign(params: &mut ParamContext, value: &Value) -> String {
    if value.is_null() {
        "NULL".to_string()
    } else {
        params.add_param(value.clone())
    }
}

fn table(compiler: &QueryCompiler, meta: &EntityMeta) -> String {
    compiler.generator().quote_identifier(meta.table)
}

fn columns(compiler: &QueryCompiler, meta: &EntityMeta) -> String {
    meta.properties
        .iter()
        .map(|p| compiler.column(p.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `id = :pN`, plus the version check for versioned entities.
fn guard(
    compiler: &QueryCompiler,
    meta: &EntityMeta,
    id: Value,
    expected: Option<DateTime<Utc>>,
    params: &mut ParamContext,
) -> String {
    let mut sql = format!("{} = {}", compiler.column(meta.id), params.add_param(id));
    if meta.is_versioned() {
        let column = compiler.column(MODIFIED_AT);
        match expected {
            Some(t) => sql.push_str(&format!(" AND {} = {}", column, params.add_param(Value::Timestamp(t)))),
            None => sql.push_str(&format!(" AND {} IS NULL", column)),
        }
    }
    sql
}

fn select_sql(compiler: &QueryCompiler, meta: &EntityMeta, compiled: &CompiledQuery, pager: Option<Pager>) -> String {
    let mut sql = format!(
        "SELECT {} FROM {}{}{}",
        columns(compiler, meta),
        table(compiler, meta),
        compiled.where_sql(),
        compiled.order_sql()
    );
    if let Some(pager) = pager {
        sql.push_str(&compiler.generator().limit_offset(Some(pager.limit()), Some(pager.offset())));
    }
    sql
}

fn find_sql(compiler: &QueryCompiler, meta: &EntityMeta, id: &Value, params: &mut ParamContext) -> String {
    format!(
        "SELECT {} FROM {} WHERE {} = {}",
        columns(compiler, meta),
        table(compiler, meta),
        compiler.column(meta.id),
        params.add_param(id.clone())
    )
}

/// Every property present in the record, NULLs as literals.
fn insert_sql(compiler: &QueryCompiler, meta: &EntityMeta, record: &Record, params: &mut ParamContext) -> String {
    let mut columns = Vec::new();
    let mut placeholders = Vec::new();
    for property in meta.properties {
        if let Some(value) = record.get(property.name) {
            columns.push(compiler.column(property.name));
            placeholders.push(assign(params, value));
        }
    }
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table(compiler, meta),
        columns.join(", "),
        placeholders.join(", ")
    )
}

/// `UPDATE .. SET .. WHERE <guard>` for an already stamped record. `None`
/// when the record carries nothing to assign.
fn update_sql(
    compiler: &QueryCompiler,
    meta: &EntityMeta,
    record: &Record,
    id: Value,
    expected: Option<DateTime<Utc>>,
    params: &mut ParamContext,
) -> Option<String> {
    let assignments: Vec<String> = meta
        .properties
        .iter()
        .filter(|p| p.name != meta.id && p.name != CREATED_AT && p.name != CREATED_BY)
        .filter_map(|p| {
            record
                .get(p.name)
                .map(|value| format!("{} = {}", compiler.column(p.name), assign(params, value)))
        })
        .collect();
    if assignments.is_empty() {
        return None;
    }
    let guard = guard(compiler, meta, id, expected, params);
    Some(format!("UPDATE {} SET {} WHERE {}", table(compiler, meta), assignments.join(", "), guard))
}

fn delete_sql(
    compiler: &QueryCompiler,
    meta: &EntityMeta,
    id: Value,
    expected: Option<DateTime<Utc>>,
    params: &mut ParamContext,
) -> String {
    let guard = guard(compiler, meta, id, expected, params);
    format!("DELETE FROM {} WHERE {}", table(compiler, meta), guard)
}

impl Dao for SqlDao {
    async fn query(&self, meta: &EntityMeta, query: &Query, pager: Option<Pager>) -> DaoResult<Vec<Record>> {
        let compiled = self.compiler.compile(query)?;
        let sql = select_sql(&self.compiler, meta, &compiled, pager);
        let (sql, values) = expand(&sql, &compiled.params, self.compiler.generator())?;
        self.fetch(meta, &sql, &values).await
    }

    async fn count(&self, meta: &EntityMeta, query: &Query) -> DaoResult<u64> {
        let compiled = self.compiler.compile(query)?;
        let sql = format!("SELECT COUNT(*) FROM {}{}", table(&self.compiler, meta), compiled.where_sql());
        let (sql, values) = expand(&sql, &compiled.params, self.compiler.generator())?;
        debug!(sql, "count");
        let count: i64 = match &self.pool {
            Pool::Postgres(pool) => bind_values!(sqlx::query(&sql), &values)
                .fetch_one(pool)
                .await
                .map_err(|e| self.translate(e))?
                .try_get(0)?,
            Pool::MySql(pool) => bind_values!(sqlx::query(&sql), &values)
                .fetch_one(pool)
                .await
                .map_err(|e| self.translate(e))?
                .try_get(0)?,
        };
        Ok(count.max(0) as u64)
    }

    async fn find(&self, meta: &EntityMeta, id: &Value) -> DaoResult<Option<Record>> {
        let mut params = ParamContext::new();
        let sql = find_sql(&self.compiler, meta, id, &mut params);
        let (sql, values) = self.expand(&sql, &params)?;
        Ok(self.fetch(meta, &sql, &values).await?.into_iter().next())
    }

    async fn create(&self, meta: &EntityMeta, mut record: Record, actor: Option<&str>) -> DaoResult<Record> {
        record_id(meta, &record)?;
        stamp_create(meta, &mut record, actor, now());

        let mut params = ParamContext::new();
        let sql = insert_sql(&self.compiler, meta, &record, &mut params);
        let (sql, values) = self.expand(&sql, &params)?;
        self.execute(&sql, &values).await?;
        Ok(record)
    }

    async fn update(&self, meta: &EntityMeta, mut record: Record, actor: Option<&str>) -> DaoResult<Record> {
        let id = record_id(meta, &record)?;
        let expected = stamp_update(meta, &mut record, actor, now());

        let mut params = ParamContext::new();
        let Some(sql) = update_sql(&self.compiler, meta, &record, id.clone(), expected, &mut params) else {
            return Ok(record);
        };
        let (sql, values) = self.expand(&sql, &params)?;
        if self.execute(&sql, &values).await? == 0 {
            return Err(stale(meta, id));
        }
        Ok(record)
    }

    async fn delete(&self, meta: &EntityMeta, record: &Record) -> DaoResult<()> {
        let id = record_id(meta, record)?;
        let mut params = ParamContext::new();
        let sql = delete_sql(&self.compiler, meta, id.clone(), expected_version(meta, record), &mut params);
        let (sql, values) = self.expand(&sql, &params)?;
        if self.execute(&sql, &values).await? == 0 {
            return Err(stale(meta, id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Restriction;
    use crate::dao::next_modified_at;
    use crate::fixtures::{Device, Env};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn compiler(dialect: Dialect) -> QueryCompiler {
        QueryCompiler::for_dialect(dialect)
    }

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn expanded(dialect: Dialect, sql: &str, params: &ParamContext) -> (String, Vec<Value>) {
        expand(sql, &params.params, compiler(dialect).generator()).unwrap()
    }

    #[test]
    fn test_update_guards_on_expected_version() {
        let meta = EntityMeta::of::<Env>();
        let read_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let clock = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 5).unwrap();
        let mut record = record(&[
            ("id", Value::Int(1)),
            ("name", Value::from("renamed")),
            ("modifiedAt", Value::Timestamp(read_at)),
        ]);
        let expected = stamp_update(&meta, &mut record, None, clock);
        assert_eq!(expected, Some(read_at));

        let mut params = ParamContext::new();
        let sql = update_sql(&compiler(Dialect::MySQL), &meta, &record, Value::Int(1), expected, &mut params).unwrap();
        assert_eq!(
            sql,
            "UPDATE `env` SET `name` = :p0, `modified_at` = :p1 WHERE `id` = :p2 AND `modified_at` = :p3"
        );
        let (sql, values) = expanded(Dialect::MySQL, &sql, &params);
        assert_eq!(sql, "UPDATE `env` SET `name` = ?, `modified_at` = ? WHERE `id` = ? AND `modified_at` = ?");
        assert_eq!(
            values,
            vec![
                Value::from("renamed"),
                Value::Timestamp(next_modified_at(Some(read_at), clock)),
                Value::Int(1),
                Value::Timestamp(read_at),
            ]
        );

        let mut params = ParamContext::new();
        let sql =
            update_sql(&compiler(Dialect::Postgres), &meta, &record, Value::Int(1), expected, &mut params).unwrap();
        let (sql, values) = expanded(Dialect::Postgres, &sql, &params);
        assert_eq!(
            sql,
            "UPDATE \"env\" SET \"name\" = $1, \"modified_at\" = $2 WHERE \"id\" = $3 AND \"modified_at\" = $4"
        );
        assert_eq!(values[3], Value::Timestamp(read_at));
    }

    #[test]
    fn test_never_stored_version_guards_on_null() {
        let meta = EntityMeta::of::<Env>();
        let mut params = ParamContext::new();
        let sql = delete_sql(&compiler(Dialect::Postgres), &meta, Value::Int(1), None, &mut params);
        assert_eq!(sql, "DELETE FROM \"env\" WHERE \"id\" = :p0 AND \"modified_at\" IS NULL");
        assert_eq!(params.params, vec![("p0".to_string(), Value::Int(1))]);
    }

    #[test]
    fn test_delete_guards_on_expected_version() {
        let meta = EntityMeta::of::<Env>();
        let read_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut params = ParamContext::new();
        let sql = delete_sql(&compiler(Dialect::MySQL), &meta, Value::Int(7), Some(read_at), &mut params);
        let (sql, values) = expanded(Dialect::MySQL, &sql, &params);
        assert_eq!(sql, "DELETE FROM `env` WHERE `id` = ? AND `modified_at` = ?");
        assert_eq!(values, vec![Value::Int(7), Value::Timestamp(read_at)]);
    }

    #[test]
    fn test_unversioned_writes_guard_on_id_only() {
        let meta = EntityMeta::of::<Device>();
        let record = record(&[("id", Value::Int(3)), ("envId", Value::Null), ("name", Value::from("sensor"))]);

        let mut params = ParamContext::new();
        let sql = update_sql(&compiler(Dialect::MySQL), &meta, &record, Value::Int(3), None, &mut params).unwrap();
        assert_eq!(sql, "UPDATE `device` SET `env_id` = NULL, `name` = :p0 WHERE `id` = :p1");
        assert_eq!(
            params.params,
            vec![("p0".to_string(), Value::from("sensor")), ("p1".to_string(), Value::Int(3))]
        );

        let mut params = ParamContext::new();
        let sql = delete_sql(&compiler(Dialect::Postgres), &meta, Value::Int(3), None, &mut params);
        assert_eq!(sql, "DELETE FROM \"device\" WHERE \"id\" = :p0");
    }

    #[test]
    fn test_update_without_assignments() {
        let meta = EntityMeta::of::<Device>();
        let record = record(&[("id", Value::Int(3))]);
        let mut params = ParamContext::new();
        assert!(update_sql(&compiler(Dialect::MySQL), &meta, &record, Value::Int(3), None, &mut params).is_none());
    }

    #[test]
    fn test_insert_writes_nulls_as_literals() {
        let meta = EntityMeta::of::<Device>();
        let record = record(&[("id", Value::Int(3)), ("envId", Value::Null), ("name", Value::from("x"))]);
        let mut params = ParamContext::new();
        let sql = insert_sql(&compiler(Dialect::Postgres), &meta, &record, &mut params);
        let (sql, values) = expanded(Dialect::Postgres, &sql, &params);
        assert_eq!(sql, "INSERT INTO \"device\" (\"id\", \"env_id\", \"name\") VALUES ($1, NULL, $2)");
        assert_eq!(values, vec![Value::Int(3), Value::from("x")]);
    }

    #[test]
    fn test_select_and_find() {
        let meta = EntityMeta::of::<Device>();
        let compiler = compiler(Dialect::MySQL);
        let compiled = compiler.compile(&Query::new().filter(Restriction::eq("envId", 1))).unwrap();
        assert_eq!(
            select_sql(&compiler, &meta, &compiled, Some(Pager::new(2, 10))),
            "SELECT `id`, `env_id`, `name` FROM `device` WHERE `env_id` = :p0 LIMIT 10 OFFSET 20"
        );

        let mut params = ParamContext::new();
        assert_eq!(
            find_sql(&compiler, &meta, &Value::Int(4), &mut params),
            "SELECT `id`, `env_id`, `name` FROM `device` WHERE `id` = :p0"
        );
    }

    #[tokio::test]
    async fn test_driver_errors_are_translated_per_dialect() {
        let pool = MySqlPoolOptions::new().connect_lazy("mysql://localhost/rowkit").unwrap();
        let dao = SqlDao::new(Pool::MySql(pool));
        let err = dao.translate(sqlx::Error::Protocol("Duplicate entry '1' for key 'PRIMARY'".into()));
        match err {
            DaoError::Validation(errors) => assert_eq!(errors.fields(), vec!["id"]),
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(matches!(dao.translate(sqlx::Error::RowNotFound), DaoError::Database(_)));

        let pool = PgPoolOptions::new().connect_lazy("postgres://localhost/rowkit").unwrap();
        let dao = SqlDao::new(Pool::Postgres(pool));
        assert_eq!(dao.pool().dialect(), Dialect::Postgres);
        let err = dao.translate(sqlx::Error::Protocol("Key (article_key, lang) already exists".into()));
        match err {
            DaoError::Validation(errors) => assert_eq!(errors.fields(), vec!["articleKey", "lang"]),
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
