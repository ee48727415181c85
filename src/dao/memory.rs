use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use tokio::sync::Mutex;
use tracing::debug;

use super::{now, record_id, stale, stamp_create, stamp_update, Dao, Pager};
use crate::ast::{Direction, OrderBy, Query, Value};
use crate::entity::{to_record, Entity, EntityMeta, Record, CREATED_AT, CREATED_BY, MODIFIED_AT};
use crate::error::{DaoResult, EntityError};
use crate::validation::{FieldError, ValidationErrors};

/// In-process store filtering with [`Query::is_meet`].
///
/// Counts reads so tests can assert how many round trips a load takes.
#[derive(Debug, Default)]
pub struct MemoryDao {
    tables: Mutex<HashMap<String, Vec<Record>>>,
    queries: AtomicUsize,
}

impl MemoryDao {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed rows without audit stamping.
    pub fn with<T: Entity>(mut self, rows: impl IntoIterator<Item = T>) -> Result<Self, EntityError> {
        let table = self.tables.get_mut().entry(T::NAME.to_string()).or_default();
        for row in rows {
            table.push(to_record(&row)?);
        }
        Ok(self)
    }

    /// Reads (query, count, find) served so far.
    pub fn queries_issued(&self) -> usize {
        self.queries.load(AtomicOrdering::SeqCst)
    }

    pub fn reset_queries(&self) {
        self.queries.store(0, AtomicOrdering::SeqCst);
    }

    fn read(&self) {
        self.queries.fetch_add(1, AtomicOrdering::SeqCst);
    }
}

/// NULLs sort first, as in MySQL.
fn compare_records(a: &Record, b: &Record, order_by: &[OrderBy]) -> Ordering {
    for key in order_by {
        let left = a.get(&key.field).unwrap_or(&Value::Null);
        let right = b.get(&key.field).unwrap_or(&Value::Null);
        let ord = match (left.is_null(), right.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => left.compare(right).unwrap_or(Ordering::Equal),
        };
        let ord = if key.direction == Direction::Desc { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn same_id(meta: &EntityMeta, record: &Record, id: &Value) -> bool {
    record.get(meta.id) == Some(id)
}

impl Dao for MemoryDao {
    async fn query(&self, meta: &EntityMeta, query: &Query, pager: Option<Pager>) -> DaoResult<Vec<Record>> {
        self.read();
        let tables = self.tables.lock().await;
        let mut rows: Vec<Record> = tables
            .get(meta.name)
            .map(|rows| rows.iter().filter(|r| query.is_meet(*r)).cloned().collect())
            .unwrap_or_default();
        rows.sort_by(|a, b| compare_records(a, b, &query.order_by));
        if let Some(pager) = pager {
            rows = rows
                .into_iter()
                .skip(pager.offset() as usize)
                .take(pager.limit() as usize)
                .collect();
        }
        debug!(entity = meta.name, %query, rows = rows.len(), "memory query");
        Ok(rows)
    }

    async fn count(&self, meta: &EntityMeta, query: &Query) -> DaoResult<u64> {
        self.read();
        let tables = self.tables.lock().await;
        let count = tables
            .get(meta.name)
            .map(|rows| rows.iter().filter(|r| query.is_meet(*r)).count())
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn find(&self, meta: &EntityMeta, id: &Value) -> DaoResult<Option<Record>> {
        self.read();
        let tables = self.tables.lock().await;
        Ok(tables
            .get(meta.name)
            .and_then(|rows| rows.iter().find(|r| same_id(meta, r, id)))
            .cloned())
    }

    async fn create(&self, meta: &EntityMeta, mut record: Record, actor: Option<&str>) -> DaoResult<Record> {
        let id = record_id(meta, &record)?;
        let mut tables = self.tables.lock().await;
        let rows = tables.entry(meta.name.to_string()).or_default();
        if rows.iter().any(|r| same_id(meta, r, &id)) {
            return Err(ValidationErrors::from(FieldError::duplicate(meta.id)).into());
        }
        stamp_create(meta, &mut record, actor, now());
        rows.push(record.clone());
        Ok(record)
    }

    async fn update(&self, meta: &EntityMeta, mut record: Record, actor: Option<&str>) -> DaoResult<Record> {
        let id = record_id(meta, &record)?;
        let expected = stamp_update(meta, &mut record, actor, now());
        let mut tables = self.tables.lock().await;
        let stored = tables
            .get_mut(meta.name)
            .and_then(|rows| rows.iter_mut().find(|r| same_id(meta, r, &id)));
        let Some(stored) = stored else {
            return Err(stale(meta, id));
        };
        if meta.is_versioned() {
            let current = stored.get(MODIFIED_AT).and_then(Value::as_timestamp);
            if current != expected {
                return Err(stale(meta, id));
            }
        }
        for keep in [CREATED_AT, CREATED_BY] {
            match stored.get(keep) {
                Some(v) => record.insert(keep.to_string(), v.clone()),
                None => record.remove(keep),
            };
        }
        *stored = record.clone();
        Ok(record)
    }

    async fn delete(&self, meta: &EntityMeta, record: &Record) -> DaoResult<()> {
        let id = record_id(meta, record)?;
        let expected = super::expected_version(meta, record);
        let mut tables = self.tables.lock().await;
        let rows = tables.entry(meta.name.to_string()).or_default();
        let position = rows.iter().position(|r| {
            same_id(meta, r, &id)
                && (!meta.is_versioned() || r.get(MODIFIED_AT).and_then(Value::as_timestamp) == expected)
        });
        match position {
            Some(i) => {
                rows.remove(i);
                Ok(())
            }
            None => Err(stale(meta, id)),
        }
    }
}
