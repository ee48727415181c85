//! Storage boundary.
//!
//! A [`Dao`] moves [`Record`]s in and out of a store. Writes follow the
//! optimistic concurrency contract: when an entity declares `modifiedAt`,
//! update and delete only touch the row if its stored `modifiedAt` still
//! equals the one the caller read, and every update moves it strictly
//! forward.

mod memory;
mod sql;

use std::future::Future;

use chrono::{DateTime, Duration, SubsecRound, Utc};

use crate::ast::{Query, Value};
use crate::entity::{EntityMeta, Record, CREATED_AT, CREATED_BY, MODIFIED_AT, MODIFIED_BY};
use crate::error::{DaoError, DaoResult};

pub use self::memory::MemoryDao;
pub use self::sql::{Pool, SqlDao};

/// Zero-based page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    pub page: u64,
    pub size: u64,
}

impl Pager {
    pub fn new(page: u64, size: u64) -> Self {
        Self { page, size }
    }

    pub fn first(size: u64) -> Self {
        Self::new(0, size)
    }

    pub fn offset(&self) -> u64 {
        self.page.saturating_mul(self.size)
    }

    pub fn limit(&self) -> u64 {
        self.size
    }
}

/// Record-level CRUD against one store.
///
/// Every method takes the entity's [`EntityMeta`]; implementations never
/// need the concrete type.
pub trait Dao: Send + Sync {
    /// Records matching `query`, in its order, optionally paged.
    fn query(
        &self,
        meta: &EntityMeta,
        query: &Query,
        pager: Option<Pager>,
    ) -> impl Future<Output = DaoResult<Vec<Record>>> + Send;

    fn count(&self, meta: &EntityMeta, query: &Query) -> impl Future<Output = DaoResult<u64>> + Send;

    fn find(&self, meta: &EntityMeta, id: &Value) -> impl Future<Output = DaoResult<Option<Record>>> + Send;

    /// Insert a record, returning it as stored (audit fields stamped).
    fn create(
        &self,
        meta: &EntityMeta,
        record: Record,
        actor: Option<&str>,
    ) -> impl Future<Output = DaoResult<Record>> + Send;

    /// Update a record guarded by its `modifiedAt`, returning it as stored.
    fn update(
        &self,
        meta: &EntityMeta,
        record: Record,
        actor: Option<&str>,
    ) -> impl Future<Output = DaoResult<Record>> + Send;

    /// Delete a record guarded by its `modifiedAt`.
    fn delete(&self, meta: &EntityMeta, record: &Record) -> impl Future<Output = DaoResult<()>> + Send;
}

/// Current time at the precision databases store.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// The `modifiedAt` an update writes: `now`, but always after `expected`.
pub fn next_modified_at(expected: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    match expected {
        Some(expected) => now.max(expected + Duration::milliseconds(1)).trunc_subsecs(6),
        None => now.trunc_subsecs(6),
    }
}

pub(crate) fn record_id(meta: &EntityMeta, record: &Record) -> DaoResult<Value> {
    match record.get(meta.id) {
        Some(id) if !id.is_null() => Ok(id.clone()),
        _ => Err(DaoError::MissingId { entity: meta.name.to_string() }),
    }
}

/// The `modifiedAt` the caller last read, when the entity is versioned.
pub(crate) fn expected_version(meta: &EntityMeta, record: &Record) -> Option<DateTime<Utc>> {
    if !meta.is_versioned() {
        return None;
    }
    record.get(MODIFIED_AT).and_then(Value::as_timestamp)
}

/// Set the declared audit properties of a new record.
pub(crate) fn stamp_create(meta: &EntityMeta, record: &mut Record, actor: Option<&str>, now: DateTime<Utc>) {
    for field in [CREATED_AT, MODIFIED_AT] {
        if meta.has(field) {
            record.insert(field.to_string(), Value::Timestamp(now));
        }
    }
    for field in [CREATED_BY, MODIFIED_BY] {
        if meta.has(field) {
            record.insert(field.to_string(), actor.into());
        }
    }
}

/// Set `modifiedAt`/`modifiedBy` for an update. Returns the expected version.
pub(crate) fn stamp_update(
    meta: &EntityMeta,
    record: &mut Record,
    actor: Option<&str>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let expected = expected_version(meta, record);
    if meta.is_versioned() {
        record.insert(MODIFIED_AT.to_string(), Value::Timestamp(next_modified_at(expected, now)));
    }
    if meta.has(MODIFIED_BY) {
        record.insert(MODIFIED_BY.to_string(), actor.into());
    }
    expected
}

/// Error for a guarded write that touched nothing.
pub(crate) fn stale(meta: &EntityMeta, id: Value) -> DaoError {
    if meta.is_versioned() {
        DaoError::ConcurrentModification { entity: meta.name.to_string(), id }
    } else {
        DaoError::NotFound { entity: meta.name.to_string(), id }
    }
}
