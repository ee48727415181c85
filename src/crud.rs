//! Typed CRUD over any [`Dao`].

use tracing::warn;

use crate::ast::{Query, Value};
use crate::dao::{Dao, Pager};
use crate::entity::{from_record, to_record, Entity, EntityMeta, Record};
use crate::error::{DaoError, DaoResult};
use crate::hooks::{Mutation, WireTap};

/// Entity-typed facade: encodes to records, runs the wire taps before each
/// mutation and stamps writes with the acting user.
pub struct Crud<D: Dao> {
    dao: D,
    taps: Vec<Box<dyn WireTap>>,
    actor: Option<String>,
}

impl<D: Dao> Crud<D> {
    pub fn new(dao: D) -> Self {
        Self {
            dao,
            taps: Vec::new(),
            actor: None,
        }
    }

    /// Taps run in registration order; the first rejection wins.
    pub fn with_tap(mut self, tap: impl WireTap + 'static) -> Self {
        self.taps.push(Box::new(tap));
        self
    }

    /// User recorded in `createdBy` / `modifiedBy`.
    pub fn acting_as(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn dao(&self) -> &D {
        &self.dao
    }

    pub async fn find<T: Entity>(&self, id: impl Into<Value>) -> DaoResult<Option<T>> {
        let meta = EntityMeta::of::<T>();
        match self.dao.find(&meta, &id.into()).await? {
            Some(record) => Ok(Some(from_record(&record)?)),
            None => Ok(None),
        }
    }

    /// Like [`Crud::find`], but a missing row is [`DaoError::NotFound`].
    pub async fn get<T: Entity>(&self, id: impl Into<Value>) -> DaoResult<T> {
        let id = id.into();
        self.find(id.clone()).await?.ok_or_else(|| DaoError::NotFound {
            entity: T::NAME.to_string(),
            id,
        })
    }

    pub async fn query<T: Entity>(&self, query: &Query, pager: Option<Pager>) -> DaoResult<Vec<T>> {
        let meta = EntityMeta::of::<T>();
        let records = self.dao.query(&meta, query, pager).await?;
        Ok(records.iter().map(from_record).collect::<Result<_, _>>()?)
    }

    pub async fn count<T: Entity>(&self, query: &Query) -> DaoResult<u64> {
        self.dao.count(&EntityMeta::of::<T>(), query).await
    }

    pub async fn create<T: Entity>(&self, entity: &T) -> DaoResult<T> {
        let (meta, record) = self.prepare(Mutation::Create, entity)?;
        let stored = self.dao.create(&meta, record, self.actor.as_deref()).await?;
        Ok(from_record(&stored)?)
    }

    /// Update `entity`. Its `modifiedAt` must be the one last read, and the
    /// returned copy carries the new one.
    pub async fn update<T: Entity>(&self, entity: &T) -> DaoResult<T> {
        let (meta, record) = self.prepare(Mutation::Update, entity)?;
        let stored = self.dao.update(&meta, record, self.actor.as_deref()).await?;
        Ok(from_record(&stored)?)
    }

    pub async fn delete<T: Entity>(&self, entity: &T) -> DaoResult<()> {
        let (meta, record) = self.prepare(Mutation::Delete, entity)?;
        self.dao.delete(&meta, &record).await
    }

    fn prepare<T: Entity>(&self, mutation: Mutation, entity: &T) -> DaoResult<(EntityMeta, Record)> {
        let meta = EntityMeta::of::<T>();
        let record = to_record(entity)?;
        for tap in &self.taps {
            if let Err(err) = tap.before(mutation, &meta, &record) {
                warn!(entity = meta.name, id = %entity.id(), %mutation, error = %err, "mutation rejected");
                return Err(err);
            }
        }
        Ok((meta, record))
    }
}
