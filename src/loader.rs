//! Batched DataSet loading.
//!
//! A load runs the root query, then follows each requested ref with a single
//! `IN` query over the distinct join values already loaded. `k` refs cost at
//! most `k + 1` queries however many rows come back.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::ast::{Query, Restriction, Value};
use crate::dao::Dao;
use crate::dataset::DataSet;
use crate::entity::EntityCatalog;
use crate::error::{LoadError, LoadResult};
use crate::refs::{Ref, ReferencesRegistry};

pub struct DataSetLoader<'a, D: Dao> {
    dao: &'a D,
    catalog: &'a EntityCatalog,
    refs: &'a ReferencesRegistry,
}

impl<'a, D: Dao> DataSetLoader<'a, D> {
    pub fn new(dao: &'a D, catalog: &'a EntityCatalog, refs: &'a ReferencesRegistry) -> Self {
        Self { dao, catalog, refs }
    }

    /// Load one root row by id and follow `refs` in order.
    pub async fn load(&self, root: &str, id: impl Into<Value>, refs: &[&str]) -> LoadResult<DataSet> {
        let meta = self.catalog.get(root)?;
        let query = Query::new().filter(Restriction::eq(meta.id, id));
        self.load_query(root, &query, refs).await
    }

    /// Load every root row matching `query` and follow `refs` in order.
    pub async fn load_query(&self, root: &str, query: &Query, refs: &[&str]) -> LoadResult<DataSet> {
        // Resolve every ref up front so a typo fails before any query runs
        for name in refs {
            self.refs.get(name)?;
        }
        let meta = self.catalog.get(root)?;
        let records = self.dao.query(meta, query, None).await?;

        let mut ds = DataSet::new();
        let mut roots = Vec::with_capacity(records.len());
        let table = ds.table_for(meta);
        for record in &records {
            let row = meta.decode(record)?;
            roots.push(row.row_id());
            table.insert(row);
        }
        ds.set_roots(root, roots);
        debug!(entity = root, rows = records.len(), "loaded root");

        self.follow(&mut ds, refs).await?;
        Ok(ds)
    }

    /// Follow further refs from what `ds` already holds.
    pub async fn follow(&self, ds: &mut DataSet, refs: &[&str]) -> LoadResult<()> {
        for name in refs {
            let reference = self.refs.get(name)?;
            self.follow_ref(ds, reference).await?;
        }
        Ok(())
    }

    async fn follow_ref(&self, ds: &mut DataSet, reference: &Ref) -> LoadResult<()> {
        let source = ds.table(&reference.from_entity).ok_or_else(|| LoadError::DetachedRef {
            reference: reference.name.clone(),
            entity: reference.from_entity.clone(),
        })?;

        let mut seen = HashSet::new();
        let keys: Vec<Value> = source
            .rows()
            .filter_map(|row| row.get(&reference.from_field))
            .filter(|v| !v.is_null() && seen.insert(v.clone()))
            .collect();

        let target = self.catalog.get(&reference.to_entity)?;
        let by_id = reference.to_field == target.id;
        let cached = by_id
            && ds
                .table(&reference.to_entity)
                .is_some_and(|t| keys.iter().all(|k| t.contains(k)));

        let mut fetched = 0;
        if !keys.is_empty() && !cached {
            let query = Query::new().filter(Restriction::is_in(reference.to_field.as_str(), keys.clone()));
            let records = self.dao.query(target, &query, None).await?;
            fetched = records.len();
            let table = ds.table_for(target);
            for record in &records {
                table.insert(target.decode(record)?);
            }
        } else {
            ds.table_for(target);
        }

        let edges = self.edges(ds, reference);
        for (from, to) in &edges {
            if let Some(table) = ds.table_mut(&reference.from_entity) {
                table.references_mut().add(from.clone(), &reference.name, to.clone());
            }
            if let Some(table) = ds.table_mut(&reference.to_entity) {
                table.back_references_mut().add(to.clone(), &reference.name, from.clone());
            }
        }
        ds.mark_followed(&reference.name);

        debug!(
            reference = %reference.name,
            keys = keys.len(),
            fetched,
            cached,
            edges = edges.len(),
            "followed ref"
        );
        Ok(())
    }

    /// `(source id, target id)` pairs joined on the ref's fields, in load order.
    fn edges(&self, ds: &DataSet, reference: &Ref) -> Vec<(Value, Value)> {
        let (Some(source), Some(target)) = (ds.table(&reference.from_entity), ds.table(&reference.to_entity)) else {
            return Vec::new();
        };

        let mut by_key: HashMap<Value, Vec<Value>> = HashMap::new();
        for row in target.rows() {
            if let Some(key) = row.get(&reference.to_field).filter(|k| !k.is_null()) {
                by_key.entry(key).or_default().push(row.row_id());
            }
        }

        let mut edges = Vec::new();
        for row in source.rows() {
            let Some(key) = row.get(&reference.from_field) else {
                continue;
            };
            if let Some(targets) = by_key.get(&key) {
                for to in targets {
                    edges.push((row.row_id(), to.clone()));
                }
            }
        }
        edges
    }
}
