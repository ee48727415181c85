//! Materialized rows per entity type.
//!
//! A [`DataTable`] is an arena: each id maps to exactly one owned row, and
//! every relation is recorded as ids to look up in the arena, never as a
//! copy of the row.

use std::collections::{HashMap, HashSet};

use crate::ast::Value;
use crate::entity::{Entity, EntityMeta, Row};

/// row id → ref name → related row ids, in first-seen order without repeats.
#[derive(Debug, Clone, Default)]
pub struct RowIdToBackReferencesMap {
    map: HashMap<Value, HashMap<String, Vec<Value>>>,
}

impl RowIdToBackReferencesMap {
    pub fn add(&mut self, id: Value, reference: &str, related: Value) {
        let ids = self.map.entry(id).or_default().entry(reference.to_string()).or_default();
        if !ids.contains(&related) {
            ids.push(related);
        }
    }

    pub fn get(&self, id: &Value, reference: &str) -> &[Value] {
        self.map
            .get(id)
            .and_then(|refs| refs.get(reference))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every `(row id, related ids)` recorded for `reference`.
    pub fn entries<'a>(&'a self, reference: &'a str) -> impl Iterator<Item = (&'a Value, &'a [Value])> + 'a {
        self.map
            .iter()
            .filter_map(move |(id, refs)| refs.get(reference).map(|ids| (id, ids.as_slice())))
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Rows of one entity type keyed by id.
#[derive(Debug)]
pub struct DataTable {
    meta: EntityMeta,
    rows: Vec<Box<dyn Row>>,
    index: HashMap<Value, usize>,
    references: RowIdToBackReferencesMap,
    back_references: RowIdToBackReferencesMap,
}

impl DataTable {
    pub fn new(meta: EntityMeta) -> Self {
        Self {
            meta,
            rows: Vec::new(),
            index: HashMap::new(),
            references: RowIdToBackReferencesMap::default(),
            back_references: RowIdToBackReferencesMap::default(),
        }
    }

    pub fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    /// Add a row unless its id is already present. The first instance
    /// stays, so edges resolved earlier keep pointing at the same row.
    pub fn insert(&mut self, row: Box<dyn Row>) -> bool {
        let id = row.row_id();
        if self.index.contains_key(&id) {
            return false;
        }
        self.index.insert(id, self.rows.len());
        self.rows.push(row);
        true
    }

    pub fn get(&self, id: &Value) -> Option<&dyn Row> {
        self.index.get(id).map(|&i| self.rows[i].as_ref())
    }

    pub fn find<T: Entity>(&self, id: &Value) -> Option<&T> {
        self.get(id).and_then(|row| row.downcast_ref::<T>())
    }

    pub fn contains(&self, id: &Value) -> bool {
        self.index.contains_key(id)
    }

    /// Rows in load order.
    pub fn rows(&self) -> impl Iterator<Item = &dyn Row> {
        self.rows.iter().map(|r| r.as_ref())
    }

    pub fn typed<T: Entity>(&self) -> impl Iterator<Item = &T> {
        self.rows.iter().filter_map(|r| r.downcast_ref::<T>())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Outgoing edges: this row → ref → target ids.
    pub fn references(&self) -> &RowIdToBackReferencesMap {
        &self.references
    }

    /// Incoming edges: this row → ref → source ids.
    pub fn back_references(&self) -> &RowIdToBackReferencesMap {
        &self.back_references
    }

    pub(crate) fn references_mut(&mut self) -> &mut RowIdToBackReferencesMap {
        &mut self.references
    }

    pub(crate) fn back_references_mut(&mut self) -> &mut RowIdToBackReferencesMap {
        &mut self.back_references
    }
}

/// Result of one load: tables by entity name plus the refs followed.
#[derive(Debug, Default)]
pub struct DataSet {
    tables: HashMap<String, DataTable>,
    followed: HashSet<String>,
    root_entity: Option<String>,
    roots: Vec<Value>,
}

impl DataSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self, entity: &str) -> Option<&DataTable> {
        self.tables.get(entity)
    }

    pub(crate) fn table_mut(&mut self, entity: &str) -> Option<&mut DataTable> {
        self.tables.get_mut(entity)
    }

    /// The table for `meta`, created empty on first use.
    pub fn table_for(&mut self, meta: &EntityMeta) -> &mut DataTable {
        self.tables.entry(meta.name.to_string()).or_insert_with(|| DataTable::new(*meta))
    }

    pub fn has_table(&self, entity: &str) -> bool {
        self.tables.contains_key(entity)
    }

    pub fn tables(&self) -> impl Iterator<Item = &DataTable> {
        self.tables.values()
    }

    pub fn row(&self, entity: &str, id: &Value) -> Option<&dyn Row> {
        self.table(entity)?.get(id)
    }

    pub fn find<T: Entity>(&self, id: impl Into<Value>) -> Option<&T> {
        self.table(T::NAME)?.find::<T>(&id.into())
    }

    /// Every loaded row of `T`, in load order.
    pub fn rows<T: Entity>(&self) -> Vec<&T> {
        self.table(T::NAME).map(|t| t.typed::<T>().collect()).unwrap_or_default()
    }

    pub fn is_followed(&self, reference: &str) -> bool {
        self.followed.contains(reference)
    }

    pub(crate) fn mark_followed(&mut self, reference: &str) {
        self.followed.insert(reference.to_string());
    }

    /// Entity of the root query, once one has run.
    pub fn root_entity(&self) -> Option<&str> {
        self.root_entity.as_deref()
    }

    /// Ids returned by the root query, in result order.
    pub fn roots(&self) -> &[Value] {
        &self.roots
    }

    pub(crate) fn set_roots(&mut self, entity: &str, roots: Vec<Value>) {
        self.root_entity = Some(entity.to_string());
        self.roots = roots;
    }
}
