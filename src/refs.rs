//! Named relations between entity types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::entity::EntityCatalog;
use crate::error::RegistryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationType {
    /// The source owns the targets (env → devices)
    Aggregates,
    /// The source belongs to the target (device → env)
    PartOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefQuantity {
    One2Many,
    Many2One,
    Many2Many,
}

/// A directed relation: rows of `from_entity` whose `from_field` equals
/// `to_field` of rows of `to_entity`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ref {
    pub name: String,
    pub from_entity: String,
    pub from_field: String,
    pub to_entity: String,
    pub to_field: String,
    pub relation: RelationType,
    pub quantity: RefQuantity,
}

impl Ref {
    pub fn new(
        name: impl Into<String>,
        (from_entity, from_field): (&str, &str),
        (to_entity, to_field): (&str, &str),
        relation: RelationType,
        quantity: RefQuantity,
    ) -> Self {
        Self {
            name: name.into(),
            from_entity: from_entity.to_string(),
            from_field: from_field.to_string(),
            to_entity: to_entity.to_string(),
            to_field: to_field.to_string(),
            relation,
            quantity,
        }
    }

    /// Parent to children: `Ref::one_to_many("envDevices", ("env", "id"), ("device", "envId"))`.
    pub fn one_to_many(name: impl Into<String>, from: (&str, &str), to: (&str, &str)) -> Self {
        Self::new(name, from, to, RelationType::Aggregates, RefQuantity::One2Many)
    }

    /// Child to parent: `Ref::many_to_one("deviceEnv", ("device", "envId"), ("env", "id"))`.
    pub fn many_to_one(name: impl Into<String>, from: (&str, &str), to: (&str, &str)) -> Self {
        Self::new(name, from, to, RelationType::PartOf, RefQuantity::Many2One)
    }

    pub fn many_to_many(name: impl Into<String>, from: (&str, &str), to: (&str, &str)) -> Self {
        Self::new(name, from, to, RelationType::Aggregates, RefQuantity::Many2Many)
    }

    /// Whether `entity` is either end of the relation.
    pub fn touches(&self, entity: &str) -> bool {
        self.from_entity == entity || self.to_entity == entity
    }
}

/// Validated, read-only set of refs.
#[derive(Debug, Clone, Default)]
pub struct ReferencesRegistry {
    refs: Vec<Ref>,
    by_name: HashMap<String, usize>,
}

impl ReferencesRegistry {
    pub fn builder(catalog: &EntityCatalog) -> ReferencesRegistryBuilder<'_> {
        ReferencesRegistryBuilder { catalog, refs: Vec::new() }
    }

    pub fn get(&self, name: &str) -> Result<&Ref, RegistryError> {
        self.by_name
            .get(name)
            .map(|&i| &self.refs[i])
            .ok_or_else(|| RegistryError::UnknownRef(name.to_string()))
    }

    /// Refs starting at `entity`, in declaration order.
    pub fn outgoing<'a>(&'a self, entity: &'a str) -> impl Iterator<Item = &'a Ref> + 'a {
        self.refs.iter().filter(move |r| r.from_entity == entity)
    }

    /// Refs ending at `entity`, in declaration order.
    pub fn incoming<'a>(&'a self, entity: &'a str) -> impl Iterator<Item = &'a Ref> + 'a {
        self.refs.iter().filter(move |r| r.to_entity == entity)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ref> {
        self.refs.iter()
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}

pub struct ReferencesRegistryBuilder<'a> {
    catalog: &'a EntityCatalog,
    refs: Vec<Ref>,
}

impl ReferencesRegistryBuilder<'_> {
    pub fn add(mut self, reference: Ref) -> Self {
        self.refs.push(reference);
        self
    }

    /// Check names and fields against the catalog.
    pub fn build(self) -> Result<ReferencesRegistry, RegistryError> {
        let mut by_name = HashMap::with_capacity(self.refs.len());
        for (i, r) in self.refs.iter().enumerate() {
            if by_name.insert(r.name.clone(), i).is_some() {
                return Err(RegistryError::DuplicateRef(r.name.clone()));
            }
            for (entity, field) in [(&r.from_entity, &r.from_field), (&r.to_entity, &r.to_field)] {
                let meta = self.catalog.get(entity).map_err(|_| RegistryError::UnknownEntity {
                    reference: r.name.clone(),
                    entity: entity.clone(),
                })?;
                if !meta.has(field) {
                    return Err(RegistryError::UnknownField {
                        reference: r.name.clone(),
                        entity: entity.clone(),
                        field: field.clone(),
                    });
                }
            }
        }
        Ok(ReferencesRegistry { refs: self.refs, by_name })
    }
}
