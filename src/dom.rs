//! Object graphs over a loaded [`DataSet`].
//!
//! Views are declared as a static table: each view maps one entity and names,
//! per navigable property, the ref it follows and the view of the rows at the
//! other end. Navigation never copies rows. Every [`Node`] borrows the single
//! arena instance of its row, so the same (entity, id) reached along different
//! paths is the same object.
//!
//! ```ignore
//! let views = ViewRegistry::builder(&catalog, &refs)
//!     .view(ViewMapping::new("envView", "env").many("devices", "envDevices", "deviceView"))
//!     .view(ViewMapping::new("deviceView", "device").one("env", "deviceEnv", "envView"))
//!     .build()?;
//! let envs = views.map_to_view("envView", &ds)?;
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::ast::Value;
use crate::dataset::DataSet;
use crate::entity::{Entity, EntityCatalog, Row};
use crate::error::{GraphError, GraphResult, MappingError};
use crate::refs::{Ref, RefQuantity, ReferencesRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

impl Cardinality {
    pub fn name(&self) -> &'static str {
        match self {
            Cardinality::One => "one",
            Cardinality::Many => "many",
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which end of the ref a view's entity sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Traversal {
    /// from → to
    Forward,
    /// to → from
    Inverse,
}

#[derive(Debug, Clone)]
struct PropertyMapping {
    name: String,
    reference: String,
    target_view: String,
    cardinality: Cardinality,
}

/// Declaration of one view before validation.
#[derive(Debug, Clone)]
pub struct ViewMapping {
    name: String,
    entity: String,
    properties: Vec<PropertyMapping>,
}

impl ViewMapping {
    pub fn new(name: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity: entity.into(),
            properties: Vec::new(),
        }
    }

    /// A collection property.
    pub fn many(self, property: &str, reference: &str, target_view: &str) -> Self {
        self.property(property, reference, target_view, Cardinality::Many)
    }

    /// A single-valued property.
    pub fn one(self, property: &str, reference: &str, target_view: &str) -> Self {
        self.property(property, reference, target_view, Cardinality::One)
    }

    fn property(mut self, name: &str, reference: &str, target_view: &str, cardinality: Cardinality) -> Self {
        self.properties.push(PropertyMapping {
            name: name.to_string(),
            reference: reference.to_string(),
            target_view: target_view.to_string(),
            cardinality,
        });
        self
    }
}

#[derive(Debug)]
struct ViewProperty {
    name: String,
    reference: Ref,
    traversal: Traversal,
    cardinality: Cardinality,
    target_view: String,
    target_entity: String,
    target_id: &'static str,
}

#[derive(Debug)]
struct View {
    name: String,
    entity: String,
    properties: Vec<ViewProperty>,
}

impl View {
    fn property(&self, name: &str) -> Option<&ViewProperty> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// Validated view mappings.
#[derive(Debug)]
pub struct ViewRegistry {
    views: HashMap<String, View>,
}

impl ViewRegistry {
    pub fn builder<'a>(catalog: &'a EntityCatalog, refs: &'a ReferencesRegistry) -> ViewRegistryBuilder<'a> {
        ViewRegistryBuilder {
            catalog,
            refs,
            mappings: Vec::new(),
        }
    }

    pub fn contains(&self, view: &str) -> bool {
        self.views.contains_key(view)
    }

    fn view(&self, name: &str) -> GraphResult<&View> {
        self.views.get(name).ok_or_else(|| GraphError::UnknownView(name.to_string()))
    }

    /// One node per root row of `ds`, after checking every edge reachable
    /// from them resolves.
    ///
    /// Roots are the rows of the DataSet's root query when it ran on the
    /// view's entity, otherwise every loaded row of that entity.
    pub fn map_to_view<'a>(&'a self, view: &str, ds: &'a DataSet) -> GraphResult<Vec<Node<'a>>> {
        let view = self.view(view)?;
        let rows: Vec<&'a dyn Row> = match (ds.root_entity(), ds.table(&view.entity)) {
            (Some(root), Some(table)) if root == view.entity => {
                ds.roots().iter().filter_map(|id| table.get(id)).collect()
            }
            (_, Some(table)) => table.rows().collect(),
            (_, None) => Vec::new(),
        };

        let nodes: Vec<Node<'a>> = rows
            .into_iter()
            .map(|row| Node {
                registry: self,
                ds,
                view,
                row,
            })
            .collect();
        validate(&nodes)?;
        Ok(nodes)
    }
}

/// Walk every edge reachable from `roots`, each (view, row) once.
fn validate(roots: &[Node<'_>]) -> GraphResult<()> {
    let mut visited = HashSet::new();
    let mut stack = roots.to_vec();
    while let Some(node) = stack.pop() {
        if !visited.insert((node.view.name.as_str(), node.row.row_id())) {
            continue;
        }
        for property in &node.view.properties {
            stack.extend(node.resolve(property)?);
        }
    }
    Ok(())
}

pub struct ViewRegistryBuilder<'a> {
    catalog: &'a EntityCatalog,
    refs: &'a ReferencesRegistry,
    mappings: Vec<ViewMapping>,
}

impl ViewRegistryBuilder<'_> {
    pub fn view(mut self, mapping: ViewMapping) -> Self {
        self.mappings.push(mapping);
        self
    }

    pub fn build(self) -> Result<ViewRegistry, MappingError> {
        let mut views = HashMap::new();
        for mapping in &self.mappings {
            if views.contains_key(&mapping.name) {
                return Err(MappingError::DuplicateView(mapping.name.clone()));
            }
            let view = self.resolve(mapping)?;
            views.insert(view.name.clone(), view);
        }

        for view in views.values() {
            for property in &view.properties {
                let target = views.get(&property.target_view).ok_or_else(|| MappingError::UnknownTargetView {
                    view: view.name.clone(),
                    property: property.name.clone(),
                    target: property.target_view.clone(),
                })?;
                if target.entity != property.target_entity {
                    return Err(MappingError::TargetEntity {
                        view: view.name.clone(),
                        property: property.name.clone(),
                        target: target.name.clone(),
                        expected: property.target_entity.clone(),
                        found: target.entity.clone(),
                    });
                }
            }
        }
        Ok(ViewRegistry { views })
    }

    fn resolve(&self, mapping: &ViewMapping) -> Result<View, MappingError> {
        if !self.catalog.contains(&mapping.entity) {
            return Err(MappingError::UnknownEntity {
                view: mapping.name.clone(),
                entity: mapping.entity.clone(),
            });
        }

        let mut properties: Vec<ViewProperty> = Vec::with_capacity(mapping.properties.len());
        for declared in &mapping.properties {
            if properties.iter().any(|p| p.name == declared.name) {
                return Err(MappingError::DuplicateProperty {
                    view: mapping.name.clone(),
                    property: declared.name.clone(),
                });
            }
            let reference = self.refs.get(&declared.reference).map_err(|_| MappingError::UnknownRef {
                view: mapping.name.clone(),
                property: declared.name.clone(),
                reference: declared.reference.clone(),
            })?;

            // A self-referencing ref navigates forward
            let (traversal, target_entity) = if reference.from_entity == mapping.entity {
                (Traversal::Forward, &reference.to_entity)
            } else if reference.to_entity == mapping.entity {
                (Traversal::Inverse, &reference.from_entity)
            } else {
                return Err(MappingError::DetachedRef {
                    view: mapping.name.clone(),
                    property: declared.name.clone(),
                    reference: reference.name.clone(),
                    entity: mapping.entity.clone(),
                });
            };

            let actual = cardinality(reference.quantity, traversal);
            if actual != declared.cardinality {
                return Err(MappingError::Cardinality {
                    view: mapping.name.clone(),
                    property: declared.name.clone(),
                    reference: reference.name.clone(),
                    declared: declared.cardinality.name(),
                    actual: actual.name(),
                });
            }

            let target_id = self
                .catalog
                .get(target_entity)
                .map(|meta| meta.id)
                .map_err(|_| MappingError::UnknownEntity {
                    view: mapping.name.clone(),
                    entity: target_entity.clone(),
                })?;

            properties.push(ViewProperty {
                name: declared.name.clone(),
                reference: reference.clone(),
                traversal,
                cardinality: actual,
                target_view: declared.target_view.clone(),
                target_entity: target_entity.clone(),
                target_id,
            });
        }

        Ok(View {
            name: mapping.name.clone(),
            entity: mapping.entity.clone(),
            properties,
        })
    }
}

fn cardinality(quantity: RefQuantity, traversal: Traversal) -> Cardinality {
    match (quantity, traversal) {
        (RefQuantity::Many2One, Traversal::Forward) | (RefQuantity::One2Many, Traversal::Inverse) => Cardinality::One,
        _ => Cardinality::Many,
    }
}

/// A row seen through a view.
#[derive(Clone, Copy)]
pub struct Node<'a> {
    registry: &'a ViewRegistry,
    ds: &'a DataSet,
    view: &'a View,
    row: &'a dyn Row,
}

impl<'a> Node<'a> {
    pub fn view(&self) -> &'a str {
        &self.view.name
    }

    pub fn entity(&self) -> &'a str {
        &self.view.entity
    }

    pub fn id(&self) -> Value {
        self.row.row_id()
    }

    /// Scalar property of the underlying row.
    pub fn get(&self, property: &str) -> Option<Value> {
        self.row.get(property)
    }

    pub fn as_row(&self) -> &'a dyn Row {
        self.row
    }

    pub fn row<T: Entity>(&self) -> Option<&'a T> {
        self.row.downcast_ref::<T>()
    }

    /// Rows behind a navigable property, in load order.
    pub fn many(&self, property: &str) -> GraphResult<Vec<Node<'a>>> {
        let property = self.property(property)?;
        self.resolve(property)
    }

    /// The row behind a single-valued property. On a collection property,
    /// the first row.
    pub fn one(&self, property: &str) -> GraphResult<Option<Node<'a>>> {
        Ok(self.many(property)?.into_iter().next())
    }

    /// Whether both nodes wrap the same arena row.
    pub fn same_instance(&self, other: &Node<'_>) -> bool {
        std::ptr::addr_eq(self.row, other.row)
    }

    fn property(&self, name: &str) -> GraphResult<&'a ViewProperty> {
        self.view.property(name).ok_or_else(|| GraphError::UnknownProperty {
            view: self.view.name.clone(),
            property: name.to_string(),
        })
    }

    fn resolve(&self, property: &ViewProperty) -> GraphResult<Vec<Node<'a>>> {
        let reference = &property.reference;
        if !self.ds.is_followed(&reference.name) {
            return Err(GraphError::RefNotLoaded(reference.name.clone()));
        }
        let view = self.registry.view(&property.target_view)?;

        let ids: Vec<Value> = match property.traversal {
            Traversal::Forward if reference.quantity == RefQuantity::Many2One && reference.to_field == property.target_id => {
                self.row.get(&reference.from_field).filter(|v| !v.is_null()).into_iter().collect()
            }
            Traversal::Forward => self
                .ds
                .table(&reference.from_entity)
                .map(|t| t.references().get(&self.row.row_id(), &reference.name).to_vec())
                .unwrap_or_default(),
            Traversal::Inverse => self
                .ds
                .table(&reference.to_entity)
                .map(|t| t.back_references().get(&self.row.row_id(), &reference.name).to_vec())
                .unwrap_or_default(),
        };

        let table = self.ds.table(&property.target_entity);
        ids.into_iter()
            .map(|id| {
                let row = table.and_then(|t| t.get(&id)).ok_or_else(|| GraphError::DanglingReference {
                    reference: reference.name.clone(),
                    entity: property.target_entity.clone(),
                    id: id.clone(),
                })?;
                Ok(Node {
                    registry: self.registry,
                    ds: self.ds,
                    view,
                    row,
                })
            })
            .collect()
    }
}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("view", &self.view.name)
            .field("entity", &self.view.entity)
            .field("id", &self.row.row_id())
            .finish()
    }
}
