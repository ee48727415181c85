//! Entities and the record boundary.
//!
//! An entity is a plain serde struct with a static property table. Rows cross
//! the DAO boundary as [`Record`]s (property name → [`Value`]) and live in a
//! DataSet as type-erased [`Row`]s that can be downcast back to the struct.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Number};

use crate::ast::{PropertyAccessor, Value};
use crate::error::EntityError;

/// Audit properties, stamped by the DAO when an entity declares them.
pub const CREATED_AT: &str = "createdAt";
pub const MODIFIED_AT: &str = "modifiedAt";
pub const CREATED_BY: &str = "createdBy";
pub const MODIFIED_BY: &str = "modifiedBy";

/// Storage kind of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Bool,
    Int,
    Float,
    Text,
    Timestamp,
}

impl Kind {
    pub fn name(&self) -> &'static str {
        match self {
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Float => "float",
            Kind::Text => "text",
            Kind::Timestamp => "timestamp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Property {
    pub name: &'static str,
    pub kind: Kind,
}

impl Property {
    pub const fn new(name: &'static str, kind: Kind) -> Self {
        Self { name, kind }
    }
}

/// A row at the DAO boundary.
pub type Record = BTreeMap<String, Value>;

/// A persistent type.
///
/// ```ignore
/// #[derive(Debug, Serialize, Deserialize)]
/// #[serde(rename_all = "camelCase")]
/// struct Device { id: i64, env_id: i64, name: String }
///
/// impl Entity for Device {
///     const NAME: &'static str = "device";
///     const TABLE: &'static str = "device";
///     const PROPERTIES: &'static [Property] = &[
///         Property::new("id", Kind::Int),
///         Property::new("envId", Kind::Int),
///         Property::new("name", Kind::Text),
///     ];
///     fn id(&self) -> Value { self.id.into() }
/// }
/// ```
pub trait Entity: Serialize + DeserializeOwned + Debug + Send + Sync + 'static {
    const NAME: &'static str;
    const TABLE: &'static str;
    /// Every persisted property, by serde (camelCase) name
    const PROPERTIES: &'static [Property];
    const ID: &'static str = "id";

    fn id(&self) -> Value;
}

/// Type-erased entity instance held by a DataSet.
pub trait Row: Debug + Send + Sync {
    fn entity_name(&self) -> &'static str;
    fn row_id(&self) -> Value;
    /// Property value by name; `None` for undeclared properties.
    fn get(&self, name: &str) -> Option<Value>;
    fn to_record(&self) -> Result<Record, EntityError>;
    fn as_any(&self) -> &dyn Any;
}

impl<T: Entity> Row for T {
    fn entity_name(&self) -> &'static str {
        T::NAME
    }

    fn row_id(&self) -> Value {
        Entity::id(self)
    }

    fn get(&self, name: &str) -> Option<Value> {
        if name == T::ID {
            return Some(Entity::id(self));
        }
        let kind = T::PROPERTIES.iter().find(|p| p.name == name)?.kind;
        let json = serde_json::to_value(self).ok()?;
        from_json::<T>(name, kind, json.get(name)?).ok()
    }

    fn to_record(&self) -> Result<Record, EntityError> {
        to_record(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<'r> PropertyAccessor for dyn Row + 'r {
    fn property(&self, name: &str) -> Option<Value> {
        self.get(name)
    }
}

impl<'r> dyn Row + 'r {
    pub fn downcast_ref<T: Entity>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Encode an entity into a record of its declared properties.
pub fn to_record<T: Entity>(entity: &T) -> Result<Record, EntityError> {
    let json = serde_json::to_value(entity)
        .map_err(|source| EntityError::Encode { entity: T::NAME.to_string(), source })?;
    let mut record = Record::new();
    for property in T::PROPERTIES {
        let value = match json.get(property.name) {
            Some(v) => from_json::<T>(property.name, property.kind, v)?,
            None => Value::Null,
        };
        record.insert(property.name.to_string(), value);
    }
    Ok(record)
}

/// Decode an entity from a record. Unknown keys are ignored by serde.
pub fn from_record<T: Entity>(record: &Record) -> Result<T, EntityError> {
    let object: Map<String, serde_json::Value> =
        record.iter().map(|(k, v)| (k.clone(), to_json(v))).collect();
    serde_json::from_value(serde_json::Value::Object(object))
        .map_err(|source| EntityError::Decode { entity: T::NAME.to_string(), source })
}

fn from_json<T: Entity>(name: &str, kind: Kind, json: &serde_json::Value) -> Result<Value, EntityError> {
    if json.is_null() {
        return Ok(Value::Null);
    }
    let value = match kind {
        Kind::Bool => json.as_bool().map(Value::Bool),
        Kind::Int => json.as_i64().map(Value::Int),
        Kind::Float => json.as_f64().map(Value::Float),
        Kind::Text => json.as_str().map(|s| Value::String(s.to_string())),
        Kind::Timestamp => json
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| Value::Timestamp(t.with_timezone(&Utc))),
    };
    value.ok_or_else(|| EntityError::PropertyType {
        entity: T::NAME.to_string(),
        property: name.to_string(),
        expected: kind.name(),
    })
}

fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(n) => serde_json::Value::Number((*n).into()),
        Value::Float(f) => Number::from_f64(*f).map_or(serde_json::Value::Null, serde_json::Value::Number),
        Value::Timestamp(t) => serde_json::Value::String(t.to_rfc3339()),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::List(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
    }
}

/// Static description of an entity type, usable without the type parameter.
#[derive(Debug, Clone, Copy)]
pub struct EntityMeta {
    pub name: &'static str,
    pub table: &'static str,
    pub id: &'static str,
    pub properties: &'static [Property],
    decode: fn(&Record) -> Result<Box<dyn Row>, EntityError>,
}

fn decode_row<T: Entity>(record: &Record) -> Result<Box<dyn Row>, EntityError> {
    Ok(Box::new(from_record::<T>(record)?))
}

impl EntityMeta {
    pub fn of<T: Entity>() -> Self {
        Self {
            name: T::NAME,
            table: T::TABLE,
            id: T::ID,
            properties: T::PROPERTIES,
            decode: decode_row::<T>,
        }
    }

    pub fn decode(&self, record: &Record) -> Result<Box<dyn Row>, EntityError> {
        (self.decode)(record)
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.property(name).is_some()
    }

    pub fn kind(&self, name: &str) -> Option<Kind> {
        self.property(name).map(|p| p.kind)
    }

    /// Whether updates are guarded by the optimistic lock.
    pub fn is_versioned(&self) -> bool {
        self.kind(MODIFIED_AT) == Some(Kind::Timestamp)
    }
}

/// Known entity types by name.
#[derive(Debug, Clone, Default)]
pub struct EntityCatalog {
    entities: HashMap<&'static str, EntityMeta>,
}

impl EntityCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Entity>(mut self) -> Self {
        self.entities.insert(T::NAME, EntityMeta::of::<T>());
        self
    }

    pub fn get(&self, name: &str) -> Result<&EntityMeta, EntityError> {
        self.entities.get(name).ok_or_else(|| EntityError::UnknownEntity(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityMeta> {
        self.entities.values()
    }
}
