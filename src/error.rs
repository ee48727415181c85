//! Error types for rowkit.
//!
//! Misconfiguration (`RegistryError`, `MappingError`) is reported when the
//! registries are built at startup, never during data access.

use std::path::PathBuf;

use thiserror::Error;

use crate::ast::{RestrictionKind, Value};
use crate::validation::ValidationErrors;

/// Failure to render a query into SQL.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The dialect's registry has no converter for this restriction kind.
    #[error("No condition converter registered for {0} restrictions")]
    NoConverter(RestrictionKind),

    /// Both ends of a range are open.
    #[error("Range restriction on '{0}' has no bounds")]
    UnboundedRange(String),

    /// Range bound of a kind that has no ordering sentinel.
    #[error("Unsupported range bound on '{field}': {value}")]
    UnsupportedRangeValue { field: String, value: String },

    /// Range ends of different kinds.
    #[error("Range restriction on '{0}' mixes bound types")]
    MixedRange(String),

    /// `:name` in the SQL with no matching parameter.
    #[error("Unbound parameter ':{0}'")]
    UnboundParameter(String),

    /// Value that cannot be bound.
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Failure to move an entity across the record boundary.
#[derive(Debug, Error)]
pub enum EntityError {
    #[error("Unknown entity '{0}'")]
    UnknownEntity(String),

    #[error("Failed to encode {entity}: {source}")]
    Encode {
        entity: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to decode {entity}: {source}")]
    Decode {
        entity: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Property '{property}' of {entity} does not hold a {expected} value")]
    PropertyType {
        entity: String,
        property: String,
        expected: &'static str,
    },
}

/// Invalid reference declarations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Reference '{0}' is declared twice")]
    DuplicateRef(String),

    #[error("Unknown reference '{0}'")]
    UnknownRef(String),

    #[error("Reference '{reference}' names unknown entity '{entity}'")]
    UnknownEntity { reference: String, entity: String },

    #[error("Reference '{reference}' names unknown field '{field}' on {entity}")]
    UnknownField {
        reference: String,
        entity: String,
        field: String,
    },
}

/// Invalid view mappings.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("View '{0}' is declared twice")]
    DuplicateView(String),

    #[error("View '{view}' declares property '{property}' twice")]
    DuplicateProperty { view: String, property: String },

    #[error("View '{view}' maps unknown entity '{entity}'")]
    UnknownEntity { view: String, entity: String },

    #[error("Property '{view}.{property}' uses unknown reference '{reference}'")]
    UnknownRef {
        view: String,
        property: String,
        reference: String,
    },

    #[error("Property '{view}.{property}': reference '{reference}' does not touch entity '{entity}'")]
    DetachedRef {
        view: String,
        property: String,
        reference: String,
        entity: String,
    },

    #[error("Property '{view}.{property}' is declared as {declared} but reference '{reference}' yields {actual}")]
    Cardinality {
        view: String,
        property: String,
        reference: String,
        declared: &'static str,
        actual: &'static str,
    },

    #[error("Property '{view}.{property}' targets unknown view '{target}'")]
    UnknownTargetView {
        view: String,
        property: String,
        target: String,
    },

    #[error("Property '{view}.{property}' targets view '{target}' of entity '{found}', expected '{expected}'")]
    TargetEntity {
        view: String,
        property: String,
        target: String,
        expected: String,
        found: String,
    },
}

/// Errors raised at the storage boundary.
#[derive(Debug, Error)]
pub enum DaoError {
    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: Value },

    /// Optimistic lock failure: the row changed since it was read.
    #[error("{entity} {id} was modified concurrently")]
    ConcurrentModification { entity: String, id: Value },

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("{entity} record has no id")]
    MissingId { entity: String },

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Entity(#[from] EntityError),
}

/// Errors raised while loading a DataSet.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Entity(#[from] EntityError),

    #[error(transparent)]
    Dao(#[from] DaoError),

    /// The ref's source entity has no table in the DataSet yet.
    #[error("Reference '{reference}' starts at {entity}, which is not loaded")]
    DetachedRef { reference: String, entity: String },
}

/// Errors raised while navigating an object graph.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Unknown view '{0}'")]
    UnknownView(String),

    #[error("View '{view}' has no property '{property}'")]
    UnknownProperty { view: String, property: String },

    #[error("Reference '{0}' was not loaded into the DataSet")]
    RefNotLoaded(String),

    /// An index points at a row the arena does not hold.
    #[error("Reference '{reference}' points at missing {entity} {id}")]
    DanglingReference {
        reference: String,
        entity: String,
        id: Value,
    },
}

/// Errors reading `rowkit.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("No rowkit.toml found")]
    NotFound,
}

/// A filter expression that does not parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Parse error at position {position}: {message}")]
pub struct ParseError {
    pub position: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

pub type CompileResult<T> = Result<T, CompileError>;
pub type DaoResult<T> = Result<T, DaoError>;
pub type LoadResult<T> = Result<T, LoadError>;
pub type GraphResult<T> = Result<T, GraphError>;
