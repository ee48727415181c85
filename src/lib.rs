//! # rowkit
//!
//! Typed restriction queries, dialect-aware SQL compilation and batched
//! object-graph loading for plain data rows.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use rowkit::prelude::*;
//!
//! let query = Query::new()
//!     .filter(Restriction::eq("envId", 1))
//!     .filter(Restriction::contains("name", "hur"));
//!
//! let compiled = QueryCompiler::for_dialect(Dialect::MySQL).compile(&query)?;
//! // => "`env_id` = :p0 AND `name` LIKE :p1"
//!
//! let ds = DataSetLoader::new(&dao, &catalog, &refs)
//!     .load("env", 1, &["envDevices", "deviceEnv"])
//!     .await?;
//! let envs = views.map_to_view("envView", &ds)?;
//! ```
//!
//! ## Layers
//!
//! | Module       | Role                                           |
//! |--------------|------------------------------------------------|
//! | `ast`        | Restrictions, queries, in-memory evaluation    |
//! | `transpiler` | Per-dialect SQL rendering, parameter expansion |
//! | `translator` | Constraint violations → field errors           |
//! | `entity`     | Row types and their metadata                   |
//! | `refs`       | Named relations between entities               |
//! | `dao`        | Storage boundary, optimistic locking           |
//! | `loader`     | Batched DataSet loading                        |
//! | `dom`        | Identity-sharing object graphs over a DataSet  |

pub mod ast;
pub mod config;
pub mod crud;
pub mod dao;
pub mod dataset;
pub mod dom;
pub mod entity;
pub mod error;
pub mod hooks;
pub mod loader;
pub mod naming;
pub mod parser;
pub mod refs;
pub mod translator;
pub mod transpiler;
pub mod validation;

#[cfg(test)]
mod fixtures;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::config::Config;
    pub use crate::crud::Crud;
    pub use crate::dao::{Dao, MemoryDao, Pager, SqlDao};
    pub use crate::dataset::{DataSet, DataTable};
    pub use crate::dom::{Node, ViewMapping, ViewRegistry};
    pub use crate::entity::{Entity, EntityCatalog, EntityMeta, Kind, Property, Record, Row};
    pub use crate::error::*;
    pub use crate::hooks::{Mutation, MutationPolicy, WireTap};
    pub use crate::loader::DataSetLoader;
    pub use crate::parser::parse;
    pub use crate::refs::{Ref, RefQuantity, ReferencesRegistry, RelationType};
    pub use crate::translator::ExceptionTranslator;
    pub use crate::transpiler::{CompiledQuery, Dialect, QueryCompiler};
    pub use crate::validation::{FieldError, ValidationErrors};
}

/// Parse a filter expression into a [`ast::Query`].
///
/// # Example
///
/// ```
/// use rowkit::parse;
///
/// let query = parse("[envId=1][name~hur]").unwrap();
/// assert_eq!(query.restrictions.len(), 2);
/// ```
pub fn parse(input: &str) -> Result<ast::Query, error::ParseError> {
    parser::parse(input)
}
