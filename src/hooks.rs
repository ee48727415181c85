//! Wire taps: checks run before every mutation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::{EntityMeta, Record};
use crate::error::{DaoError, DaoResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mutation {
    Create,
    Update,
    Delete,
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mutation::Create => "create",
            Mutation::Update => "update",
            Mutation::Delete => "delete",
        })
    }
}

/// Hook consulted before a mutation reaches the store.
///
/// Returning an error (normally [`DaoError::NotAuthorized`]) cancels it.
pub trait WireTap: Send + Sync {
    fn before(&self, mutation: Mutation, entity: &EntityMeta, record: &Record) -> DaoResult<()>;
}

/// Allowed mutations per entity. Entities without a rule are unrestricted;
/// `"*"` matches every entity.
#[derive(Debug, Clone, Default)]
pub struct MutationPolicy {
    rules: Vec<(String, Vec<Mutation>)>,
}

impl MutationPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(mut self, entity: impl Into<String>, mutations: &[Mutation]) -> Self {
        self.rules.push((entity.into(), mutations.to_vec()));
        self
    }

    /// No mutations at all on `entity`.
    pub fn read_only(self, entity: impl Into<String>) -> Self {
        self.allow(entity, &[])
    }
}

impl WireTap for MutationPolicy {
    fn before(&self, mutation: Mutation, entity: &EntityMeta, _record: &Record) -> DaoResult<()> {
        for (name, allowed) in &self.rules {
            if name != "*" && name != entity.name {
                continue;
            }
            if !allowed.contains(&mutation) {
                return Err(DaoError::NotAuthorized(format!("{} on {}", mutation, entity.name)));
            }
        }
        Ok(())
    }
}
