//! Shared unit-test entities: environments and their devices.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ast::Value;
use crate::entity::{Entity, EntityCatalog, Kind, Property};
use crate::refs::{Ref, ReferencesRegistry};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Env {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,
}

impl Entity for Env {
    const NAME: &'static str = "env";
    const TABLE: &'static str = "env";
    const PROPERTIES: &'static [Property] = &[
        Property::new("id", Kind::Int),
        Property::new("name", Kind::Text),
        Property::new("modifiedAt", Kind::Timestamp),
    ];

    fn id(&self) -> Value {
        self.id.into()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: i64,
    pub env_id: Option<i64>,
    pub name: String,
}

impl Entity for Device {
    const NAME: &'static str = "device";
    const TABLE: &'static str = "device";
    const PROPERTIES: &'static [Property] = &[
        Property::new("id", Kind::Int),
        Property::new("envId", Kind::Int),
        Property::new("name", Kind::Text),
    ];

    fn id(&self) -> Value {
        self.id.into()
    }
}

pub fn env(id: i64, name: &str) -> Env {
    Env { id, name: name.to_string(), modified_at: None }
}

pub fn device(id: i64, env_id: i64, name: &str) -> Device {
    Device { id, env_id: Some(env_id), name: name.to_string() }
}

pub fn catalog() -> EntityCatalog {
    EntityCatalog::new().register::<Env>().register::<Device>()
}

pub fn refs() -> ReferencesRegistry {
    ReferencesRegistry::builder(&catalog())
        .add(Ref::one_to_many("envDevices", ("env", "id"), ("device", "envId")))
        .add(Ref::many_to_one("deviceEnv", ("device", "envId"), ("env", "id")))
        .build()
        .expect("fixture refs are valid")
}
