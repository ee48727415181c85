//! Entities shared by the integration tests: environments, their devices and
//! the sensors on each device.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use rowkit::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Env {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified_by: Option<String>,
}

impl Entity for Env {
    const NAME: &'static str = "env";
    const TABLE: &'static str = "env";
    const PROPERTIES: &'static [Property] = &[
        Property::new("id", Kind::Int),
        Property::new("name", Kind::Text),
        Property::new("modifiedAt", Kind::Timestamp),
        Property::new("modifiedBy", Kind::Text),
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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sensor {
    pub id: i64,
    pub device_id: i64,
    pub unit: String,
}

impl Entity for Sensor {
    const NAME: &'static str = "sensor";
    const TABLE: &'static str = "sensor";
    const PROPERTIES: &'static [Property] = &[
        Property::new("id", Kind::Int),
        Property::new("deviceId", Kind::Int),
        Property::new("unit", Kind::Text),
    ];

    fn id(&self) -> Value {
        self.id.into()
    }
}

pub fn env(id: i64, name: &str) -> Env {
    Env {
        id,
        name: name.to_string(),
        modified_at: None,
        modified_by: None,
    }
}

pub fn device(id: i64, env_id: i64, name: &str) -> Device {
    Device {
        id,
        env_id: Some(env_id),
        name: name.to_string(),
    }
}

pub fn sensor(id: i64, device_id: i64, unit: &str) -> Sensor {
    Sensor {
        id,
        device_id,
        unit: unit.to_string(),
    }
}

pub fn catalog() -> EntityCatalog {
    EntityCatalog::new()
        .register::<Env>()
        .register::<Device>()
        .register::<Sensor>()
}

pub fn refs() -> ReferencesRegistry {
    ReferencesRegistry::builder(&catalog())
        .add(Ref::one_to_many("envDevices", ("env", "id"), ("device", "envId")))
        .add(Ref::many_to_one("deviceEnv", ("device", "envId"), ("env", "id")))
        .add(Ref::one_to_many("deviceSensors", ("device", "id"), ("sensor", "deviceId")))
        .build()
        .expect("test refs are valid")
}

pub fn views() -> ViewRegistry {
    ViewRegistry::builder(&catalog(), &refs())
        .view(ViewMapping::new("envView", "env").many("devices", "envDevices", "deviceView"))
        .view(
            ViewMapping::new("deviceView", "device")
                .one("env", "deviceEnv", "envView")
                .many("sensors", "deviceSensors", "sensorView"),
        )
        .view(ViewMapping::new("sensorView", "sensor").one("device", "deviceSensors", "deviceView"))
        .build()
        .expect("test views are valid")
}
