//! Optimistic concurrency through the typed facade.

mod common;

use common::Env;
use rowkit::dao::next_modified_at;
use rowkit::prelude::*;

#[tokio::test]
async fn stale_write_is_rejected() {
    let crud = Crud::new(MemoryDao::new()).acting_as("ann");
    let created = crud.create(&common::env(1, "Hurray")).await.unwrap();
    assert_eq!(created.modified_by.as_deref(), Some("ann"));

    // Two readers hold the same version
    let mut alice = created.clone();
    let mut bob = created.clone();

    alice.name = "alice".into();
    let saved = crud.update(&alice).await.unwrap();
    assert!(saved.modified_at > created.modified_at);

    bob.name = "bob".into();
    match crud.update(&bob).await {
        Err(DaoError::ConcurrentModification { entity, id }) => {
            assert_eq!(entity, "env");
            assert_eq!(id, Value::Int(1));
        }
        other => panic!("expected ConcurrentModification, got {:?}", other),
    }

    let stored: Env = crud.get(1).await.unwrap();
    assert_eq!(stored.name, "alice");
}

#[tokio::test]
async fn fresh_writes_strictly_increase_modified_at() {
    let crud = Crud::new(MemoryDao::new());
    let mut current = crud.create(&common::env(1, "v0")).await.unwrap();

    for i in 1..=10 {
        let mut next = current.clone();
        next.name = format!("v{}", i);
        let saved = crud.update(&next).await.unwrap();
        assert!(
            saved.modified_at > current.modified_at,
            "{:?} did not move past {:?}",
            saved.modified_at,
            current.modified_at
        );
        current = saved;
    }
}

#[tokio::test]
async fn stale_delete_is_rejected() {
    let crud = Crud::new(MemoryDao::new());
    let created = crud.create(&common::env(1, "Hurray")).await.unwrap();
    let mut renamed = created.clone();
    renamed.name = "renamed".into();
    let saved = crud.update(&renamed).await.unwrap();

    assert!(matches!(
        crud.delete(&created).await,
        Err(DaoError::ConcurrentModification { .. })
    ));
    crud.delete(&saved).await.unwrap();
    assert!(crud.find::<Env>(1).await.unwrap().is_none());
}

#[tokio::test]
async fn unversioned_entities_report_not_found() {
    let crud = Crud::new(MemoryDao::new());
    let ghost = common::device(7, 1, "ghost");
    assert!(matches!(crud.update(&ghost).await, Err(DaoError::NotFound { .. })));
}

#[test]
fn clock_behind_stored_version() {
    use chrono::{Duration, TimeZone, Utc};

    let stored = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
    let now = stored - Duration::minutes(5);
    assert_eq!(next_modified_at(Some(stored), now), stored + Duration::milliseconds(1));
}
