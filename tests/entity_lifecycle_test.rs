// Entity mutation contract: add/remove round-trips, fail-fast invariants,
// replace semantics, activation idempotence, destroy ordering, observers.
//
// Run:
//   cargo test --test entity_lifecycle_test -- --nocapture

mod common;

use std::sync::{Arc, Mutex};

use common::*;
use reactive_ecs::{EntityEventKind, ObserverAction, WorldError};
use reactive_ecs::prelude::*;

fn bare_world() -> World {
    World::new(ComponentRegistry::new(), Vec::new()).unwrap()
}

#[test]
fn add_then_remove_round_trip() {
    let mut world = bare_world();
    let e = world.add_entity(Bundle::new()).unwrap();

    world.add_component(e, Health { points: 3 }).unwrap();
    assert!(world.has_component::<Health>(e));

    assert!(world.remove_component::<Health>(e).unwrap());
    assert!(!world.has_component::<Health>(e));

    // Removing again is a no-op, not an error.
    assert!(!world.remove_component::<Health>(e).unwrap());
}

#[test]
fn double_add_is_an_invariant_violation() {
    let mut world = bare_world();
    let e = world
        .add_entity(Bundle::new().with(Health { points: 3 }))
        .unwrap();
    let error = world.add_component(e, Health { points: 9 }).unwrap_err();
    assert!(matches!(
        error,
        WorldError::Entity(reactive_ecs::EntityError::DuplicateComponent { .. })
    ));
    // The stored value is untouched.
    assert_eq!(world.get_component::<Health>(e), Some(&Health { points: 3 }));
}

#[test]
fn destroyed_entities_fail_fast() {
    let mut world = bare_world();
    let e = world
        .add_entity(Bundle::new().with(Health { points: 3 }))
        .unwrap();
    world.remove_entity(e).unwrap();

    assert!(world.add_component(e, Burning).is_err());
    assert!(world.activate(e).is_err());
    assert!(world.send_message(e, Ping).is_err());
    assert!(world.remove_entity(e).is_err());
}

#[test]
fn destroy_removes_components_in_descending_id_order() {
    let mut world = bare_world();
    let e = world
        .add_entity(
            Bundle::new()
                .with(Position { x: 0.0, y: 0.0 })
                .with(Velocity { dx: 0.0, dy: 0.0 })
                .with(Health { points: 1 }),
        )
        .unwrap();

    let removed = Arc::new(Mutex::new(Vec::new()));
    let sink = removed.clone();
    world.subscribe(e, &[EntityEventKind::Removed], move |event| {
        sink.lock().unwrap().push((event.component, event.caused_by_destroy));
        ObserverAction::Keep
    });

    world.remove_entity(e).unwrap();

    let recorded = removed.lock().unwrap().clone();
    let ids: Vec<_> = recorded.iter().map(|(component, _)| component.unwrap()).collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    assert_eq!(ids, sorted);
    assert_eq!(ids.len(), 3);
    assert!(recorded.iter().all(|(_, caused_by_destroy)| *caused_by_destroy));
}

#[test]
fn activation_is_idempotent() {
    let mut world = bare_world();
    let e = world.add_entity(Bundle::new()).unwrap();

    let activations = Arc::new(Mutex::new(0usize));
    let counter = activations.clone();
    world.subscribe(e, &[EntityEventKind::Activated], move |_| {
        *counter.lock().unwrap() += 1;
        ObserverAction::Keep
    });

    world.deactivate(e).unwrap();
    world.activate(e).unwrap();
    world.activate(e).unwrap();
    assert_eq!(*activations.lock().unwrap(), 1);
}

#[test]
fn replace_updates_adds_and_preserves_marked_components() {
    let mut world = bare_world();
    let e = world
        .add_entity(
            Bundle::new()
                .with(Position { x: 0.0, y: 0.0 })
                .with(Shield)
                .with(Burning),
        )
        .unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    world.subscribe(
        e,
        &[
            EntityEventKind::Added,
            EntityEventKind::Modified,
            EntityEventKind::Removed,
        ],
        move |event| {
            sink.lock().unwrap().push(event.kind);
            ObserverAction::Keep
        },
    );

    world
        .replace(
            e,
            Bundle::new()
                .with(Position { x: 2.0, y: 0.0 })
                .with(Health { points: 4 }),
            false,
            false,
        )
        .unwrap();

    // Position changed, Health appeared, Burning left, Shield survived.
    assert_eq!(world.get_component::<Position>(e), Some(&Position { x: 2.0, y: 0.0 }));
    assert_eq!(world.get_component::<Health>(e), Some(&Health { points: 4 }));
    assert!(world.has_component::<Shield>(e));
    assert!(!world.has_component::<Burning>(e));

    let recorded = events.lock().unwrap().clone();
    assert_eq!(recorded.iter().filter(|k| **k == EntityEventKind::Modified).count(), 1);
    assert_eq!(recorded.iter().filter(|k| **k == EntityEventKind::Added).count(), 1);
    assert_eq!(recorded.iter().filter(|k| **k == EntityEventKind::Removed).count(), 1);
}

#[test]
fn replace_skips_equal_values_and_honors_force_keep() {
    let mut world = bare_world();
    let e = world
        .add_entity(
            Bundle::new()
                .with(Position { x: 1.0, y: 1.0 })
                .with(Burning),
        )
        .unwrap();

    let modifications = Arc::new(Mutex::new(0usize));
    let counter = modifications.clone();
    world.subscribe(e, &[EntityEventKind::Modified], move |_| {
        *counter.lock().unwrap() += 1;
        ObserverAction::Keep
    });

    // Identical value, force_keep set: nothing is removed, nothing fires.
    world
        .replace(e, Bundle::new().with(Position { x: 1.0, y: 1.0 }), false, true)
        .unwrap();
    assert_eq!(*modifications.lock().unwrap(), 0);
    assert!(world.has_component::<Burning>(e));
}

#[test]
fn modify_raises_before_and_after_events() {
    let mut world = bare_world();
    let e = world
        .add_entity(Bundle::new().with(Health { points: 10 }))
        .unwrap();

    let order = Arc::new(Mutex::new(Vec::new()));
    let sink = order.clone();
    world.subscribe(
        e,
        &[EntityEventKind::BeforeModifying, EntityEventKind::Modified],
        move |event| {
            sink.lock().unwrap().push(event.kind);
            ObserverAction::Keep
        },
    );

    assert!(world.modify::<Health>(e, |h| h.points -= 4).unwrap());
    assert_eq!(world.get_component::<Health>(e), Some(&Health { points: 6 }));
    assert_eq!(
        order.lock().unwrap().clone(),
        vec![EntityEventKind::BeforeModifying, EntityEventKind::Modified]
    );
}

#[test]
fn messages_clear_at_frame_end() {
    let mut world = bare_world();
    let e = world.add_entity(Bundle::new()).unwrap();
    world.send_message(e, Damage { amount: 1 }).unwrap();
    world.send_message(e, Damage { amount: 2 }).unwrap();

    let damage_id = world.component_id::<Damage>().unwrap();
    {
        let entity = world.get_entity(e).unwrap();
        assert!(entity.has_message(damage_id));
        let amounts: Vec<i32> = entity.messages_of::<Damage>(damage_id).map(|d| d.amount).collect();
        assert_eq!(amounts, vec![1, 2]);
    }

    world.update(0);
    assert!(!world.get_entity(e).unwrap().has_message(damage_id));
}

#[test]
fn entity_ids_are_never_reused() {
    let mut world = bare_world();
    let first = world.add_entity(Bundle::new()).unwrap();
    world.remove_entity(first).unwrap();
    world.update(0);
    let second = world.add_entity(Bundle::new()).unwrap();
    assert_ne!(first, second);
    assert!(world.get_entity(first).is_none());
}
