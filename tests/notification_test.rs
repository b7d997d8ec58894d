// Reactive notification batching: per-frame deduplication, added/removed
// cancellation, kind ordering, and destroy interactions.
//
// Run:
//   cargo test --test notification_test -- --nocapture

mod common;

use common::*;
use reactive_ecs::prelude::*;

fn burn_world(log: EventLog) -> World {
    let descriptor = SystemDescriptor::of::<WatchRecorder>()
        .filter(FilterSpec::all_of(Access::Write).with::<Health>())
        .watch::<Health>();
    World::new(
        ComponentRegistry::new(),
        vec![SystemRegistration::new(descriptor, WatchRecorder { log })],
    )
    .unwrap()
}

#[test]
fn added_then_removed_in_one_frame_cancels() {
    let log = event_log();
    let mut world = burn_world(log.clone());

    let e = world
        .add_entity(Bundle::new().with(Health { points: 5 }))
        .unwrap();
    world.remove_component::<Health>(e).unwrap();

    world.update(0);
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn destroy_while_pending_added_delivers_only_removed() {
    let log = event_log();
    let mut world = burn_world(log.clone());

    let e = world
        .add_entity(Bundle::new().with(Health { points: 5 }))
        .unwrap();
    world.remove_entity(e).unwrap();

    world.update(0);
    let recorded = log.lock().unwrap().clone();
    assert_eq!(recorded, vec![(NotificationKind::Removed, e)]);
}

#[test]
fn added_entities_deduplicate_and_keep_insertion_order() {
    let log = event_log();
    let mut world = burn_world(log.clone());

    let e1 = world
        .add_entity(Bundle::new().with(Health { points: 1 }))
        .unwrap();
    let e2 = world
        .add_entity(Bundle::new().with(Health { points: 2 }))
        .unwrap();
    // Touch e1 again inside the same frame; the added bucket keeps one
    // entry and the original order.
    world.modify::<Health>(e1, |h| h.points += 1).unwrap();

    world.update(0);
    let recorded = log.lock().unwrap().clone();
    assert_eq!(
        recorded,
        vec![
            (NotificationKind::Added, e1),
            (NotificationKind::Added, e2),
            (NotificationKind::Modified, e1),
        ]
    );
}

#[test]
fn kinds_drain_in_canonical_order() {
    let log = event_log();
    let mut world = burn_world(log.clone());

    let steady = world
        .add_entity(Bundle::new().with(Health { points: 1 }))
        .unwrap();
    world.update(0);
    log.lock().unwrap().clear();

    // One frame with a removal first, then a modification, then an
    // addition: the drain still reports added, modified, removed.
    let leaving = world
        .add_entity(Bundle::new().with(Health { points: 2 }))
        .unwrap();
    world.update(0);
    log.lock().unwrap().clear();

    world.remove_component::<Health>(leaving).unwrap();
    world.modify::<Health>(steady, |h| h.points += 1).unwrap();
    let arriving = world
        .add_entity(Bundle::new().with(Health { points: 3 }))
        .unwrap();

    world.update(0);
    let recorded = log.lock().unwrap().clone();
    assert_eq!(
        recorded,
        vec![
            (NotificationKind::Added, arriving),
            (NotificationKind::Modified, steady),
            (NotificationKind::Removed, leaving),
        ]
    );
}

#[test]
fn deactivation_erases_added_but_keeps_modified() {
    let log = event_log();
    let mut world = burn_world(log.clone());

    let e = world
        .add_entity(Bundle::new().with(Health { points: 5 }))
        .unwrap();
    world.modify::<Health>(e, |h| h.points -= 1).unwrap();
    world.deactivate(e).unwrap();

    world.update(0);
    let recorded = log.lock().unwrap().clone();
    // The *added* entry was erased and no *disabled* recorded in its
    // place; the pending *modified* deliberately survives.
    assert_eq!(recorded, vec![(NotificationKind::Modified, e)]);
}

#[test]
fn reactivation_records_enabled() {
    let log = event_log();
    let mut world = burn_world(log.clone());

    let e = world
        .add_entity(Bundle::new().with(Health { points: 5 }))
        .unwrap();
    world.update(0);
    log.lock().unwrap().clear();

    world.deactivate(e).unwrap();
    world.activate(e).unwrap();
    world.update(0);
    let recorded = log.lock().unwrap().clone();
    assert_eq!(
        recorded,
        vec![(NotificationKind::Enabled, e), (NotificationKind::Disabled, e)]
    );
}

#[test]
fn notifications_do_not_replay_across_frames() {
    let log = event_log();
    let mut world = burn_world(log.clone());

    world
        .add_entity(Bundle::new().with(Health { points: 5 }))
        .unwrap();
    world.update(0);
    assert_eq!(log.lock().unwrap().len(), 1);

    world.update(0);
    world.update(0);
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[test]
fn messages_reach_consuming_systems_in_send_order() {
    let log = message_log();
    let descriptor = SystemDescriptor::of::<MessageRecorder>()
        .filter(FilterSpec::all_of(Access::Read).with::<Health>())
        .consume::<Damage>();
    let mut world = World::new(
        ComponentRegistry::new(),
        vec![SystemRegistration::new(descriptor, MessageRecorder { log: log.clone() })],
    )
    .unwrap();

    let e1 = world
        .add_entity(Bundle::new().with(Health { points: 5 }))
        .unwrap();
    let e2 = world
        .add_entity(Bundle::new().with(Health { points: 5 }))
        .unwrap();
    world.send_message(e2, Damage { amount: 3 }).unwrap();
    world.send_message(e1, Damage { amount: 1 }).unwrap();
    world.send_message(e2, Damage { amount: 2 }).unwrap();

    let damage_id = world.component_id::<Damage>().unwrap();
    world.update(0);
    let recorded = log.lock().unwrap().clone();
    assert_eq!(recorded, vec![(e2, damage_id), (e1, damage_id), (e2, damage_id)]);

    // Messages never outlive their frame.
    assert!(!world.get_entity(e1).unwrap().has_message(damage_id));
    log.lock().unwrap().clear();
    world.update(0);
    assert!(log.lock().unwrap().is_empty());
}
