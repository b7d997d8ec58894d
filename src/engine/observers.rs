//! # Entity Event Observers
//!
//! This module implements the world-owned observer registry that replaces
//! the original design's implicit event graph. Entities do not own their
//! subscribers; the registry maps entity ids to handler lists, and on entity
//! destruction the world detaches subscribers by id. No observer can keep a
//! dead entity alive.
//!
//! ## Dispatch discipline
//! The handler list for an entity is snapshotted (taken) before dispatch, so
//! a handler may request its own removal, and subscriptions added while a
//! dispatch is in flight only take effect for subsequent events.

use rustc_hash::FxHashMap;

use crate::engine::types::{ComponentId, EntityId, SubscriptionId};

/// Kind of an entity-level event.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum EntityEventKind {
    /// A component was added.
    Added,
    /// A component was removed.
    Removed,
    /// A component is about to be removed.
    BeforeRemoving,
    /// A component was replaced or mutated in place.
    Modified,
    /// A component is about to be replaced or mutated in place.
    BeforeModifying,
    /// A message was recorded on the entity.
    MessageSent,
    /// The entity became active.
    Activated,
    /// The entity became inactive.
    Deactivated,
}

impl EntityEventKind {
    #[inline]
    fn bit(self) -> u8 {
        match self {
            EntityEventKind::Added => 1 << 0,
            EntityEventKind::Removed => 1 << 1,
            EntityEventKind::BeforeRemoving => 1 << 2,
            EntityEventKind::Modified => 1 << 3,
            EntityEventKind::BeforeModifying => 1 << 4,
            EntityEventKind::MessageSent => 1 << 5,
            EntityEventKind::Activated => 1 << 6,
            EntityEventKind::Deactivated => 1 << 7,
        }
    }
}

/// An entity-level event delivered to observers.
#[derive(Clone, Copy, Debug)]
pub struct EntityEvent {
    /// Entity the event concerns.
    pub entity: EntityId,
    /// Event kind.
    pub kind: EntityEventKind,
    /// Component id the event concerns; `None` for activation events.
    pub component: Option<ComponentId>,
    /// The event was raised while destroying the entity.
    pub caused_by_destroy: bool,
}

/// Directive returned by an observer after handling an event.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ObserverAction {
    /// Keep the subscription.
    Keep,
    /// Remove the subscription.
    Unsubscribe,
}

type Handler = Box<dyn FnMut(&EntityEvent) -> ObserverAction + Send>;

struct ObserverEntry {
    id: SubscriptionId,
    mask: u8,
    handler: Handler,
}

/// World-owned registry of entity-event subscriptions.
#[derive(Default)]
pub struct Observers {
    next_id: SubscriptionId,
    by_entity: FxHashMap<EntityId, Vec<ObserverEntry>>,
    owner_of: FxHashMap<SubscriptionId, EntityId>,
}

impl Observers {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `handler` to the given event kinds on `entity`.
    ///
    /// Returns a [`SubscriptionId`] usable with [`Observers::unsubscribe`].
    /// The handler may also unsubscribe itself by returning
    /// [`ObserverAction::Unsubscribe`].
    pub fn subscribe(
        &mut self,
        entity: EntityId,
        kinds: &[EntityEventKind],
        handler: Handler,
    ) -> SubscriptionId {
        let id = self.next_id;
        self.next_id += 1;

        let mask = kinds.iter().fold(0u8, |m, k| m | k.bit());
        self.by_entity
            .entry(entity)
            .or_default()
            .push(ObserverEntry { id, mask, handler });
        self.owner_of.insert(id, entity);
        id
    }

    /// Removes a subscription. No-op for unknown or already-removed ids.
    pub fn unsubscribe(&mut self, subscription: SubscriptionId) {
        let Some(entity) = self.owner_of.remove(&subscription) else {
            return;
        };
        if let Some(entries) = self.by_entity.get_mut(&entity) {
            entries.retain(|e| e.id != subscription);
            if entries.is_empty() {
                self.by_entity.remove(&entity);
            }
        }
    }

    /// Removes every subscription attached to `entity`.
    pub fn detach_entity(&mut self, entity: EntityId) {
        if let Some(entries) = self.by_entity.remove(&entity) {
            for entry in entries {
                self.owner_of.remove(&entry.id);
            }
        }
    }

    /// Dispatches `event` to the matching subscribers of its entity.
    ///
    /// The handler list is taken out of the registry for the duration of the
    /// dispatch and merged back afterwards, so handlers observe a stable
    /// snapshot and may unsubscribe without invalidating the iteration.
    pub fn dispatch(&mut self, event: &EntityEvent) {
        let Some(mut entries) = self.by_entity.remove(&event.entity) else {
            return;
        };

        let bit = event.kind.bit();
        entries.retain_mut(|entry| {
            if entry.mask & bit == 0 {
                return true;
            }
            match (entry.handler)(event) {
                ObserverAction::Keep => true,
                ObserverAction::Unsubscribe => {
                    self.owner_of.remove(&entry.id);
                    false
                }
            }
        });

        if !entries.is_empty() {
            // Subscriptions created during dispatch land in a fresh list;
            // merge so both survive.
            match self.by_entity.entry(event.entity) {
                std::collections::hash_map::Entry::Occupied(mut slot) => {
                    let mut merged = entries;
                    merged.append(slot.get_mut());
                    *slot.get_mut() = merged;
                }
                std::collections::hash_map::Entry::Vacant(slot) => {
                    slot.insert(entries);
                }
            }
        }
    }
}
