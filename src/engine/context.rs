//! # Contexts
//!
//! A context is the materialized result of one filter signature: the exact
//! set of entities currently matching, maintained incrementally as
//! components are added, removed, modified, activated, or deactivated.
//!
//! ## Purpose
//! Systems never scan the entity table. Each system's filter resolves to a
//! context (shared between systems with identical signatures), and the
//! context keeps the matching set current on every entity mutation while
//! fanning component-level events out to the watchers attached to it.
//!
//! ## Sets
//! - The **active set** holds matching, active entities; this is what
//!   systems iterate.
//! - The **deactivated set** holds entities that would match but are
//!   currently inactive; deactivation transfers membership without
//!   forgetting it.
//! - A cached immutable **snapshot** of the active set is handed to systems
//!   and invalidated lazily on any set mutation.
//!
//! ## Match transitions
//! On a component change the context compares the entity's tracked state
//! with the filter verdict:
//!
//! - was matching, no longer matching → the fanned watchers record
//!   *removed* (the system sees the last view) and the entity leaves both
//!   sets;
//! - was not matching, now matching → the entity enters the active (or
//!   deactivated) set and the fanned watchers replay *added* for every
//!   component id present on it, so reactive systems see a uniform stream
//!   regardless of whether the match pre-existed;
//! - steadily matching → the event routes to the watcher of the triggering
//!   component id alone.

use std::collections::BTreeSet;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::engine::entity::Entity;
use crate::engine::filter::Filter;
use crate::engine::types::{ComponentId, ContextId, EntityId, NotificationKind, WatcherId};
use crate::engine::watcher::ComponentWatcher;

/// Component-level change routed through a context.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ComponentChange {
    /// The component appeared on the entity.
    Added,
    /// The component disappeared from the entity.
    Removed,
    /// The component's value changed.
    Modified,
}

impl ComponentChange {
    fn kind(self) -> NotificationKind {
        match self {
            ComponentChange::Added => NotificationKind::Added,
            ComponentChange::Removed => NotificationKind::Removed,
            ComponentChange::Modified => NotificationKind::Modified,
        }
    }
}

/// Set of entities matching one filter signature.
pub struct Context {
    id: ContextId,
    filter: Filter,
    active: BTreeSet<EntityId>,
    deactivated: BTreeSet<EntityId>,
    snapshot: Option<Arc<[EntityId]>>,
    fan_out: FxHashMap<ComponentId, Vec<WatcherId>>,
}

impl Context {
    pub(crate) fn new(id: ContextId, filter: Filter) -> Self {
        Self {
            id,
            filter,
            active: BTreeSet::new(),
            deactivated: BTreeSet::new(),
            snapshot: None,
            fan_out: FxHashMap::default(),
        }
    }

    /// Canonical identifier of this context's filter signature.
    #[inline]
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// The resolved filter this context was built from.
    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Number of matching active entities.
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Returns `true` if no active entity matches.
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Returns `true` if `entity` is in the active set.
    pub fn contains(&self, entity: EntityId) -> bool {
        self.active.contains(&entity)
    }

    /// Returns `true` if the context tracks `entity`, active or not.
    pub fn tracks(&self, entity: EntityId) -> bool {
        self.active.contains(&entity) || self.deactivated.contains(&entity)
    }

    /// Immutable snapshot of the active set, cached until the next mutation.
    pub fn snapshot(&mut self) -> Arc<[EntityId]> {
        if let Some(snapshot) = &self.snapshot {
            return snapshot.clone();
        }
        let snapshot: Arc<[EntityId]> = self.active.iter().copied().collect();
        self.snapshot = Some(snapshot.clone());
        snapshot
    }

    pub(crate) fn attach_watcher(&mut self, component: ComponentId, watcher: WatcherId) {
        let fanned = self.fan_out.entry(component).or_default();
        if !fanned.contains(&watcher) {
            fanned.push(watcher);
        }
    }

    /// Introduces an entity to this context.
    ///
    /// If the entity currently matches it enters the active (or deactivated)
    /// set, and every fanned watcher whose component id is present on the
    /// entity replays one *added* notification.
    pub(crate) fn filter_entity(&mut self, entity: &Entity, watchers: &[ComponentWatcher]) {
        if entity.is_destroyed() || !self.filter.matches(entity) {
            return;
        }
        self.admit(entity, watchers);
    }

    /// Routes a component-level change, updating match state.
    pub(crate) fn handle_component_change(
        &mut self,
        entity: &Entity,
        component: ComponentId,
        change: ComponentChange,
        caused_by_destroy: bool,
        watchers: &[ComponentWatcher],
    ) {
        let was = self.tracks(entity.id());
        let now = !entity.is_destroyed() && self.filter.matches(entity);

        match (was, now) {
            (true, false) => {
                // The system sees the last view before the entity leaves.
                self.fan_present(entity, NotificationKind::Removed, caused_by_destroy, watchers);
                if change == ComponentChange::Removed && !entity.has(component) {
                    self.fan_one(component, entity.id(), NotificationKind::Removed, caused_by_destroy, watchers);
                }
                self.evict(entity.id());
            }
            (false, true) => {
                self.admit(entity, watchers);
            }
            (true, true) => {
                self.fan_one(component, entity.id(), change.kind(), caused_by_destroy, watchers);
            }
            (false, false) => {}
        }
    }

    /// Routes an activation flip for a tracked entity.
    ///
    /// Deactivation transfers the entity from the active to the deactivated
    /// set and records *disabled*; reactivation transfers it back and
    /// records *enabled*.
    pub(crate) fn handle_activation(
        &mut self,
        entity: &Entity,
        activated: bool,
        watchers: &[ComponentWatcher],
    ) {
        let id = entity.id();
        if activated {
            if self.deactivated.remove(&id) {
                self.active.insert(id);
                self.snapshot = None;
                self.fan_present(entity, NotificationKind::Enabled, false, watchers);
            }
        } else if self.active.remove(&id) {
            self.deactivated.insert(id);
            self.snapshot = None;
            self.fan_present(entity, NotificationKind::Disabled, false, watchers);
        }
    }

    /// Force-removes a tracked entity, recording *removed* in its fanned
    /// watchers. Used when an entity is destroyed while still matching.
    pub(crate) fn expel(
        &mut self,
        entity: &Entity,
        caused_by_destroy: bool,
        watchers: &[ComponentWatcher],
    ) {
        if !self.tracks(entity.id()) {
            return;
        }
        self.fan_present(entity, NotificationKind::Removed, caused_by_destroy, watchers);
        self.evict(entity.id());
    }

    fn admit(&mut self, entity: &Entity, watchers: &[ComponentWatcher]) {
        let id = entity.id();
        if entity.is_active() {
            if self.active.insert(id) {
                self.snapshot = None;
                self.fan_present(entity, NotificationKind::Added, false, watchers);
            }
        } else if self.deactivated.insert(id) {
            self.snapshot = None;
        }
    }

    fn evict(&mut self, id: EntityId) {
        if self.active.remove(&id) {
            self.snapshot = None;
        }
        self.deactivated.remove(&id);
    }

    /// Queues `kind` in every fanned watcher whose component id is present
    /// on the entity.
    fn fan_present(
        &self,
        entity: &Entity,
        kind: NotificationKind,
        caused_by_destroy: bool,
        watchers: &[ComponentWatcher],
    ) {
        for (&component, fanned) in &self.fan_out {
            if !entity.has(component) {
                continue;
            }
            for &watcher in fanned {
                watchers[watcher as usize].queue(kind, entity.id(), caused_by_destroy);
            }
        }
    }

    fn fan_one(
        &self,
        component: ComponentId,
        entity: EntityId,
        kind: NotificationKind,
        caused_by_destroy: bool,
        watchers: &[ComponentWatcher],
    ) {
        if let Some(fanned) = self.fan_out.get(&component) {
            for &watcher in fanned {
                watchers[watcher as usize].queue(kind, entity, caused_by_destroy);
            }
        }
    }
}
