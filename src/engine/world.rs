//! # World
//!
//! The world owns everything: the entity table, the component registry, the
//! contexts and watchers, the observer registry, the system scheduler, the
//! message bus, and the deferred-destruction queue. It drives the frame
//! pipeline and routes every entity mutation to the structures that need to
//! see it.
//!
//! ## Frame pipeline
//!
//! One call to [`World::update`] runs one frame:
//!
//! 1. Early-start and start systems, each exactly once over the world's
//!    life.
//! 2. Fixed-update systems, zero or more times from the fixed-step
//!    accumulator.
//! 3. Update systems, then the state-machine tick, then late-update and
//!    render systems.
//! 4. The reactive drain: watchers with pending notifications pop their
//!    batches (registration order), each batch reaching its subscribing
//!    reactive systems in kind order; then frame messages reach their
//!    consuming systems in send order.
//! 5. End of frame: messages clear, deferred destructions reclaim, the
//!    frame counter advances.
//!
//! ## Concurrency
//!
//! The world is single-threaded cooperative. All public mutation happens on
//! the owning thread; the one cross-thread-legal entry point is watcher
//! enqueue (see [`crate::engine::watcher`]). Destroyed entities remain
//! addressable until the end of the frame so queued *removed* notifications
//! can still resolve their ids.

use std::any::TypeId;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::smallvec;

use crate::diagnostics::timing::{NoopSink, TimingSink};
use crate::engine::commands::{Command, CommandBuffer};
use crate::engine::component::{Bundle, Component, ErasedComponent};
use crate::engine::context::{ComponentChange, Context};
use crate::engine::entity::Entity;
use crate::engine::error::{ConfigError, EntityError, WorldError, WorldResult};
use crate::engine::filter::{Filter, FilterClause};
use crate::engine::interaction::Interactive;
use crate::engine::observers::{EntityEvent, EntityEventKind, ObserverAction, Observers};
use crate::engine::registry::ComponentRegistry;
use crate::engine::scheduler::{Scheduler, SystemEntry};
use crate::engine::state_machine::{RoutineContext, StateMachine, WaitCache};
use crate::engine::systems::{System, SystemContext, SystemRegistration};
use crate::engine::types::{
    Access, ClauseKind, ComponentId, ContextId, EntityId, Frame, NotificationKind, Phase,
    SubscriptionId, SystemId, WatcherId, INTERACTIVE_COMPONENT_ID, STATE_MACHINE_COMPONENT_ID,
};
use crate::engine::watcher::{ComponentWatcher, PendingWork};

/// Host-tunable world parameters.
#[derive(Clone, Copy, Debug)]
pub struct WorldConfig {
    /// Length of one fixed-update step, in milliseconds.
    pub fixed_step_ms: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self { fixed_step_ms: 16 }
    }
}

/// Owner of entities, contexts, watchers, and the frame pipeline.
pub struct World {
    registry: ComponentRegistry,
    entities: FxHashMap<EntityId, Entity>,
    next_entity: u64,
    contexts: Vec<Context>,
    context_index: FxHashMap<ContextId, usize>,
    watchers: Vec<ComponentWatcher>,
    pending_work: PendingWork,
    scheduler: Scheduler,
    observers: Observers,
    paused: bool,
    frame: Frame,
    clock_ms: u64,
    fixed_accumulator_ms: u64,
    config: WorldConfig,
    frame_messages: Vec<(EntityId, ComponentId)>,
    message_waiters: FxHashMap<(EntityId, ComponentId), Vec<EntityId>>,
    deferred_destruction: BTreeSet<EntityId>,
    wait_cache: WaitCache,
    timing: Arc<dyn TimingSink>,
    early_started: bool,
    started: bool,
    exited: bool,
    sm_context: ContextId,
}

impl World {
    /// Builds a world from a registry and an ordered system list.
    ///
    /// ## Errors
    /// Fails with a configuration error on duplicate system types or
    /// `requires` constraints that are missing or out of order; a required
    /// system must appear strictly earlier in the list than its dependent.
    pub fn new(registry: ComponentRegistry, systems: Vec<SystemRegistration>) -> WorldResult<Self> {
        Self::with_config(registry, systems, WorldConfig::default())
    }

    /// Builds a world with explicit configuration.
    pub fn with_config(
        mut registry: ComponentRegistry,
        registrations: Vec<SystemRegistration>,
        config: WorldConfig,
    ) -> WorldResult<Self> {
        let mut contexts: Vec<Context> = Vec::new();
        let mut context_index: FxHashMap<ContextId, usize> = FxHashMap::default();
        let mut watchers: Vec<ComponentWatcher> = Vec::new();
        let mut watcher_index: FxHashMap<(ContextId, ComponentId), WatcherId> =
            FxHashMap::default();
        let pending_work = PendingWork::default();
        let mut scheduler = Scheduler::new();

        // Configuration validation happens up front, before any wiring: a
        // required system must appear strictly earlier than its dependent.
        let mut positions: FxHashMap<TypeId, usize> = FxHashMap::default();
        for (index, registration) in registrations.iter().enumerate() {
            let descriptor = &registration.descriptor;
            if positions.insert(descriptor.type_id, index).is_some() {
                return Err(ConfigError::DuplicateSystem { system: descriptor.name }.into());
            }
        }
        for (index, registration) in registrations.iter().enumerate() {
            let descriptor = &registration.descriptor;
            for (required, required_name) in &descriptor.requires {
                match positions.get(required) {
                    None => {
                        return Err(ConfigError::MissingRequirement {
                            system: descriptor.name,
                            requires: required_name,
                        }
                        .into())
                    }
                    Some(&position) if position >= index => {
                        return Err(ConfigError::RequirementOutOfOrder {
                            system: descriptor.name,
                            requires: required_name,
                        }
                        .into())
                    }
                    Some(_) => {}
                }
            }
        }

        for (index, registration) in registrations.into_iter().enumerate() {
            let SystemRegistration { descriptor, system } = registration;

            let filter = Filter::from_specs(&descriptor.filters, &mut registry)?;
            let context_id = filter.context_id();
            let context_pos = match context_index.get(&context_id) {
                Some(&position) => position,
                None => {
                    contexts.push(Context::new(context_id, filter));
                    context_index.insert(context_id, contexts.len() - 1);
                    contexts.len() - 1
                }
            };

            for register in &descriptor.watch {
                let component = register(&mut registry)?;
                let watcher_id = match watcher_index.get(&(context_id, component)) {
                    Some(&watcher_id) => watcher_id,
                    None => {
                        let watcher_id = watchers.len() as WatcherId;
                        watchers.push(ComponentWatcher::new(
                            watcher_id,
                            context_id,
                            component,
                            pending_work.clone(),
                        ));
                        watcher_index.insert((context_id, component), watcher_id);
                        contexts[context_pos].attach_watcher(component, watcher_id);
                        watcher_id
                    }
                };
                watchers[watcher_id as usize].subscribe_system(index);
            }

            let mut messages = Vec::with_capacity(descriptor.messages.len());
            for register in &descriptor.messages {
                messages.push(register(&mut registry)?);
            }

            scheduler.push(
                SystemEntry {
                    system: Some(system),
                    name: descriptor.name,
                    type_id: descriptor.type_id,
                    id: index as SystemId,
                    context: context_id,
                    pause: descriptor.pause,
                    enabled: true,
                    messages,
                },
                &descriptor.phases,
            );
        }

        // Built-in context driving state machines during the update phase.
        let sm_filter = Filter::from_clauses(vec![FilterClause {
            kind: ClauseKind::AllOf,
            access: Access::Write,
            components: smallvec![STATE_MACHINE_COMPONENT_ID],
        }]);
        let sm_context = sm_filter.context_id();
        if !context_index.contains_key(&sm_context) {
            contexts.push(Context::new(sm_context, sm_filter));
            context_index.insert(sm_context, contexts.len() - 1);
        }

        tracing::debug!(
            systems = scheduler.len(),
            contexts = contexts.len(),
            watchers = watchers.len(),
            "world constructed"
        );

        Ok(Self {
            registry,
            entities: FxHashMap::default(),
            next_entity: 0,
            contexts,
            context_index,
            watchers,
            pending_work,
            scheduler,
            observers: Observers::new(),
            paused: false,
            frame: 0,
            clock_ms: 0,
            fixed_accumulator_ms: 0,
            config,
            frame_messages: Vec::new(),
            message_waiters: FxHashMap::default(),
            deferred_destruction: BTreeSet::new(),
            wait_cache: WaitCache::new(),
            timing: Arc::new(NoopSink),
            early_started: false,
            started: false,
            exited: false,
            sm_context,
        })
    }

    // ── entity surface ──────────────────────────────────────────────────

    /// Creates an entity carrying the bundled components.
    pub fn add_entity(&mut self, bundle: Bundle) -> WorldResult<EntityId> {
        let id = EntityId(self.next_entity);
        self.next_entity += 1;

        let mut entity = Entity::new(id);
        for entry in bundle.entries {
            let component = (entry.register)(&mut self.registry)?;
            self.warn_unique(component, id);
            entity.insert(component, entry.value)?;
        }
        self.entities.insert(id, entity);

        if let Some(entity) = self.entities.get(&id) {
            for context in &mut self.contexts {
                context.filter_entity(entity, &self.watchers);
            }
        }
        Ok(id)
    }

    /// Destroys an entity.
    ///
    /// Fires *before-removing* and *removed* for each component in
    /// descending registered-id order with `caused_by_destroy` set, then
    /// detaches observers. Reclamation is immediate unless a watcher still
    /// references the entity, in which case it is deferred to end of frame.
    pub fn remove_entity(&mut self, id: EntityId) -> WorldResult<()> {
        {
            let entity = self
                .entities
                .get_mut(&id)
                .ok_or(EntityError::Unknown { entity: id })?;
            if entity.is_destroyed() {
                return Err(EntityError::Destroyed { entity: id }.into());
            }
            entity.mark_destroyed();
        }

        let components = self
            .entities
            .get(&id)
            .map(|e| e.component_ids_descending())
            .unwrap_or_default();
        for component in components {
            self.observers.dispatch(&EntityEvent {
                entity: id,
                kind: EntityEventKind::BeforeRemoving,
                component: Some(component),
                caused_by_destroy: true,
            });
            let removed = self.entities.get_mut(&id).and_then(|e| e.take(component));
            self.release_state_machine(id, component, removed);
            self.observers.dispatch(&EntityEvent {
                entity: id,
                kind: EntityEventKind::Removed,
                component: Some(component),
                caused_by_destroy: true,
            });
            self.route_component_change(id, component, ComponentChange::Removed, true);
        }

        // Contexts that still track the entity (a filter can match an empty
        // entity) see the removal now.
        if let Some(entity) = self.entities.get(&id) {
            for context in &mut self.contexts {
                context.expel(entity, true, &self.watchers);
            }
        }

        self.observers.detach_entity(id);
        self.message_waiters.retain(|(target, _), owners| {
            if *target == id {
                return false;
            }
            owners.retain(|owner| *owner != id);
            !owners.is_empty()
        });

        if self.watchers.iter().any(|w| w.references(id)) {
            self.deferred_destruction.insert(id);
        } else {
            self.entities.remove(&id);
        }
        Ok(())
    }

    /// Returns the entity for `id`. Destroyed entities remain addressable
    /// until the end of the frame they were destroyed in.
    pub fn get_entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Number of live (not destroyed) entities.
    pub fn entity_count(&self) -> usize {
        self.entities.values().filter(|e| !e.is_destroyed()).count()
    }

    /// Adds a component to an entity.
    ///
    /// ## Errors
    /// Fails fast on unknown or destroyed entities and on double-add of the
    /// same component id.
    pub fn add_component<T: Component>(&mut self, id: EntityId, value: T) -> WorldResult<()> {
        let component = self.registry.id_of::<T>()?;
        self.add_component_erased(id, component, Box::new(value))
    }

    /// Removes component type `T` from an entity. Returns `false` if the
    /// component was not present.
    pub fn remove_component<T: Component>(&mut self, id: EntityId) -> WorldResult<bool> {
        let Some(component) = self.registry.lookup::<T>() else {
            return Ok(false);
        };
        self.remove_component_by_id(id, component)
    }

    /// Removes the component stored under `component`. Returns `false` if
    /// the component was not present.
    pub fn remove_component_by_id(
        &mut self,
        id: EntityId,
        component: ComponentId,
    ) -> WorldResult<bool> {
        {
            let entity = self
                .entities
                .get(&id)
                .ok_or(EntityError::Unknown { entity: id })?;
            if entity.is_destroyed() {
                return Err(EntityError::Destroyed { entity: id }.into());
            }
            if !entity.has(component) {
                return Ok(false);
            }
        }

        self.observers.dispatch(&EntityEvent {
            entity: id,
            kind: EntityEventKind::BeforeRemoving,
            component: Some(component),
            caused_by_destroy: false,
        });
        let removed = self.entities.get_mut(&id).and_then(|e| e.take(component));
        self.release_state_machine(id, component, removed);
        self.observers.dispatch(&EntityEvent {
            entity: id,
            kind: EntityEventKind::Removed,
            component: Some(component),
            caused_by_destroy: false,
        });
        self.route_component_change(id, component, ComponentChange::Removed, false);
        Ok(true)
    }

    /// Bulk-replaces an entity's components.
    ///
    /// Components present on the entity but absent from the bundle are
    /// removed, unless their type bears the keep-on-replace marker or
    /// `force_keep` is set. Supplied components replace existing values
    /// (raising *modified* unless the stored value reports equality) or are
    /// added (raising *added*).
    pub fn replace(
        &mut self,
        id: EntityId,
        bundle: Bundle,
        caused_by_destroy: bool,
        force_keep: bool,
    ) -> WorldResult<()> {
        let mut supplied: Vec<(ComponentId, Box<dyn ErasedComponent>)> =
            Vec::with_capacity(bundle.entries.len());
        for entry in bundle.entries {
            let component = (entry.register)(&mut self.registry)?;
            supplied.push((component, entry.value));
        }

        {
            let entity = self
                .entities
                .get(&id)
                .ok_or(EntityError::Unknown { entity: id })?;
            if entity.is_destroyed() {
                return Err(EntityError::Destroyed { entity: id }.into());
            }
        }

        if !force_keep {
            let current: Vec<ComponentId> = self
                .entities
                .get(&id)
                .map(|e| e.component_ids().collect())
                .unwrap_or_default();
            for component in current {
                if supplied.iter().any(|(c, _)| *c == component) {
                    continue;
                }
                if self
                    .registry
                    .descriptor(component)
                    .is_some_and(|d| d.keep_on_replace)
                {
                    continue;
                }
                self.remove_component_by_id(id, component)?;
            }
        }

        for (component, value) in supplied {
            let present = self.entities.get(&id).is_some_and(|e| e.has(component));
            if present {
                let unchanged = self
                    .entities
                    .get(&id)
                    .and_then(|e| e.get(component))
                    .is_some_and(|existing| existing.same_value(value.as_ref()));
                if unchanged {
                    continue;
                }
                self.observers.dispatch(&EntityEvent {
                    entity: id,
                    kind: EntityEventKind::BeforeModifying,
                    component: Some(component),
                    caused_by_destroy,
                });
                if let Some(entity) = self.entities.get_mut(&id) {
                    entity.overwrite(component, value);
                }
                self.observers.dispatch(&EntityEvent {
                    entity: id,
                    kind: EntityEventKind::Modified,
                    component: Some(component),
                    caused_by_destroy,
                });
                self.route_component_change(id, component, ComponentChange::Modified, caused_by_destroy);
            } else {
                self.warn_unique(component, id);
                let entity = self
                    .entities
                    .get_mut(&id)
                    .ok_or(EntityError::Unknown { entity: id })?;
                entity.insert(component, value)?;
                self.observers.dispatch(&EntityEvent {
                    entity: id,
                    kind: EntityEventKind::Added,
                    component: Some(component),
                    caused_by_destroy: false,
                });
                self.route_component_change(id, component, ComponentChange::Added, false);
            }
        }
        Ok(())
    }

    /// Mutates component `T` in place, raising *before-modifying* and
    /// *modified*. Returns `false` if the component was not present.
    pub fn modify<T: Component>(
        &mut self,
        id: EntityId,
        mutate: impl FnOnce(&mut T),
    ) -> WorldResult<bool> {
        let Some(component) = self.registry.lookup::<T>() else {
            return Ok(false);
        };
        {
            let entity = self
                .entities
                .get(&id)
                .ok_or(EntityError::Unknown { entity: id })?;
            if entity.is_destroyed() {
                return Err(EntityError::Destroyed { entity: id }.into());
            }
            if !entity.has(component) {
                return Ok(false);
            }
        }

        self.observers.dispatch(&EntityEvent {
            entity: id,
            kind: EntityEventKind::BeforeModifying,
            component: Some(component),
            caused_by_destroy: false,
        });
        if let Some(value) = self
            .entities
            .get_mut(&id)
            .and_then(|e| e.get_as_mut::<T>(component))
        {
            mutate(value);
        }
        self.observers.dispatch(&EntityEvent {
            entity: id,
            kind: EntityEventKind::Modified,
            component: Some(component),
            caused_by_destroy: false,
        });
        self.route_component_change(id, component, ComponentChange::Modified, false);
        Ok(true)
    }

    /// Returns component `T` of an entity, if present.
    pub fn get_component<T: Component>(&self, id: EntityId) -> Option<&T> {
        let component = self.registry.lookup::<T>()?;
        self.entities.get(&id)?.get_as::<T>(component)
    }

    /// Returns `true` if the entity carries component `T`.
    pub fn has_component<T: Component>(&self, id: EntityId) -> bool {
        self.get_component::<T>(id).is_some()
    }

    /// Activates an entity. Re-entrant calls are no-ops.
    pub fn activate(&mut self, id: EntityId) -> WorldResult<()> {
        self.set_entity_active(id, true)
    }

    /// Deactivates an entity. Re-entrant calls are no-ops.
    pub fn deactivate(&mut self, id: EntityId) -> WorldResult<()> {
        self.set_entity_active(id, false)
    }

    /// Records a message on `target` for the current frame.
    ///
    /// The message is observable by consuming reactive systems at the
    /// reactive drain and satisfies any state-machine wait registered for
    /// `(target, message type)` the moment it is sent.
    pub fn send_message<M: Component>(&mut self, target: EntityId, message: M) -> WorldResult<()> {
        let component = self.registry.id_of::<M>()?;
        self.send_message_erased(target, component, Box::new(message))
    }

    /// Applies the interactive component of `target`, synchronously, on
    /// behalf of `interactor`.
    pub fn interact(&mut self, target: EntityId, interactor: EntityId) -> WorldResult<()> {
        let effect = {
            let entity = self
                .entities
                .get(&target)
                .ok_or(EntityError::Unknown { entity: target })?;
            let interactive = entity
                .get_as::<Interactive>(INTERACTIVE_COMPONENT_ID)
                .ok_or(WorldError::NotInteractive { entity: target })?;
            interactive.effect()
        };
        effect.interact(self, interactor, Some(target));
        Ok(())
    }

    /// Subscribes to entity events. The handler may unsubscribe itself by
    /// returning [`ObserverAction::Unsubscribe`].
    pub fn subscribe(
        &mut self,
        entity: EntityId,
        kinds: &[EntityEventKind],
        handler: impl FnMut(&EntityEvent) -> ObserverAction + Send + 'static,
    ) -> SubscriptionId {
        self.observers.subscribe(entity, kinds, Box::new(handler))
    }

    /// Removes an entity-event subscription.
    pub fn unsubscribe(&mut self, subscription: SubscriptionId) {
        self.observers.unsubscribe(subscription);
    }

    // ── system surface ──────────────────────────────────────────────────

    /// Re-enables a previously deactivated system.
    pub fn activate_system<S: System + 'static>(&mut self) -> WorldResult<()> {
        self.set_system_enabled::<S>(true)
    }

    /// Disables a system; it is skipped in every phase until reactivated.
    pub fn deactivate_system<S: System + 'static>(&mut self) -> WorldResult<()> {
        self.set_system_enabled::<S>(false)
    }

    /// Pauses the world; see [`crate::engine::types::PauseMode`].
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resumes a paused world.
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Returns `true` while the world is paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Installs the timing sink receiving per-system execution records.
    pub fn set_timing_sink(&mut self, sink: Arc<dyn TimingSink>) {
        self.timing = sink;
    }

    /// Snapshot of the entities matching system `S`'s filter.
    pub fn system_entities<S: System + 'static>(&mut self) -> WorldResult<Arc<[EntityId]>> {
        let index = self
            .scheduler
            .index_of(TypeId::of::<S>())
            .ok_or(WorldError::UnknownSystem { system: std::any::type_name::<S>() })?;
        let context = self.scheduler.entry(index).context;
        Ok(self.context_snapshot(context))
    }

    // ── frame pipeline ──────────────────────────────────────────────────

    /// Runs early-start systems. Idempotent; also invoked lazily by
    /// [`World::update`].
    pub fn early_start(&mut self) {
        if self.early_started {
            return;
        }
        self.early_started = true;
        self.run_phase(Phase::EarlyStart, 0);
    }

    /// Runs start systems. Idempotent; also invoked lazily by
    /// [`World::update`].
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        self.run_phase(Phase::Start, 0);
    }

    /// Runs one frame.
    pub fn update(&mut self, elapsed_ms: u64) {
        self.early_start();
        self.start();

        self.clock_ms += elapsed_ms;
        self.fixed_accumulator_ms += elapsed_ms;
        let step = self.config.fixed_step_ms.max(1);
        while self.fixed_accumulator_ms >= step {
            self.fixed_accumulator_ms -= step;
            self.run_phase(Phase::FixedUpdate, step);
        }

        self.run_phase(Phase::Update, elapsed_ms);
        if !self.paused {
            self.tick_state_machines(elapsed_ms);
        }
        self.run_phase(Phase::LateUpdate, elapsed_ms);
        self.run_phase(Phase::Render, elapsed_ms);
        self.reactive_drain(elapsed_ms);
        self.end_frame();
    }

    /// Runs the fixed-update systems once, outside the accumulator. Hosts
    /// driving phases manually call this; [`World::update`] steps the
    /// accumulator itself.
    pub fn fixed_update(&mut self) {
        let step = self.config.fixed_step_ms.max(1);
        self.run_phase(Phase::FixedUpdate, step);
    }

    /// Runs the late-update systems once, outside the frame driver.
    pub fn late_update(&mut self) {
        self.run_phase(Phase::LateUpdate, 0);
    }

    /// Runs every system's exit handler. Idempotent.
    pub fn exit(&mut self) {
        if self.exited {
            return;
        }
        self.exited = true;
        for index in 0..self.scheduler.len() {
            self.run_system(index, Phase::Update, 0, |system, cx| system.exit(cx));
        }
    }

    /// The current frame counter.
    pub fn frame(&self) -> Frame {
        self.frame
    }

    /// Total simulated milliseconds fed through [`World::update`].
    pub fn clock_ms(&self) -> u64 {
        self.clock_ms
    }

    /// The component registry.
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Resolves (assigning if needed) the component id of `T`.
    pub fn component_id<T: Component>(&mut self) -> WorldResult<ComponentId> {
        Ok(self.registry.id_of::<T>()?)
    }

    // ── internals ───────────────────────────────────────────────────────

    fn add_component_erased(
        &mut self,
        id: EntityId,
        component: ComponentId,
        value: Box<dyn ErasedComponent>,
    ) -> WorldResult<()> {
        self.warn_unique(component, id);
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(EntityError::Unknown { entity: id })?;
        entity.insert(component, value)?;
        self.observers.dispatch(&EntityEvent {
            entity: id,
            kind: EntityEventKind::Added,
            component: Some(component),
            caused_by_destroy: false,
        });
        self.route_component_change(id, component, ComponentChange::Added, false);
        Ok(())
    }

    fn send_message_erased(
        &mut self,
        target: EntityId,
        component: ComponentId,
        value: Box<dyn ErasedComponent>,
    ) -> WorldResult<()> {
        let entity = self
            .entities
            .get_mut(&target)
            .ok_or(EntityError::Unknown { entity: target })?;
        entity.push_message(component, value)?;
        self.observers.dispatch(&EntityEvent {
            entity: target,
            kind: EntityEventKind::MessageSent,
            component: Some(component),
            caused_by_destroy: false,
        });
        self.frame_messages.push((target, component));

        if let Some(owners) = self.message_waiters.remove(&(target, component)) {
            for owner in owners {
                if let Some(entity) = self.entities.get_mut(&owner) {
                    if let Some(sm) =
                        entity.get_as_mut::<StateMachine>(STATE_MACHINE_COMPONENT_ID)
                    {
                        sm.notify_message_arrived();
                    }
                }
            }
        }
        Ok(())
    }

    fn set_entity_active(&mut self, id: EntityId, active: bool) -> WorldResult<()> {
        {
            let entity = self
                .entities
                .get_mut(&id)
                .ok_or(EntityError::Unknown { entity: id })?;
            if entity.is_destroyed() {
                return Err(EntityError::Destroyed { entity: id }.into());
            }
            if !entity.set_active(active) {
                return Ok(());
            }
        }
        self.observers.dispatch(&EntityEvent {
            entity: id,
            kind: if active {
                EntityEventKind::Activated
            } else {
                EntityEventKind::Deactivated
            },
            component: None,
            caused_by_destroy: false,
        });
        if let Some(entity) = self.entities.get(&id) {
            for context in &mut self.contexts {
                context.handle_activation(entity, active, &self.watchers);
            }
        }
        Ok(())
    }

    fn set_system_enabled<S: System + 'static>(&mut self, enabled: bool) -> WorldResult<()> {
        let index = self
            .scheduler
            .index_of(TypeId::of::<S>())
            .ok_or(WorldError::UnknownSystem { system: std::any::type_name::<S>() })?;
        self.scheduler.set_enabled(index, enabled);
        Ok(())
    }

    fn route_component_change(
        &mut self,
        id: EntityId,
        component: ComponentId,
        change: ComponentChange,
        caused_by_destroy: bool,
    ) {
        let Some(entity) = self.entities.get(&id) else {
            return;
        };
        for context in &mut self.contexts {
            context.handle_component_change(entity, component, change, caused_by_destroy, &self.watchers);
        }
    }

    /// Releases state-machine bookkeeping when its carrier leaves an entity.
    fn release_state_machine(
        &mut self,
        id: EntityId,
        component: ComponentId,
        removed: Option<Box<dyn ErasedComponent>>,
    ) {
        if component != STATE_MACHINE_COMPONENT_ID {
            return;
        }
        if let Some(mut value) = removed {
            if let Some(sm) = value.as_any_mut().downcast_mut::<StateMachine>() {
                sm.on_destroyed();
            }
        }
        self.message_waiters.retain(|_, owners| {
            owners.retain(|owner| *owner != id);
            !owners.is_empty()
        });
    }

    fn warn_unique(&self, component: ComponentId, adding_to: EntityId) {
        let Some(descriptor) = self.registry.descriptor(component) else {
            return;
        };
        if !descriptor.unique {
            return;
        }
        if self
            .entities
            .values()
            .any(|e| e.id() != adding_to && !e.is_destroyed() && e.has(component))
        {
            tracing::warn!(
                component = descriptor.name,
                entity = %adding_to,
                "unique component attached to more than one live entity"
            );
        }
    }

    pub(crate) fn context_snapshot(&mut self, context: ContextId) -> Arc<[EntityId]> {
        match self.context_index.get(&context) {
            Some(&position) => self.contexts[position].snapshot(),
            None => Arc::from(Vec::new()),
        }
    }

    fn context_len(&self, context: ContextId) -> usize {
        self.context_index
            .get(&context)
            .map_or(0, |&position| self.contexts[position].len())
    }

    fn context_contains(&self, context: ContextId, entity: EntityId) -> bool {
        self.context_index
            .get(&context)
            .is_some_and(|&position| self.contexts[position].contains(entity))
    }

    fn run_phase(&mut self, phase: Phase, elapsed_ms: u64) {
        for index in self.scheduler.phase_indices(phase) {
            if !self.scheduler.should_run(index, phase, self.paused) {
                continue;
            }
            self.run_system(index, phase, elapsed_ms, |system, cx| match phase {
                Phase::EarlyStart => system.early_start(cx),
                Phase::Start => system.start(cx),
                Phase::Update => system.update(cx),
                Phase::FixedUpdate => system.fixed_update(cx),
                Phase::LateUpdate => system.late_update(cx),
                Phase::Render => system.render(cx),
                Phase::Reactive => {}
            });
        }
    }

    fn run_system(
        &mut self,
        index: usize,
        phase: Phase,
        elapsed_ms: u64,
        invoke: impl FnOnce(&mut Box<dyn System>, &mut SystemContext<'_>),
    ) {
        let Some(mut system) = self.scheduler.take_system(index) else {
            return;
        };
        let (system_id, context_id) = {
            let entry = self.scheduler.entry(index);
            (entry.id, entry.context)
        };
        let entity_count = self.context_len(context_id);

        let started = Instant::now();
        {
            let mut cx = SystemContext::new(self, system_id, context_id, elapsed_ms);
            invoke(&mut system, &mut cx);
        }
        let elapsed = started.elapsed().as_secs_f64() * 1000.0;

        self.timing.record(system_id, phase, elapsed, entity_count);
        self.scheduler.put_system(index, system);
    }

    fn tick_state_machines(&mut self, elapsed_ms: u64) {
        let ids = self.context_snapshot(self.sm_context);
        if ids.is_empty() {
            return;
        }

        let mut commands = CommandBuffer::new();
        let frame = self.frame;
        for &id in ids.iter() {
            let interest = {
                let Some(entity) = self.entities.get_mut(&id) else {
                    continue;
                };
                if entity.is_destroyed() {
                    continue;
                }
                let Some(sm) = entity.get_as_mut::<StateMachine>(STATE_MACHINE_COMPONENT_ID)
                else {
                    continue;
                };
                let mut cx = RoutineContext::new(
                    id,
                    frame,
                    &mut commands,
                    &mut self.registry,
                    &mut self.wait_cache,
                );
                sm.tick(elapsed_ms, &mut cx)
            };
            if let Some(interest) = interest {
                let target = interest.target.unwrap_or(id);
                self.message_waiters
                    .entry((target, interest.message))
                    .or_default()
                    .push(id);
            }
        }
        self.apply_commands(commands);
    }

    fn apply_commands(&mut self, buffer: CommandBuffer) {
        for command in buffer.commands {
            let result = match command {
                Command::Spawn(bundle) => self.add_entity(bundle).map(|_| ()),
                Command::Destroy(id) => self.remove_entity(id),
                Command::Add(id, bundle) => self.add_bundle(id, bundle),
                Command::Remove(id, register) => register(&mut self.registry)
                    .map_err(WorldError::from)
                    .and_then(|component| self.remove_component_by_id(id, component))
                    .map(|_| ()),
                Command::SendMessage(id, bundle) => self.send_bundle(id, bundle),
                Command::SetActive(id, active) => self.set_entity_active(id, active),
            };
            if let Err(error) = result {
                // Deferred mutations may race entity destruction; that is
                // expected, not fatal.
                tracing::debug!(%error, "deferred command dropped");
            }
        }
    }

    fn add_bundle(&mut self, id: EntityId, bundle: Bundle) -> WorldResult<()> {
        for entry in bundle.entries {
            let component = (entry.register)(&mut self.registry)?;
            self.add_component_erased(id, component, entry.value)?;
        }
        Ok(())
    }

    fn send_bundle(&mut self, id: EntityId, bundle: Bundle) -> WorldResult<()> {
        for entry in bundle.entries {
            let component = (entry.register)(&mut self.registry)?;
            self.send_message_erased(id, component, entry.value)?;
        }
        Ok(())
    }

    fn reactive_drain(&mut self, elapsed_ms: u64) {
        let marked: FxHashSet<WatcherId> = {
            let mut work = self.pending_work.lock().expect("pending-work lock poisoned");
            std::mem::take(&mut *work)
        };

        if !marked.is_empty() {
            for index in 0..self.watchers.len() {
                if !marked.contains(&(index as WatcherId)) {
                    continue;
                }
                let batch = {
                    let entities = &self.entities;
                    self.watchers[index].pop_notifications(|id| {
                        entities.get(&id).is_none_or(|e| e.is_destroyed())
                    })
                };
                if batch.is_empty() {
                    continue;
                }
                let subscribers: Vec<usize> = self.watchers[index].subscribers().to_vec();
                for system_index in subscribers {
                    if !self.scheduler.should_run(system_index, Phase::Reactive, self.paused) {
                        continue;
                    }
                    self.run_system(system_index, Phase::Reactive, elapsed_ms, |system, cx| {
                        for kind in NotificationKind::DRAIN_ORDER {
                            let bucket = batch.bucket(kind);
                            if !bucket.is_empty() {
                                system.react(cx, kind, bucket.entities());
                            }
                        }
                    });
                }
            }
        }

        let messages = std::mem::take(&mut self.frame_messages);
        if messages.is_empty() {
            return;
        }
        for system_index in 0..self.scheduler.len() {
            let (consumed, context_id) = {
                let entry = self.scheduler.entry(system_index);
                if entry.messages.is_empty() {
                    continue;
                }
                (entry.messages.clone(), entry.context)
            };
            if !self.scheduler.should_run(system_index, Phase::Reactive, self.paused) {
                continue;
            }
            let deliveries: Vec<(EntityId, ComponentId)> = messages
                .iter()
                .filter(|(entity, message)| {
                    consumed.contains(message) && self.context_contains(context_id, *entity)
                })
                .copied()
                .collect();
            if deliveries.is_empty() {
                continue;
            }
            self.run_system(system_index, Phase::Reactive, elapsed_ms, |system, cx| {
                for (entity, message) in deliveries {
                    system.message(cx, entity, message);
                }
            });
        }
    }

    fn end_frame(&mut self) {
        for entity in self.entities.values_mut() {
            entity.clear_messages();
        }
        // Messages sent during the reactive drain die with the frame too.
        self.frame_messages.clear();
        for id in std::mem::take(&mut self.deferred_destruction) {
            self.entities.remove(&id);
        }
        self.frame += 1;
    }
}
