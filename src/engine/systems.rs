//! # System Abstractions
//!
//! This module defines the system execution model. A **system** is a unit of
//! logic that operates over the entities its filter matches. Systems:
//!
//! - declare their filter, watched components, consumed messages, ordering
//!   requirements, and pause behavior through a [`SystemDescriptor`],
//! - implement the phase handlers they participate in,
//! - operate through a [`SystemContext`] giving them their context's entity
//!   snapshot and the mutable world.
//!
//! ## Capability model
//!
//! Instead of one interface per capability, a system implements a single
//! trait whose phase handlers all default to no-ops, and its descriptor
//! names the phases it participates in. The pipeline walks per-phase lists
//! in registration order; a handler is only invoked when its phase is
//! declared.
//!
//! ## Attribute surface
//!
//! The descriptor carries the metadata the original system expressed as
//! attributes on type definitions: filter clauses (repeatable), watch
//! descriptors, message descriptors, `requires` ordering constraints, and
//! the pause flags.

use std::any::TypeId;
use std::sync::Arc;

use crate::engine::component::Component;
use crate::engine::error::RegistryError;
use crate::engine::filter::FilterSpec;
use crate::engine::registry::ComponentRegistry;
use crate::engine::types::{
    ComponentId, ContextId, EntityId, Frame, NotificationKind, PauseMode, Phase, SystemId,
};
use crate::engine::world::World;

type RegisterFn = fn(&mut ComponentRegistry) -> Result<ComponentId, RegistryError>;

/// Execution context handed to a system's phase handlers.
pub struct SystemContext<'a> {
    world: &'a mut World,
    system: SystemId,
    context: ContextId,
    elapsed_ms: u64,
}

impl<'a> SystemContext<'a> {
    pub(crate) fn new(
        world: &'a mut World,
        system: SystemId,
        context: ContextId,
        elapsed_ms: u64,
    ) -> Self {
        Self { world, system, context, elapsed_ms }
    }

    /// Snapshot of the entities currently matching this system's filter.
    ///
    /// The snapshot is immutable and cheap to clone; mutations made during
    /// the phase do not retroactively appear in it.
    pub fn entities(&mut self) -> Arc<[EntityId]> {
        self.world.context_snapshot(self.context)
    }

    /// The world, for mutation and lookups.
    pub fn world(&mut self) -> &mut World {
        self.world
    }

    /// Milliseconds elapsed since the previous frame.
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    /// The current frame counter.
    pub fn frame(&self) -> Frame {
        self.world.frame()
    }

    /// This system's id.
    pub fn system_id(&self) -> SystemId {
        self.system
    }
}

/// A unit of logic scheduled by the world.
///
/// Every handler defaults to a no-op; the descriptor declares which phases
/// the system participates in.
pub trait System: Send + Sync {
    /// Runs exactly once, before the first real frame.
    fn early_start(&mut self, _cx: &mut SystemContext<'_>) {}

    /// Runs exactly once, after entities exist.
    fn start(&mut self, _cx: &mut SystemContext<'_>) {}

    /// Runs every frame at variable dt.
    fn update(&mut self, _cx: &mut SystemContext<'_>) {}

    /// Runs at fixed dt, zero or more times per frame.
    fn fixed_update(&mut self, _cx: &mut SystemContext<'_>) {}

    /// Runs every frame after update.
    fn late_update(&mut self, _cx: &mut SystemContext<'_>) {}

    /// Runs every frame, never paused.
    fn render(&mut self, _cx: &mut SystemContext<'_>) {}

    /// Receives one batch of watcher notifications during the reactive
    /// drain. Called once per non-empty kind bucket, in kind order.
    fn react(
        &mut self,
        _cx: &mut SystemContext<'_>,
        _kind: NotificationKind,
        _entities: &[EntityId],
    ) {
    }

    /// Receives a consumed message during the reactive drain.
    fn message(
        &mut self,
        _cx: &mut SystemContext<'_>,
        _entity: EntityId,
        _message: ComponentId,
    ) {
    }

    /// Runs when the world exits.
    fn exit(&mut self, _cx: &mut SystemContext<'_>) {}
}

/// Declarative metadata of a system registration.
///
/// Built with the fluent methods below and paired with the system object in
/// a [`SystemRegistration`].
pub struct SystemDescriptor {
    pub(crate) name: &'static str,
    pub(crate) type_id: TypeId,
    pub(crate) phases: Vec<Phase>,
    pub(crate) filters: Vec<FilterSpec>,
    pub(crate) watch: Vec<RegisterFn>,
    pub(crate) messages: Vec<RegisterFn>,
    pub(crate) requires: Vec<(TypeId, &'static str)>,
    pub(crate) pause: PauseMode,
}

impl SystemDescriptor {
    /// Starts a descriptor for system type `S`.
    pub fn of<S: System + 'static>() -> Self {
        Self {
            name: std::any::type_name::<S>(),
            type_id: TypeId::of::<S>(),
            phases: Vec::new(),
            filters: Vec::new(),
            watch: Vec::new(),
            messages: Vec::new(),
            requires: Vec::new(),
            pause: PauseMode::default(),
        }
    }

    /// Declares participation in `phase`.
    pub fn phase(mut self, phase: Phase) -> Self {
        if !self.phases.contains(&phase) {
            self.phases.push(phase);
        }
        self
    }

    /// Adds a filter clause. Repeatable; clause order is preserved.
    pub fn filter(mut self, clause: FilterSpec) -> Self {
        self.filters.push(clause);
        self
    }

    /// Declares the system reactive to changes of component type `T`.
    ///
    /// Implies the reactive phase.
    pub fn watch<T: Component>(mut self) -> Self {
        self.watch.push(ComponentRegistry::id_of::<T>);
        self.phase(Phase::Reactive)
    }

    /// Declares the system a consumer of message type `M`.
    ///
    /// Implies the reactive phase.
    pub fn consume<M: Component>(mut self) -> Self {
        self.messages.push(ComponentRegistry::id_of::<M>);
        self.phase(Phase::Reactive)
    }

    /// Requires system type `S` to be registered strictly earlier.
    pub fn requires<S: System + 'static>(mut self) -> Self {
        self.requires
            .push((TypeId::of::<S>(), std::any::type_name::<S>()));
        self
    }

    /// Marks the system to keep running while the world is paused.
    pub fn include_on_pause(mut self) -> Self {
        self.pause = PauseMode::IncludeOnPause;
        self
    }

    /// Alias of [`SystemDescriptor::include_on_pause`].
    pub fn do_not_pause(self) -> Self {
        self.include_on_pause()
    }

    /// Marks the system to run *only* while the world is paused.
    pub fn on_pause(mut self) -> Self {
        self.pause = PauseMode::OnPause;
        self
    }
}

/// A system object paired with its descriptor, ready for world construction.
pub struct SystemRegistration {
    pub(crate) descriptor: SystemDescriptor,
    pub(crate) system: Box<dyn System>,
}

impl SystemRegistration {
    /// Pairs `system` with its descriptor.
    pub fn new<S: System + 'static>(descriptor: SystemDescriptor, system: S) -> Self {
        Self { descriptor, system: Box::new(system) }
    }
}
