//! # Reactive ECS
//!
//! Entity-Component-System runtime for interactive simulations (games,
//! agent-based models) where thousands of entities are updated each frame
//! through a pipeline of cooperating systems.
//!
//! ## Design Goals
//! - Context filtering: every system sees exactly the entities matching its
//!   filter, maintained incrementally on every mutation
//! - Batched, coalesced, order-preserving reactive notifications
//! - Coroutine-style per-entity state machines driven by wait directives
//! - Deterministic, single-threaded frame pipeline

#![warn(missing_docs)]
#![allow(clippy::module_inception)]

pub mod engine;
pub mod diagnostics;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (Public API)
// ─────────────────────────────────────────────────────────────────────────────

pub use engine::world::{World, WorldConfig};

pub use engine::entity::Entity;

pub use engine::component::{Bundle, Component, ComponentKind, ErasedComponent};

pub use engine::registry::{ComponentDesc, ComponentRegistry};

pub use engine::filter::{Filter, FilterClause, FilterSpec};

pub use engine::context::Context;

pub use engine::watcher::{Bucket, ComponentWatcher, PendingNotifications};

pub use engine::systems::{System, SystemContext, SystemDescriptor, SystemRegistration};

pub use engine::commands::{Command, CommandBuffer};

pub use engine::state_machine::{Routine, RoutineContext, StateMachine, Wait, WaitCache};

pub use engine::interaction::{Interaction, Interactive};

pub use engine::observers::{EntityEvent, EntityEventKind, ObserverAction};

pub use engine::error::{ConfigError, EntityError, RegistryError, WorldError, WorldResult};

pub use engine::types::{
    Access, ClauseKind, ComponentId, ContextId, EntityId, Frame, NotificationKind, PauseMode,
    Phase, SubscriptionId, SystemId, COMPONENT_CAP, INTERACTIVE_COMPONENT_ID,
    RESERVED_COMPONENT_IDS, STATE_MACHINE_COMPONENT_ID, TRANSFORM_COMPONENT_ID,
};

pub use diagnostics::timing::{AggregateSink, NoopSink, TimingSink};

// ─────────────────────────────────────────────────────────────────────────────
// Prelude (Optional but recommended)
// ─────────────────────────────────────────────────────────────────────────────

/// Commonly used runtime types.
///
/// Import with:
/// ```rust
/// use reactive_ecs::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Access, Bundle, Component, ComponentKind, EntityId, FilterSpec, NotificationKind, Phase,
        Routine, RoutineContext, StateMachine, System, SystemContext, SystemDescriptor,
        SystemRegistration, Wait, World, WorldResult,
    };
    pub use crate::engine::registry::ComponentRegistry;
}
