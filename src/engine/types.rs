//! Core Identifiers, Constants, and Kind Enumerations
//!
//! This module defines the **fundamental types, identifiers, and
//! enumerations** used throughout the runtime. These definitions form the
//! *semantic backbone* of the system and are shared across all subsystems,
//! including entity management, contexts, watchers, scheduling, and the
//! state-machine runtime.
//!
//! ## Design Philosophy
//!
//! The runtime is designed around:
//!
//! - **Small copyable numeric identifiers** for every concept
//! - **Dense component ids** so contexts and entities can store component
//!   memberships as small sorted structures
//! - **A reserved id prefix** for framework-known component carriers
//! - **Explicit kind enumerations** in place of reflection
//!
//! ## Entity Representation
//!
//! Entities are identified by an opaque 64-bit value that is unique for the
//! life of the world and never reused. Unlike generational handles, a
//! destroyed id simply never comes back; staleness is detected by absence
//! from the entity table.
//!
//! ## Component Ids
//!
//! Components are identified by compact [`ComponentId`] values. The first
//! [`RESERVED_COMPONENT_IDS`] ids are reserved for the framework-known
//! carrier kinds (state machine, interactive, transform); every component
//! type implementing one of those carriers is aliased onto the carrier's
//! reserved id rather than receiving a fresh one.
//!
//! ## Notification Kinds
//!
//! Reactive delivery is bucketed by [`NotificationKind`]. The drain order is
//! fixed and deterministic: *added, modified, removed, enabled, disabled*.

/// Unique identifier for a component type.
pub type ComponentId = u16;

/// Unique identifier for a system.
pub type SystemId = u16;

/// Frame counter value.
pub type Frame = u64;

/// Canonical identifier of a context, derived from its filter signature.
pub type ContextId = u64;

/// Index of a watcher in the world's registration-ordered watcher table.
pub type WatcherId = u32;

/// Identifier of an entity-event subscription.
pub type SubscriptionId = u64;

/// Maximum number of registered component types.
pub const COMPONENT_CAP: usize = 4096;

/// Reserved id for all state-machine carrier components.
pub const STATE_MACHINE_COMPONENT_ID: ComponentId = 0;

/// Reserved id for all interactive carrier components.
pub const INTERACTIVE_COMPONENT_ID: ComponentId = 1;

/// Reserved id for all transform (parent-relative) carrier components.
pub const TRANSFORM_COMPONENT_ID: ComponentId = 2;

/// Number of component ids reserved for framework-known carriers.
pub const RESERVED_COMPONENT_IDS: ComponentId = 3;

/// Opaque identifier for an entity.
///
/// ## Purpose
/// `EntityId` is a compact handle that uniquely identifies an entity for the
/// life of its world. Ids are allocated monotonically and never reused, so a
/// handle can never silently refer to a different entity.
///
/// ## Notes
/// `EntityId` values are cheap to copy and compare and are safe to pass
/// across threads.

#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct EntityId(pub u64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// Kind of a batched watcher notification.
///
/// ## Drain Order
/// Within a frame the reactive drain delivers buckets in the fixed order
/// given by [`NotificationKind::DRAIN_ORDER`]; within one bucket, entity
/// insertion order is preserved.

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum NotificationKind {
    /// The entity entered the observed set, or a watched component appeared.
    Added,
    /// A watched component was modified in place or through replacement.
    Modified,
    /// A watched component disappeared, or the entity left the observed set.
    Removed,
    /// The entity was reactivated while matching.
    Enabled,
    /// The entity was deactivated while matching.
    Disabled,
}

impl NotificationKind {
    /// Deterministic drain order of notification buckets.
    pub const DRAIN_ORDER: [NotificationKind; 5] = [
        NotificationKind::Added,
        NotificationKind::Modified,
        NotificationKind::Removed,
        NotificationKind::Enabled,
        NotificationKind::Disabled,
    ];

    /// Returns the bucket index of this kind.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            NotificationKind::Added => 0,
            NotificationKind::Modified => 1,
            NotificationKind::Removed => 2,
            NotificationKind::Enabled => 3,
            NotificationKind::Disabled => 4,
        }
    }
}

/// Kind of a filter clause.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ClauseKind {
    /// Every listed component must be present.
    AllOf,
    /// At least one listed component must be present.
    AnyOf,
    /// No listed component may be present.
    NoneOf,
    /// The context never matches any entity; used by systems that
    /// participate only for ordering or unique-context registration.
    None,
}

/// Declared access mode of a filter clause.
///
/// Access affects context identity only: two signatures that differ solely
/// in read/write access collapse onto the same context when either declares
/// write.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Access {
    /// Read-only access.
    Read,
    /// Exclusive write access.
    Write,
}

/// Execution phase of a system.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Phase {
    /// Runs exactly once, before the first real frame.
    EarlyStart,
    /// Runs exactly once, after entities exist.
    Start,
    /// Runs every frame at variable dt.
    Update,
    /// Runs zero or more times per frame at fixed dt.
    FixedUpdate,
    /// Runs every frame after update.
    LateUpdate,
    /// Consumes batched watcher notifications during the reactive drain.
    Reactive,
    /// Runs every frame, never paused.
    Render,
}

/// Pause behavior of a system.
///
/// ## Semantics
/// When the world is paused, update, fixed-update, and late-update systems
/// are skipped unless marked [`PauseMode::IncludeOnPause`]; render systems
/// always run; [`PauseMode::OnPause`] systems run *only* while paused.
/// Reactive and startup phases are unaffected by pause.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum PauseMode {
    /// Skipped while the world is paused.
    #[default]
    Pausable,
    /// Runs whether or not the world is paused.
    IncludeOnPause,
    /// Runs only while the world is paused.
    OnPause,
}
