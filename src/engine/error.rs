//! Error types for world configuration and entity mutation.
//!
//! This module declares focused, composable error types used across the
//! runtime. Each error carries enough context to make failures actionable
//! while remaining small and cheap to pass around or convert into the
//! aggregate [`WorldError`].
//!
//! ## Goals
//! * **Specificity:** Each error type models a single failure mode (e.g.
//!   operations on a destroyed entity, duplicate component ids, system
//!   ordering violations).
//! * **Ergonomics:** All errors implement [`std::error::Error`] and
//!   [`fmt::Display`], and provide `From<T>` conversions into the aggregate
//!   error so call sites can use `?`.
//! * **Actionability:** Structured fields (offending entity ids, component
//!   ids, system names) make logs useful without reproducing the issue.
//!
//! ## Taxonomy
//! * [`ConfigError`] — rejected world construction: duplicate system types,
//!   unsatisfied or out-of-order `requires` constraints. Surfaced once, at
//!   [`crate::engine::world::World::new`].
//! * [`EntityError`] — invariant violations on entity mutation: operations
//!   on a destroyed entity, double-add of a component id, unknown entity
//!   handles. These indicate bugs in the caller; no recovery is attempted.
//! * [`RegistryError`] — component id space exhaustion.
//!
//! A filter that can never match any entity is *not* an error; it yields an
//! always-empty context.
//!
//! ## Display vs. Debug
//! * [`fmt::Display`] is optimized for operator logs (short, imperative
//!   phrasing).
//! * [`fmt::Debug`] (derived) retains full structure for diagnostics.

use std::fmt;

use crate::engine::types::{ComponentId, EntityId};

/// Returned when world construction rejects the supplied system list.
///
/// ### Variants
/// * `DuplicateSystem` — the same system type was registered twice.
/// * `MissingRequirement` — a system requires another that was never
///   registered.
/// * `RequirementOutOfOrder` — a required system is registered, but does not
///   appear strictly earlier in the list.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The same system type appears more than once in the system list.
    DuplicateSystem {
        /// Type name of the duplicated system.
        system: &'static str,
    },

    /// A declared requirement names a system that was never registered.
    MissingRequirement {
        /// Type name of the declaring system.
        system: &'static str,
        /// Type name of the missing requirement.
        requires: &'static str,
    },

    /// A declared requirement appears later in the list than its dependent.
    RequirementOutOfOrder {
        /// Type name of the declaring system.
        system: &'static str,
        /// Type name of the requirement that must come first.
        requires: &'static str,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::DuplicateSystem { system } => {
                write!(f, "system {} registered twice", system)
            }
            ConfigError::MissingRequirement { system, requires } => {
                write!(f, "system {} requires unregistered system {}", system, requires)
            }
            ConfigError::RequirementOutOfOrder { system, requires } => {
                write!(
                    f,
                    "system {} requires {} to be registered strictly earlier",
                    system, requires
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Returned when an entity mutation violates a lifecycle invariant.
///
/// These conditions indicate bugs in calling code rather than recoverable
/// runtime states; the world surfaces them immediately and attempts no
/// recovery.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityError {
    /// The entity id is not present in the world's entity table.
    Unknown {
        /// Offending handle.
        entity: EntityId,
    },

    /// A mutating operation was invoked on a destroyed entity.
    Destroyed {
        /// Offending handle.
        entity: EntityId,
    },

    /// A component was added to an entity that already carries that id.
    DuplicateComponent {
        /// Offending handle.
        entity: EntityId,
        /// Component id already present.
        component: ComponentId,
    },
}

impl fmt::Display for EntityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityError::Unknown { entity } => {
                write!(f, "{} is not present in this world", entity)
            }
            EntityError::Destroyed { entity } => {
                write!(f, "{} is destroyed and can no longer be mutated", entity)
            }
            EntityError::DuplicateComponent { entity, component } => {
                write!(f, "{} already has component id {}", entity, component)
            }
        }
    }
}

impl std::error::Error for EntityError {}

/// Returned when the component registry cannot satisfy an id assignment.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// The dense component id space is exhausted.
    CapacityExceeded {
        /// Maximum number of component types.
        cap: usize,
    },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::CapacityExceeded { cap } => {
                write!(f, "component id space exhausted (capacity {})", cap)
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// Aggregate error for world operations.
///
/// Wraps the precise low-level failures so callers can write `?` and still
/// return a single, expressive type, while `match` remains available for
/// control flow on specific conditions.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorldError {
    /// World construction was rejected.
    Config(ConfigError),

    /// An entity mutation violated a lifecycle invariant.
    Entity(EntityError),

    /// The component registry could not assign an id.
    Registry(RegistryError),

    /// A system lookup by type found no registered system.
    UnknownSystem {
        /// Type name of the system that was looked up.
        system: &'static str,
    },

    /// An interaction was requested on an entity without an interactive
    /// component.
    NotInteractive {
        /// Offending handle.
        entity: EntityId,
    },
}

impl fmt::Display for WorldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorldError::Config(e) => write!(f, "{e}"),
            WorldError::Entity(e) => write!(f, "{e}"),
            WorldError::Registry(e) => write!(f, "{e}"),
            WorldError::UnknownSystem { system } => {
                write!(f, "system {} is not registered in this world", system)
            }
            WorldError::NotInteractive { entity } => {
                write!(f, "{} has no interactive component", entity)
            }
        }
    }
}

impl std::error::Error for WorldError {}

impl From<ConfigError> for WorldError {
    fn from(e: ConfigError) -> Self { WorldError::Config(e) }
}
impl From<EntityError> for WorldError {
    fn from(e: EntityError) -> Self { WorldError::Entity(e) }
}
impl From<RegistryError> for WorldError {
    fn from(e: RegistryError) -> Self { WorldError::Registry(e) }
}

/// Convenience alias for world operations.
pub type WorldResult<T> = Result<T, WorldError>;
