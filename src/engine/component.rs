//! # Component Model
//!
//! This module defines what a component *is* to the runtime: a plain data
//! value attached to an entity under a dense [`ComponentId`], carrying
//! type-level metadata the registry and the bulk-mutation paths consult.
//!
//! ## Purpose
//! The component model decouples typed user code from the runtime's erased
//! storage, enabling entities to hold heterogeneous component values behind
//! [`ErasedComponent`] while the registry captures per-type metadata at the
//! typed boundary.
//!
//! ## Design
//! - [`Component`] is the typed trait users implement. All metadata is
//!   expressed as associated constants; there is no runtime type scanning.
//! - [`ErasedComponent`] is the object-safe storage trait, blanket
//!   implemented for every component type.
//! - [`Bundle`] groups heterogeneous component values for spawning and bulk
//!   replacement, capturing each type's registration thunk at insertion so
//!   ids can be assigned lazily when the bundle reaches a world.
//!
//! ## Invariants
//! - A component is a value: it has no identity beyond the entity and id it
//!   is attached to.
//! - Carrier kinds (state machine, interactive, transform) collapse onto
//!   reserved ids; see [`crate::engine::registry`].

use std::any::Any;

use crate::engine::error::RegistryError;
use crate::engine::registry::ComponentRegistry;
use crate::engine::types::ComponentId;

/// Storage class of a component type.
///
/// The kind governs registry id assignment: carrier kinds alias onto the
/// framework's reserved ids, everything else receives the next dense id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum ComponentKind {
    /// Plain data value.
    #[default]
    Plain,
    /// Data value whose in-place mutations raise *modified* events.
    Modifiable,
    /// State-machine carrier; aliased onto the reserved state-machine id.
    StateMachine,
    /// Interactive carrier; aliased onto the reserved interactive id.
    Interactive,
    /// Transform carrier, interpreted relative to a parent entity; aliased
    /// onto the reserved transform id.
    Transform,
    /// Transient payload cleared at the end of the frame it was sent in.
    Message,
}

/// A typed component.
///
/// ## Purpose
/// Implemented by every value that can be attached to an entity. The
/// associated constants carry the type-level metadata the original system
/// expressed through attributes and marker interfaces.
///
/// ## Metadata
/// - [`Component::KIND`] — storage class; carrier kinds share reserved ids.
/// - [`Component::RELATIVE`] — the value is interpreted relative to a parent
///   entity.
/// - [`Component::KEEP_ON_REPLACE`] — bulk replacement preserves this
///   component when it is not among the supplied values.
/// - [`Component::UNIQUE`] — at most one live entity per world should carry
///   this component; enforcement is diagnostic only.
/// - [`Component::PERSIST`] — a serializer should include this component.
///
/// ## Change detection
/// [`Component::value_eq`] lets bulk replacement skip the *modified* event
/// when a supplied value equals the stored one. The default is conservative:
/// values are assumed different, so replacement always notifies. Types that
/// can compare cheaply override it:
///
/// ```ignore
/// impl Component for Health {
///     fn value_eq(&self, other: &dyn Any) -> bool {
///         other.downcast_ref::<Health>() == Some(self)
///     }
/// }
/// ```
pub trait Component: Any + Send + Sync {
    /// Storage class of this component type.
    const KIND: ComponentKind = ComponentKind::Plain;

    /// The value is interpreted relative to a parent entity.
    const RELATIVE: bool = false;

    /// Bulk replacement preserves this component if present.
    const KEEP_ON_REPLACE: bool = false;

    /// At most one live entity per world should carry this component.
    const UNIQUE: bool = false;

    /// A serializer should include this component.
    const PERSIST: bool = true;

    /// Returns `true` if `other` holds a value equal to `self`.
    ///
    /// Used by bulk replacement to suppress spurious *modified* events. The
    /// default treats every value as different.
    fn value_eq(&self, _other: &dyn Any) -> bool {
        false
    }
}

/// Object-safe storage form of a component.
///
/// Blanket implemented for every [`Component`]; entities store component
/// values as `Box<dyn ErasedComponent>`.
pub trait ErasedComponent: Any + Send + Sync {
    /// Borrows the value as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Mutably borrows the value as `Any` for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Rust type name, for diagnostics.
    fn type_name(&self) -> &'static str;

    /// Returns `true` if `other` holds an equal value.
    fn same_value(&self, other: &dyn ErasedComponent) -> bool;
}

impl<T: Component> ErasedComponent for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn same_value(&self, other: &dyn ErasedComponent) -> bool {
        self.value_eq(other.as_any())
    }
}

/// Registration thunk captured per bundle entry.
type RegisterFn = fn(&mut ComponentRegistry) -> Result<ComponentId, RegistryError>;

pub(crate) struct BundleEntry {
    pub(crate) value: Box<dyn ErasedComponent>,
    pub(crate) register: RegisterFn,
}

/// Heterogeneous group of component values.
///
/// ## Purpose
/// Used when spawning entities and for bulk replacement. Component ids are
/// not resolved at insertion; each entry carries a registration thunk the
/// world invokes against its own registry, so bundles can be assembled
/// before any world exists.
///
/// ## Notes
/// Insertion order is preserved; the world applies entries in order.
#[derive(Default)]
pub struct Bundle {
    pub(crate) entries: Vec<BundleEntry>,
}

impl Bundle {
    /// Creates an empty bundle.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a component value.
    #[inline]
    pub fn insert<T: Component>(&mut self, value: T) {
        self.entries.push(BundleEntry {
            value: Box::new(value),
            register: ComponentRegistry::id_of::<T>,
        });
    }

    /// Inserts a component value, builder-style.
    #[inline]
    pub fn with<T: Component>(mut self, value: T) -> Self {
        self.insert(value);
        self
    }

    /// Returns the number of component values in this bundle.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the bundle holds no values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
