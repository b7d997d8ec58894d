//! # Component Registry
//!
//! This module provides the registry that assigns stable [`ComponentId`]
//! values to component types and records the per-type metadata the rest of
//! the runtime consults.
//!
//! ## Purpose
//! A single dense integer per component type lets contexts and entities
//! store component memberships as small sorted structures, and lets filter
//! signatures hash cheaply. Collapsing carrier-interface implementations
//! onto one reserved id is what lets a context filter for "any state
//! machine" without enumerating concrete types.
//!
//! ## Design
//! - The registry is **owned by the world** and passed in at construction;
//!   there is no global table and no runtime type scanning. Hosts
//!   pre-register the component types they want walkable through
//!   [`ComponentRegistry::register`]; anything else is discovered lazily on
//!   first use.
//! - Components are assigned a compact id in `[0, COMPONENT_CAP)`. The first
//!   [`RESERVED_COMPONENT_IDS`] ids belong to the framework carriers; a type
//!   whose [`Component::KIND`] is a carrier kind is aliased onto the
//!   carrier's reserved id rather than receiving a fresh one.
//!
//! ## Invariants
//! - Ids are unique, dense, and monotonic for non-carrier types.
//! - Id assignment is idempotent per type.
//! - The parent-relative id set contains the transform reserved id plus
//!   every id whose registering type carries the relative marker.

use std::any::{type_name, TypeId};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::engine::component::{Component, ComponentKind};
use crate::engine::error::RegistryError;
use crate::engine::types::{
    ComponentId, COMPONENT_CAP, INTERACTIVE_COMPONENT_ID, RESERVED_COMPONENT_IDS,
    STATE_MACHINE_COMPONENT_ID, TRANSFORM_COMPONENT_ID,
};

/// Describes a registered component type.
///
/// ## Notes
/// `ComponentDesc` is `Copy` and safe to clone freely for reporting and
/// diagnostics. Carrier types share an id; the descriptor stored under a
/// reserved id reflects the first type that reached it.

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ComponentDesc {
    /// Runtime identifier assigned to this component type.
    pub component_id: ComponentId,

    /// Rust type name for diagnostics.
    pub name: &'static str,

    /// Runtime `TypeId` of the component.
    pub type_id: TypeId,

    /// Storage class of the component type.
    pub kind: ComponentKind,

    /// The value is interpreted relative to a parent entity.
    pub relative: bool,

    /// Bulk replacement preserves this component.
    pub keep_on_replace: bool,

    /// At most one live entity per world should carry this component.
    pub unique: bool,

    /// A serializer should include this component.
    pub persist: bool,
}

impl ComponentDesc {
    fn of<T: Component>(component_id: ComponentId) -> Self {
        Self {
            component_id,
            name: type_name::<T>(),
            type_id: TypeId::of::<T>(),
            kind: T::KIND,
            relative: T::RELATIVE,
            keep_on_replace: T::KEEP_ON_REPLACE,
            unique: T::UNIQUE,
            persist: T::PERSIST,
        }
    }
}

impl std::fmt::Display for ComponentDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ComponentDesc {{ id: {}, name: {}, kind: {:?} }}",
            self.component_id, self.name, self.kind
        )
    }
}

/// Mapping between component types and compact [`ComponentId`] values.
///
/// ## Purpose
/// Assigns stable runtime identifiers to component types, records component
/// metadata, and tracks the parent-relative id set.
///
/// ## Design
/// - `by_type` maps `TypeId -> ComponentId` for every type ever seen.
/// - `by_id` stores the descriptor indexed by id.
/// - `next_id` assigns new ids sequentially after the reserved prefix.
/// - `walkable` holds the explicitly pre-registered table in registration
///   order; kind walks consult this table, not the lazily discovered types.
///
/// ## Invariants
/// - Every entry in `by_type` has a matching descriptor in `by_id`.
/// - Ids are always in bounds of `COMPONENT_CAP`.

pub struct ComponentRegistry {
    next_id: ComponentId,
    by_type: FxHashMap<TypeId, ComponentId>,
    by_id: FxHashMap<ComponentId, ComponentDesc>,
    relative: FxHashSet<ComponentId>,
    walkable: Vec<ComponentDesc>,
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentRegistry {
    /// Creates an empty registry.
    ///
    /// The parent-relative set starts with the transform reserved id, which
    /// is relative by definition.
    pub fn new() -> Self {
        let mut relative = FxHashSet::default();
        relative.insert(TRANSFORM_COMPONENT_ID);
        Self {
            next_id: RESERVED_COMPONENT_IDS,
            by_type: FxHashMap::default(),
            by_id: FxHashMap::default(),
            relative,
            walkable: Vec::new(),
        }
    }

    /// Returns the id for component type `T`, assigning one on first sight.
    ///
    /// ## Behavior
    /// - Carrier kinds (state machine, interactive, transform) alias onto
    ///   the corresponding reserved id; no new id is allocated.
    /// - Every other type receives `next_id++`.
    /// - Idempotent per type.
    ///
    /// ## Errors
    /// Returns [`RegistryError::CapacityExceeded`] when the dense id space
    /// is exhausted.
    pub fn id_of<T: Component>(&mut self) -> Result<ComponentId, RegistryError> {
        let type_id = TypeId::of::<T>();
        if let Some(&existing) = self.by_type.get(&type_id) {
            return Ok(existing);
        }

        let id = match T::KIND {
            ComponentKind::StateMachine => STATE_MACHINE_COMPONENT_ID,
            ComponentKind::Interactive => INTERACTIVE_COMPONENT_ID,
            ComponentKind::Transform => TRANSFORM_COMPONENT_ID,
            _ => self.alloc_id()?,
        };

        self.by_type.insert(type_id, id);
        self.by_id.entry(id).or_insert_with(|| ComponentDesc::of::<T>(id));
        if T::RELATIVE {
            self.relative.insert(id);
        }
        Ok(id)
    }

    /// Pre-registers component type `T` into the walkable table.
    ///
    /// ## Purpose
    /// Assigns an id exactly like [`ComponentRegistry::id_of`] and
    /// additionally records the type so [`ComponentRegistry::components_of_kind`]
    /// can enumerate it. Idempotent per type.
    pub fn register<T: Component>(&mut self) -> Result<ComponentId, RegistryError> {
        let id = self.id_of::<T>()?;
        if !self.walkable.iter().any(|d| d.type_id == TypeId::of::<T>()) {
            self.walkable.push(ComponentDesc::of::<T>(id));
        }
        Ok(id)
    }

    /// Returns the id for `T` if it has already been assigned one.
    pub fn lookup<T: Component>(&self) -> Option<ComponentId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Returns `true` if `component_id` is in the parent-relative set.
    #[inline]
    pub fn is_relative(&self, component_id: ComponentId) -> bool {
        self.relative.contains(&component_id)
    }

    /// Walks the pre-registered table, yielding descriptors of the given kind.
    ///
    /// Lazily discovered types are not enumerated; only types that went
    /// through [`ComponentRegistry::register`] appear here.
    pub fn components_of_kind(
        &self,
        kind: ComponentKind,
    ) -> impl Iterator<Item = &ComponentDesc> + '_ {
        self.walkable.iter().filter(move |d| d.kind == kind)
    }

    /// Returns the descriptor for `component_id`, if any type reached it.
    pub fn descriptor(&self, component_id: ComponentId) -> Option<&ComponentDesc> {
        self.by_id.get(&component_id)
    }

    /// Returns the number of distinct ids assigned so far, reserved prefix
    /// included.
    pub fn len(&self) -> usize {
        self.next_id as usize
    }

    /// Returns `true` if no non-reserved id has been assigned.
    pub fn is_empty(&self) -> bool {
        self.next_id == RESERVED_COMPONENT_IDS
    }

    fn alloc_id(&mut self) -> Result<ComponentId, RegistryError> {
        let component_id = self.next_id;
        if (component_id as usize) >= COMPONENT_CAP {
            return Err(RegistryError::CapacityExceeded { cap: COMPONENT_CAP });
        }
        self.next_id += 1;
        Ok(component_id)
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<&ComponentDesc> = self.by_id.values().collect();
        ids.sort_by_key(|d| d.component_id);
        f.debug_list().entries(ids).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain;
    impl Component for Plain {}

    struct Carrier;
    impl Component for Carrier {
        const KIND: ComponentKind = ComponentKind::StateMachine;
    }

    struct OtherCarrier;
    impl Component for OtherCarrier {
        const KIND: ComponentKind = ComponentKind::StateMachine;
    }

    struct Anchored;
    impl Component for Anchored {
        const RELATIVE: bool = true;
    }

    #[test]
    fn assignment_is_idempotent_and_dense() {
        let mut registry = ComponentRegistry::new();
        let a = registry.id_of::<Plain>().unwrap();
        let b = registry.id_of::<Plain>().unwrap();
        assert_eq!(a, b);
        assert_eq!(a, RESERVED_COMPONENT_IDS);
    }

    #[test]
    fn carriers_collapse_onto_reserved_ids() {
        let mut registry = ComponentRegistry::new();
        let a = registry.id_of::<Carrier>().unwrap();
        let b = registry.id_of::<OtherCarrier>().unwrap();
        assert_eq!(a, STATE_MACHINE_COMPONENT_ID);
        assert_eq!(b, STATE_MACHINE_COMPONENT_ID);
        assert!(registry.is_empty());
    }

    #[test]
    fn relative_marker_joins_transform_id() {
        let mut registry = ComponentRegistry::new();
        let id = registry.id_of::<Anchored>().unwrap();
        assert!(registry.is_relative(id));
        assert!(registry.is_relative(TRANSFORM_COMPONENT_ID));
    }

    #[test]
    fn kind_walk_sees_only_registered_types() {
        let mut registry = ComponentRegistry::new();
        registry.register::<Carrier>().unwrap();
        registry.id_of::<OtherCarrier>().unwrap();
        let walked: Vec<_> = registry
            .components_of_kind(ComponentKind::StateMachine)
            .collect();
        assert_eq!(walked.len(), 1);
        assert_eq!(walked[0].type_id, TypeId::of::<Carrier>());
    }
}
