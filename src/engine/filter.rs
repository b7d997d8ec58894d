//! # Filter Signatures
//!
//! This module defines the filter language contexts are built from: ordered
//! clause lists over component ids, each clause bearing a kind (all-of,
//! any-of, none-of, none) and a declared access mode.
//!
//! ## Purpose
//! A filter describes *which entities a system wants to see*. Two systems
//! declaring the same signature share one context, so filters must carry a
//! canonical identity: clause kinds, sorted component-id multisets, and
//! access flags.
//!
//! ## Design
//! - [`FilterSpec`] is the unresolved, type-level form carried by system
//!   descriptors. Component types are captured as registration thunks so no
//!   registry needs to exist when descriptors are built.
//! - [`Filter`] is the resolved form: concrete component ids, canonicalized
//!   (sorted) per clause, hashed into a [`ContextId`].
//!
//! ## Matching
//! 1. If any *none-of* component is present, reject.
//! 2. If any *all-of* component is absent, reject.
//! 3. If an *any-of* clause exists, require at least one present.
//! 4. A *none* clause rejects everything.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;
use smallvec::SmallVec;

use crate::engine::component::Component;
use crate::engine::entity::Entity;
use crate::engine::error::RegistryError;
use crate::engine::registry::ComponentRegistry;
use crate::engine::types::{Access, ClauseKind, ComponentId, ContextId};

type RegisterFn = fn(&mut ComponentRegistry) -> Result<ComponentId, RegistryError>;

/// Unresolved filter clause carried by a system descriptor.
///
/// Component types are captured as registration thunks; the world resolves
/// them against its registry when contexts are built.
pub struct FilterSpec {
    kind: ClauseKind,
    access: Access,
    components: Vec<RegisterFn>,
}

impl FilterSpec {
    /// Starts an *all-of* clause with the given access.
    pub fn all_of(access: Access) -> Self {
        Self::new(ClauseKind::AllOf, access)
    }

    /// Starts an *any-of* clause with the given access.
    pub fn any_of(access: Access) -> Self {
        Self::new(ClauseKind::AnyOf, access)
    }

    /// Starts a *none-of* clause.
    pub fn none_of() -> Self {
        Self::new(ClauseKind::NoneOf, Access::Read)
    }

    /// A clause that never matches any entity.
    ///
    /// Used by systems that participate only for ordering or
    /// unique-context registration.
    pub fn none() -> Self {
        Self::new(ClauseKind::None, Access::Read)
    }

    fn new(kind: ClauseKind, access: Access) -> Self {
        Self { kind, access, components: Vec::new() }
    }

    /// Adds a component type to the clause, builder-style.
    pub fn with<T: Component>(mut self) -> Self {
        self.components.push(ComponentRegistry::id_of::<T>);
        self
    }

    pub(crate) fn resolve(
        &self,
        registry: &mut ComponentRegistry,
    ) -> Result<FilterClause, RegistryError> {
        let mut components: SmallVec<[ComponentId; 4]> = SmallVec::new();
        for register in &self.components {
            let id = register(registry)?;
            if !components.contains(&id) {
                components.push(id);
            }
        }
        components.sort_unstable();
        Ok(FilterClause {
            kind: self.kind,
            access: self.access,
            components,
        })
    }
}

/// Resolved filter clause: kind, access, and a sorted component-id set.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct FilterClause {
    /// Clause kind.
    pub kind: ClauseKind,
    /// Declared access.
    pub access: Access,
    /// Sorted, deduplicated component ids.
    pub components: SmallVec<[ComponentId; 4]>,
}

/// Resolved filter signature of a context.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Filter {
    clauses: Vec<FilterClause>,
}

impl Filter {
    pub(crate) fn from_clauses(clauses: Vec<FilterClause>) -> Self {
        Self { clauses }
    }

    pub(crate) fn from_specs(
        specs: &[FilterSpec],
        registry: &mut ComponentRegistry,
    ) -> Result<Self, RegistryError> {
        let mut clauses = Vec::with_capacity(specs.len());
        for spec in specs {
            clauses.push(spec.resolve(registry)?);
        }
        Ok(Self { clauses })
    }

    /// Returns the clauses of this filter in declaration order.
    pub fn clauses(&self) -> &[FilterClause] {
        &self.clauses
    }

    /// Returns `true` if the filter contains a *none* clause and therefore
    /// can never match.
    pub fn never_matches(&self) -> bool {
        self.clauses.iter().any(|c| c.kind == ClauseKind::None)
    }

    /// Canonical context identifier of this signature.
    ///
    /// Two filters receive the same id iff their clause lists, component-id
    /// multisets, and access flags are identical.
    pub fn context_id(&self) -> ContextId {
        let mut hasher = FxHasher::default();
        for clause in &self.clauses {
            let kind_tag: u8 = match clause.kind {
                ClauseKind::AllOf => 0,
                ClauseKind::AnyOf => 1,
                ClauseKind::NoneOf => 2,
                ClauseKind::None => 3,
            };
            let access_tag: u8 = match clause.access {
                Access::Read => 0,
                Access::Write => 1,
            };
            kind_tag.hash(&mut hasher);
            access_tag.hash(&mut hasher);
            clause.components.as_slice().hash(&mut hasher);
        }
        self.clauses.len().hash(&mut hasher);
        hasher.finish()
    }

    /// Iterates every component id named by any clause of this filter.
    pub fn component_ids(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.clauses.iter().flat_map(|c| c.components.iter().copied())
    }

    /// Returns `true` if `entity`'s component set satisfies this filter.
    ///
    /// Activation and destruction are not consulted here; set placement is
    /// the context's concern.
    pub fn matches(&self, entity: &Entity) -> bool {
        if self.never_matches() {
            return false;
        }

        for clause in &self.clauses {
            match clause.kind {
                ClauseKind::NoneOf => {
                    if clause.components.iter().any(|&id| entity.has(id)) {
                        return false;
                    }
                }
                ClauseKind::AllOf => {
                    if clause.components.iter().any(|&id| !entity.has(id)) {
                        return false;
                    }
                }
                ClauseKind::AnyOf => {
                    if !clause.components.iter().any(|&id| entity.has(id)) {
                        return false;
                    }
                }
                ClauseKind::None => return false,
            }
        }
        true
    }
}
