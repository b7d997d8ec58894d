//! # Entity Management
//!
//! This module defines the entity: a mutable bag of components keyed by
//! dense component id, together with its activation and lifecycle state.
//!
//! ## Purpose
//! Entities are identity-bearing containers. This module is responsible for:
//!
//! - Holding component values behind type-erased storage
//! - Tracking the active and destroyed flags
//! - Buffering the messages recorded during the current frame
//!
//! ## Entity Model
//! An entity owns:
//!
//! - An **id**, stable and unique for the life of the world
//! - An **ordered component map** from component id to value
//! - An **active flag**, toggled by activate/deactivate
//! - A **destroyed flag**, set once and never cleared
//! - The **frame messages** recorded since the last frame end
//!
//! ## Invariants
//! - At most one component per component id.
//! - `destroyed` implies not `active`.
//! - Once `destroyed` is set it never clears; every mutating operation on a
//!   destroyed entity fails fast with [`EntityError::Destroyed`].
//!
//! ## Mutation discipline
//! All mutations that raise events (add, remove, replace, activate,
//! deactivate, destroy, send-message) go through the owning
//! [`crate::engine::world::World`], which routes the resulting events to
//! contexts, watchers, and observers. The entity itself exposes the
//! observation surface plus crate-internal primitive mutations.

use std::collections::BTreeMap;

use smallvec::SmallVec;

use crate::engine::component::{Component, ErasedComponent};
use crate::engine::error::EntityError;
use crate::engine::types::{ComponentId, EntityId};

/// Identity-bearing container of components.
pub struct Entity {
    id: EntityId,
    components: BTreeMap<ComponentId, Box<dyn ErasedComponent>>,
    active: bool,
    destroyed: bool,
    messages: SmallVec<[(ComponentId, Box<dyn ErasedComponent>); 2]>,
}

impl Entity {
    pub(crate) fn new(id: EntityId) -> Self {
        Self {
            id,
            components: BTreeMap::new(),
            active: true,
            destroyed: false,
            messages: SmallVec::new(),
        }
    }

    /// Returns this entity's id.
    #[inline]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Returns `true` while the entity is active.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Returns `true` once the entity has been destroyed.
    #[inline]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Returns `true` if a component with `component_id` is present.
    #[inline]
    pub fn has(&self, component_id: ComponentId) -> bool {
        self.components.contains_key(&component_id)
    }

    /// Returns the erased component stored under `component_id`.
    pub fn get(&self, component_id: ComponentId) -> Option<&dyn ErasedComponent> {
        self.components.get(&component_id).map(|c| c.as_ref())
    }

    /// Returns the component under `component_id` downcast to `T`.
    pub fn get_as<T: Component>(&self, component_id: ComponentId) -> Option<&T> {
        self.components
            .get(&component_id)?
            .as_any()
            .downcast_ref::<T>()
    }

    /// Mutably returns the component under `component_id` downcast to `T`.
    ///
    /// Direct in-place mutation through this accessor raises no events; use
    /// the world's modify operation for notifying mutation.
    pub fn get_as_mut<T: Component>(&mut self, component_id: ComponentId) -> Option<&mut T> {
        self.components
            .get_mut(&component_id)?
            .as_any_mut()
            .downcast_mut::<T>()
    }

    /// Iterates the component ids present on this entity, in ascending order.
    pub fn component_ids(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.components.keys().copied()
    }

    /// Returns the number of components on this entity.
    #[inline]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns `true` if the entity carries no components.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Returns `true` if a message with `message_id` was recorded this frame.
    pub fn has_message(&self, message_id: ComponentId) -> bool {
        self.messages.iter().any(|(id, _)| *id == message_id)
    }

    /// Iterates the messages of `message_id` recorded this frame, downcast to
    /// `T`, in send order.
    pub fn messages_of<T: Component>(
        &self,
        message_id: ComponentId,
    ) -> impl Iterator<Item = &T> + '_ {
        self.messages
            .iter()
            .filter(move |(id, _)| *id == message_id)
            .filter_map(|(_, value)| value.as_any().downcast_ref::<T>())
    }

    // ── crate-internal primitive mutations ──────────────────────────────

    /// Inserts a component value.
    ///
    /// ## Errors
    /// - `Destroyed` when the entity has been destroyed.
    /// - `DuplicateComponent` when `component_id` is already present.
    pub(crate) fn insert(
        &mut self,
        component_id: ComponentId,
        value: Box<dyn ErasedComponent>,
    ) -> Result<(), EntityError> {
        self.check_alive()?;
        if self.components.contains_key(&component_id) {
            return Err(EntityError::DuplicateComponent {
                entity: self.id,
                component: component_id,
            });
        }
        self.components.insert(component_id, value);
        Ok(())
    }

    /// Removes and returns the component under `component_id`.
    pub(crate) fn take(&mut self, component_id: ComponentId) -> Option<Box<dyn ErasedComponent>> {
        self.components.remove(&component_id)
    }

    /// Replaces the value under `component_id`, returning the previous one.
    pub(crate) fn overwrite(
        &mut self,
        component_id: ComponentId,
        value: Box<dyn ErasedComponent>,
    ) -> Option<Box<dyn ErasedComponent>> {
        self.components.insert(component_id, value)
    }

    /// Records a message for the current frame.
    pub(crate) fn push_message(
        &mut self,
        message_id: ComponentId,
        value: Box<dyn ErasedComponent>,
    ) -> Result<(), EntityError> {
        self.check_alive()?;
        self.messages.push((message_id, value));
        Ok(())
    }

    /// Clears the frame messages. Called by the world at frame end.
    pub(crate) fn clear_messages(&mut self) {
        self.messages.clear();
    }

    /// Sets the active flag. Returns `true` if the flag changed.
    pub(crate) fn set_active(&mut self, active: bool) -> bool {
        if self.active == active {
            return false;
        }
        self.active = active;
        true
    }

    /// Marks the entity destroyed. Destroyed entities are never reactivated.
    pub(crate) fn mark_destroyed(&mut self) {
        self.destroyed = true;
        self.active = false;
    }

    /// Component ids in descending order, the deterministic destroy order.
    pub(crate) fn component_ids_descending(&self) -> Vec<ComponentId> {
        self.components.keys().rev().copied().collect()
    }

    fn check_alive(&self) -> Result<(), EntityError> {
        if self.destroyed {
            return Err(EntityError::Destroyed { entity: self.id });
        }
        Ok(())
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("components", &self.components.keys().collect::<Vec<_>>())
            .field("active", &self.active)
            .field("destroyed", &self.destroyed)
            .finish()
    }
}
