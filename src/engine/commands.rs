//! Deferred world mutations.
//!
//! State-machine routines run while the world is mid-tick, so they cannot
//! mutate it directly. They record commands into a [`CommandBuffer`] that
//! the world applies at the synchronization point immediately after the
//! state-machine tick, before the late-update phase.

use crate::engine::component::{Bundle, Component};
use crate::engine::error::RegistryError;
use crate::engine::registry::ComponentRegistry;
use crate::engine::types::{ComponentId, EntityId};

type RegisterFn = fn(&mut ComponentRegistry) -> Result<ComponentId, RegistryError>;

/// A single deferred world mutation.
pub enum Command {
    /// Spawn a new entity from a bundle.
    Spawn(Bundle),
    /// Destroy an entity.
    Destroy(EntityId),
    /// Add the bundled components to an entity.
    Add(EntityId, Bundle),
    /// Remove a component type from an entity.
    Remove(EntityId, RegisterFn),
    /// Record a message on an entity.
    SendMessage(EntityId, Bundle),
    /// Flip an entity's active flag.
    SetActive(EntityId, bool),
}

/// Ordered buffer of deferred commands.
#[derive(Default)]
pub struct CommandBuffer {
    pub(crate) commands: Vec<Command>,
}

impl CommandBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defers spawning an entity with the given components.
    pub fn spawn(&mut self, bundle: Bundle) {
        self.commands.push(Command::Spawn(bundle));
    }

    /// Defers destroying `entity`.
    pub fn destroy(&mut self, entity: EntityId) {
        self.commands.push(Command::Destroy(entity));
    }

    /// Defers adding `value` to `entity`.
    pub fn add<T: Component>(&mut self, entity: EntityId, value: T) {
        self.commands.push(Command::Add(entity, Bundle::new().with(value)));
    }

    /// Defers removing component type `T` from `entity`.
    pub fn remove<T: Component>(&mut self, entity: EntityId) {
        self.commands
            .push(Command::Remove(entity, ComponentRegistry::id_of::<T>));
    }

    /// Defers sending `message` to `entity`.
    pub fn send_message<T: Component>(&mut self, entity: EntityId, message: T) {
        self.commands
            .push(Command::SendMessage(entity, Bundle::new().with(message)));
    }

    /// Defers activating `entity`.
    pub fn activate(&mut self, entity: EntityId) {
        self.commands.push(Command::SetActive(entity, true));
    }

    /// Defers deactivating `entity`.
    pub fn deactivate(&mut self, entity: EntityId) {
        self.commands.push(Command::SetActive(entity, false));
    }

    /// Returns the number of deferred commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` if nothing is deferred.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
