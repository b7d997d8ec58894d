//! Interaction runtime.
//!
//! An interactive component owns an effect object. Interacting applies the
//! effect synchronously within the caller's tick; the effect is free to
//! mutate either entity, and watcher-queued notifications it produces are
//! delivered at the frame's reactive drain, after the caller's dispatch.

use std::sync::Arc;

use crate::engine::component::{Component, ComponentKind};
use crate::engine::types::EntityId;
use crate::engine::world::World;

/// An effect dispatched from one entity to another.
pub trait Interaction: Send + Sync {
    /// Applies the effect. `interactor` initiated the interaction;
    /// `interacted` carries the interactive component, when known.
    fn interact(&self, world: &mut World, interactor: EntityId, interacted: Option<EntityId>);
}

/// Interactive carrier component.
///
/// All interactive carriers share the reserved interactive component id, so
/// a context can filter for "any interactive" without enumerating effect
/// types.
pub struct Interactive {
    effect: Arc<dyn Interaction>,
}

impl Component for Interactive {
    const KIND: ComponentKind = ComponentKind::Interactive;
    const PERSIST: bool = false;
}

impl Interactive {
    /// Wraps an effect.
    pub fn new(effect: impl Interaction + 'static) -> Self {
        Self { effect: Arc::new(effect) }
    }

    /// Shared handle to the effect, cloned so the world stays mutable while
    /// the effect runs.
    pub(crate) fn effect(&self) -> Arc<dyn Interaction> {
        self.effect.clone()
    }
}
