//! # State-Machine Runtime
//!
//! A cooperative scheduler for per-entity state routines. A routine is a
//! manually encoded resumable object that, each time it is advanced, runs to
//! its next suspension point and yields a [`Wait`] directive describing why
//! it suspended. The runtime resolves directives against the world clock,
//! the frame counter, and the message bus.
//!
//! ## Directive vocabulary
//!
//! - [`Wait::Stop`] — the routine is done; the state machine deactivates
//!   (the component remains, ticking becomes a no-op).
//! - [`Wait::NextFrame`] / [`Wait::Frames`] — resume after the given number
//!   of frames have been ticked (`Frames(0)` is the next frame).
//! - [`Wait::Ms`] — resume once the accumulated elapsed milliseconds reach
//!   the target; any excess is carried into the next wait.
//! - [`Wait::Message`] — resume the frame a message of the given type
//!   arrives on the target entity (defaulting to the owning entity).
//! - [`Wait::Routine`] — push a nested routine; the outer routine resumes
//!   only when the inner one yields `Stop`.
//!
//! ## Mutation discipline
//! Routines advance while the world is mid-tick, so they mutate the world
//! only through the deferred [`CommandBuffer`] exposed by
//! [`RoutineContext`]; the world applies the buffer at the synchronization
//! point after the state-machine tick.

use std::any::TypeId;

use rustc_hash::FxHashMap;

use crate::engine::commands::CommandBuffer;
use crate::engine::component::{Component, ComponentKind};
use crate::engine::registry::ComponentRegistry;
use crate::engine::types::{ComponentId, EntityId, Frame};

/// Reason a state routine yielded.
pub enum Wait {
    /// The routine is finished.
    Stop,
    /// Resume on the next frame.
    NextFrame,
    /// Resume after this many further frames have been ticked (0 is the
    /// next frame).
    Frames(u32),
    /// Resume once this many milliseconds have accumulated.
    Ms(u64),
    /// Resume when a message of this type arrives on the target entity.
    Message {
        /// Message component id.
        message: ComponentId,
        /// Entity the message must arrive on; `None` means the owner.
        target: Option<EntityId>,
    },
    /// Run a nested routine to completion, then resume.
    Routine(Box<dyn Routine>),
}

impl Wait {
    /// A millisecond wait built from seconds; the conversion happens here,
    /// at construction.
    pub fn seconds(seconds: f64) -> Wait {
        Wait::Ms((seconds * 1000.0) as u64)
    }
}

impl PartialEq for Wait {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Wait::Stop, Wait::Stop) => true,
            (Wait::NextFrame, Wait::NextFrame) => true,
            (Wait::Frames(a), Wait::Frames(b)) => a == b,
            (Wait::Ms(a), Wait::Ms(b)) => a == b,
            (
                Wait::Message { message: a, target: ta },
                Wait::Message { message: b, target: tb },
            ) => a == b && ta == tb,
            // Nested routines carry state; no two are ever the same wait.
            _ => false,
        }
    }
}

impl std::fmt::Debug for Wait {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Wait::Stop => f.write_str("Stop"),
            Wait::NextFrame => f.write_str("NextFrame"),
            Wait::Frames(n) => write!(f, "Frames({n})"),
            Wait::Ms(n) => write!(f, "Ms({n})"),
            Wait::Message { message, target } => {
                write!(f, "Message({message}, {target:?})")
            }
            Wait::Routine(inner) => write!(f, "Routine({})", inner.name()),
        }
    }
}

/// A resumable state routine.
///
/// Implementations encode their suspension points as explicit state: each
/// call to [`Routine::advance`] performs the work up to the next yield and
/// returns the wait directive for it.
pub trait Routine: Send + Sync {
    /// Externally visible state name. State-change subscribers are notified
    /// whenever the name at the top of the routine stack changes.
    fn name(&self) -> &str {
        "routine"
    }

    /// Runs to the next suspension point and returns the new wait.
    fn advance(&mut self, cx: &mut RoutineContext<'_>) -> Wait;
}

/// Per-world intern table for wait construction.
///
/// Owned by the world (never global, so worlds do not share state). The
/// canonical per-ms and per-frame waits are value-semantic in Rust —
/// equality holds structurally — so what the table memoizes is the
/// per-message-type id resolution routines would otherwise repeat against
/// the registry.
#[derive(Default)]
pub struct WaitCache {
    message_ids: FxHashMap<TypeId, ComponentId>,
}

impl WaitCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical wait for `n` milliseconds.
    pub fn ms(&self, n: u64) -> Wait {
        Wait::Ms(n)
    }

    /// Canonical wait for `n` further frames.
    pub fn frames(&self, n: u32) -> Wait {
        Wait::Frames(n)
    }

    /// Canonical wait for a message of type `M`, resolving and memoizing its
    /// component id.
    pub fn message<M: Component>(
        &mut self,
        registry: &mut ComponentRegistry,
        target: Option<EntityId>,
    ) -> Wait {
        let message = match self.message_ids.entry(TypeId::of::<M>()) {
            std::collections::hash_map::Entry::Occupied(slot) => *slot.get(),
            std::collections::hash_map::Entry::Vacant(slot) => match registry.id_of::<M>() {
                Ok(id) => *slot.insert(id),
                Err(error) => {
                    tracing::warn!(%error, "message wait could not resolve an id; stopping routine");
                    return Wait::Stop;
                }
            },
        };
        Wait::Message { message, target }
    }
}

/// Execution context handed to a routine on each advance.
pub struct RoutineContext<'a> {
    entity: EntityId,
    frame: Frame,
    commands: &'a mut CommandBuffer,
    registry: &'a mut ComponentRegistry,
    waits: &'a mut WaitCache,
}

impl<'a> RoutineContext<'a> {
    pub(crate) fn new(
        entity: EntityId,
        frame: Frame,
        commands: &'a mut CommandBuffer,
        registry: &'a mut ComponentRegistry,
        waits: &'a mut WaitCache,
    ) -> Self {
        Self { entity, frame, commands, registry, waits }
    }

    /// The entity owning this routine.
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// The current frame.
    pub fn frame(&self) -> Frame {
        self.frame
    }

    /// Deferred world mutations, applied after the state-machine tick.
    pub fn commands(&mut self) -> &mut CommandBuffer {
        self.commands
    }

    /// Wait for a message of type `M` on the owning entity.
    pub fn wait_for_message<M: Component>(&mut self) -> Wait {
        self.waits.message::<M>(self.registry, None)
    }

    /// Wait for a message of type `M` on `target`.
    pub fn wait_for_message_from<M: Component>(&mut self, target: EntityId) -> Wait {
        self.waits.message::<M>(self.registry, Some(target))
    }
}

enum Pending {
    /// Advance on the next tick; the initial state.
    Ready,
    /// Resume when the counter reaches zero.
    Frames(u32),
    /// Resume when the shared accumulator reaches this many milliseconds.
    Ms(u64),
    /// Resume when the message flag is raised.
    Message,
    /// The routine stack ran out; ticking is a no-op.
    Stopped,
}

/// Message interest to register with the world, produced by a tick.
pub(crate) struct MessageInterest {
    pub(crate) target: Option<EntityId>,
    pub(crate) message: ComponentId,
}

type NameSubscriber = Box<dyn FnMut(&str) + Send + Sync>;

/// State-machine carrier component.
///
/// Wraps a routine stack and the bookkeeping needed to resolve wait
/// directives. Attach at most one per entity; all state-machine carriers
/// share the reserved component id.
pub struct StateMachine {
    stack: Vec<Box<dyn Routine>>,
    pending: Pending,
    ms_accumulator: u64,
    message_flag: bool,
    interest_registered: bool,
    visible_name: String,
    subscribers: Vec<Option<NameSubscriber>>,
}

impl Component for StateMachine {
    const KIND: ComponentKind = ComponentKind::StateMachine;
    const PERSIST: bool = false;
}

impl StateMachine {
    /// Creates a state machine that will run `routine`.
    pub fn new(routine: impl Routine + 'static) -> Self {
        let visible_name = routine.name().to_string();
        Self {
            stack: vec![Box::new(routine)],
            pending: Pending::Ready,
            ms_accumulator: 0,
            message_flag: false,
            interest_registered: false,
            visible_name,
            subscribers: Vec::new(),
        }
    }

    /// Externally visible name of the current state.
    pub fn name(&self) -> &str {
        &self.visible_name
    }

    /// Returns `true` while the routine stack has more work.
    pub fn is_active(&self) -> bool {
        !matches!(self.pending, Pending::Stopped)
    }

    /// Milliseconds accumulated toward the current (or next) ms wait.
    pub fn accumulated_ms(&self) -> u64 {
        self.ms_accumulator
    }

    /// Subscribes to visible-name changes; returns an unsubscribe token.
    pub fn subscribe(&mut self, callback: impl FnMut(&str) + Send + Sync + 'static) -> usize {
        self.subscribers.push(Some(Box::new(callback)));
        self.subscribers.len() - 1
    }

    /// Removes a subscription by token. No-op for stale tokens.
    pub fn unsubscribe(&mut self, token: usize) {
        if let Some(slot) = self.subscribers.get_mut(token) {
            *slot = None;
        }
    }

    /// Raises the message flag; the routine resumes at this frame's tick.
    pub(crate) fn notify_message_arrived(&mut self) {
        if matches!(self.pending, Pending::Message) {
            self.message_flag = true;
        }
    }

    /// Releases routine state when the owning entity is destroyed.
    pub(crate) fn on_destroyed(&mut self) {
        self.stack.clear();
        self.subscribers.clear();
        self.pending = Pending::Stopped;
    }

    /// Resolves the current wait against one tick.
    ///
    /// Returns a message interest to register when the routine suspended on
    /// a message wait it had not yet announced.
    pub(crate) fn tick(
        &mut self,
        elapsed_ms: u64,
        cx: &mut RoutineContext<'_>,
    ) -> Option<MessageInterest> {
        let resume = match &mut self.pending {
            Pending::Stopped => return None,
            Pending::Ready => true,
            Pending::Frames(remaining) => {
                *remaining -= 1;
                *remaining == 0
            }
            Pending::Ms(required) => {
                self.ms_accumulator += elapsed_ms;
                if self.ms_accumulator >= *required {
                    self.ms_accumulator -= *required;
                    true
                } else {
                    false
                }
            }
            Pending::Message => {
                if self.message_flag {
                    self.message_flag = false;
                    self.interest_registered = false;
                    true
                } else {
                    false
                }
            }
        };

        if !resume {
            return None;
        }
        self.advance(cx)
    }

    /// Advances the top routine until a real suspension point, handling
    /// nested pushes and stop-pops in the same tick.
    fn advance(&mut self, cx: &mut RoutineContext<'_>) -> Option<MessageInterest> {
        loop {
            let Some(top) = self.stack.last_mut() else {
                self.pending = Pending::Stopped;
                return None;
            };

            let wait = top.advance(cx);
            self.refresh_name();

            match wait {
                Wait::Stop => {
                    self.stack.pop();
                    if self.stack.is_empty() {
                        self.pending = Pending::Stopped;
                        return None;
                    }
                    // The outer routine resumes the tick its inner stopped.
                }
                Wait::Routine(inner) => {
                    self.stack.push(inner);
                    self.refresh_name();
                }
                Wait::NextFrame => {
                    self.pending = Pending::Frames(1);
                    return None;
                }
                Wait::Frames(n) => {
                    self.pending = Pending::Frames(n + 1);
                    return None;
                }
                Wait::Ms(n) => {
                    self.pending = Pending::Ms(n);
                    return None;
                }
                Wait::Message { message, target } => {
                    self.pending = Pending::Message;
                    self.message_flag = false;
                    if !self.interest_registered {
                        self.interest_registered = true;
                        return Some(MessageInterest { target, message });
                    }
                    return None;
                }
            }
        }
    }

    fn refresh_name(&mut self) {
        let name = self.stack.last().map(|r| r.name()).unwrap_or("");
        if name != self.visible_name {
            self.visible_name = name.to_string();
            let visible = std::mem::take(&mut self.visible_name);
            for slot in &mut self.subscribers {
                if let Some(callback) = slot {
                    callback(&visible);
                }
            }
            self.visible_name = visible;
        }
    }
}
