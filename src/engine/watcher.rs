//! # Component Watchers
//!
//! A watcher batches the change notifications of one component id within one
//! context, deduplicating per entity and per kind, and applying the
//! added/removed cancellation rules before anything reaches a reactive
//! system.
//!
//! ## Purpose
//! Reactive systems do not poll; they consume the batched notifications a
//! watcher accumulated over the frame. Batching happens at enqueue time so
//! the reactive drain is a straight walk over already-coalesced buckets.
//!
//! ## Concurrency
//! The pending-notification table is the only state in the runtime a
//! non-owning thread may legally touch: an event handler marshaled in from
//! another thread may enqueue a notification. The table is guarded by a
//! per-watcher mutex; the shared pending-work list the watcher marks on
//! first enqueue is guarded the same way. Context sets and entity state
//! remain owning-thread only.
//!
//! ## Cancellation
//! - *removed* with a pending *added* for the same entity erases the
//!   *added*; the pair cancels entirely unless the removal was caused by
//!   destruction, in which case *removed* is still recorded so
//!   removal-watching systems see the final state.
//! - *disabled* with a pending *added* erases the *added* and records
//!   nothing; the entity was born into anonymity. A pending *modified*
//!   deliberately survives deactivation.

use std::sync::{Arc, Mutex};

use rustc_hash::FxHashSet;

use crate::engine::types::{ComponentId, ContextId, EntityId, NotificationKind, WatcherId};

/// Shared list of watchers with pending work, drained by the world at the
/// end of each frame.
pub type PendingWork = Arc<Mutex<FxHashSet<WatcherId>>>;

/// One insertion-ordered, deduplicated notification bucket.
#[derive(Default, Debug, Clone)]
pub struct Bucket {
    order: Vec<EntityId>,
    members: FxHashSet<EntityId>,
}

impl Bucket {
    fn insert(&mut self, entity: EntityId) {
        if self.members.insert(entity) {
            self.order.push(entity);
        }
    }

    fn erase(&mut self, entity: EntityId) -> bool {
        if self.members.remove(&entity) {
            self.order.retain(|&e| e != entity);
            true
        } else {
            false
        }
    }

    fn contains(&self, entity: EntityId) -> bool {
        self.members.contains(&entity)
    }

    /// Entities in insertion order.
    pub fn entities(&self) -> &[EntityId] {
        &self.order
    }

    /// Returns `true` if the bucket holds no entities.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn retain(&mut self, mut keep: impl FnMut(EntityId) -> bool) {
        self.order.retain(|&e| {
            if keep(e) {
                true
            } else {
                self.members.remove(&e);
                false
            }
        });
    }
}

/// The per-frame notification table of one watcher.
#[derive(Default, Debug, Clone)]
pub struct PendingNotifications {
    buckets: [Bucket; 5],
}

impl PendingNotifications {
    /// Returns the bucket for `kind`.
    pub fn bucket(&self, kind: NotificationKind) -> &Bucket {
        &self.buckets[kind.index()]
    }

    /// Returns `true` if every bucket is empty.
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Bucket::is_empty)
    }

    fn bucket_mut(&mut self, kind: NotificationKind) -> &mut Bucket {
        &mut self.buckets[kind.index()]
    }
}

/// Batched notification fan-out keyed by (context, component id).
pub struct ComponentWatcher {
    id: WatcherId,
    context: ContextId,
    component: ComponentId,
    pending: Mutex<PendingNotifications>,
    work: PendingWork,
    subscribers: Vec<usize>,
}

impl ComponentWatcher {
    pub(crate) fn new(
        id: WatcherId,
        context: ContextId,
        component: ComponentId,
        work: PendingWork,
    ) -> Self {
        Self {
            id,
            context,
            component,
            pending: Mutex::new(PendingNotifications::default()),
            work,
            subscribers: Vec::new(),
        }
    }

    /// Watcher id in the world's registration order.
    #[inline]
    pub fn id(&self) -> WatcherId {
        self.id
    }

    /// Context this watcher is attached to.
    #[inline]
    pub fn context(&self) -> ContextId {
        self.context
    }

    /// Component id this watcher observes.
    #[inline]
    pub fn component(&self) -> ComponentId {
        self.component
    }

    pub(crate) fn subscribe_system(&mut self, system_index: usize) {
        if !self.subscribers.contains(&system_index) {
            self.subscribers.push(system_index);
        }
    }

    /// Indices of subscribing reactive systems, in registration order.
    pub(crate) fn subscribers(&self) -> &[usize] {
        &self.subscribers
    }

    /// Enqueues a notification, applying deduplication and cancellation.
    ///
    /// Safe to call from a non-owning thread; this is the one legal
    /// cross-thread entry point of the runtime.
    pub fn queue(&self, kind: NotificationKind, entity: EntityId, caused_by_destroy: bool) {
        let mut pending = self.pending.lock().expect("watcher lock poisoned");

        match kind {
            NotificationKind::Removed => {
                let cancelled = pending.bucket_mut(NotificationKind::Added).erase(entity);
                if cancelled && !caused_by_destroy {
                    // The pair cancels; the observer never saw the entity.
                    return;
                }
            }
            NotificationKind::Disabled => {
                if pending.bucket_mut(NotificationKind::Added).erase(entity) {
                    // Born into anonymity: the pending *modified*, if any,
                    // is deliberately left in place.
                    return;
                }
            }
            _ => {}
        }

        let bucket = pending.bucket_mut(kind);
        if bucket.is_empty() {
            self.work.lock().expect("pending-work lock poisoned").insert(self.id);
        }
        bucket.insert(entity);
    }

    /// Atomically takes and clears the pending table.
    ///
    /// Entities for which `destroyed` returns `true` are filtered out of
    /// every bucket except *removed*: removals of destroyed entities are
    /// always delivered.
    pub fn pop_notifications(
        &self,
        mut destroyed: impl FnMut(EntityId) -> bool,
    ) -> PendingNotifications {
        let mut taken = {
            let mut pending = self.pending.lock().expect("watcher lock poisoned");
            std::mem::take(&mut *pending)
        };
        for kind in NotificationKind::DRAIN_ORDER {
            if kind == NotificationKind::Removed {
                continue;
            }
            taken.bucket_mut(kind).retain(|e| !destroyed(e));
        }
        taken
    }

    /// Returns `true` if any bucket references `entity`.
    pub fn references(&self, entity: EntityId) -> bool {
        let pending = self.pending.lock().expect("watcher lock poisoned");
        NotificationKind::DRAIN_ORDER
            .iter()
            .any(|&kind| pending.bucket(kind).contains(entity))
    }
}
