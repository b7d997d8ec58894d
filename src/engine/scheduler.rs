//! System scheduling and phase lists.
//!
//! This module is responsible for:
//! * grouping systems into per-phase execution lists in registration order,
//! * answering, per system and phase, whether the pause rules allow a run.
//!
//! ## Ordering model
//!
//! Registration order is execution order within every phase. A system that
//! declares `requires(S)` must appear strictly after `S`; the world rejects
//! the list otherwise, before anything reaches the scheduler. There is no
//! access-conflict analysis: the pipeline is single-threaded and
//! deterministic by construction.

use std::any::TypeId;

use rustc_hash::FxHashMap;

use crate::engine::systems::System;
use crate::engine::types::{ComponentId, ContextId, PauseMode, Phase, SystemId};

/// One registered system with its resolved wiring.
pub(crate) struct SystemEntry {
    /// The system object; `None` while the slot is borrowed for execution.
    pub(crate) system: Option<Box<dyn System>>,
    pub(crate) name: &'static str,
    pub(crate) type_id: TypeId,
    pub(crate) id: SystemId,
    pub(crate) context: ContextId,
    pub(crate) pause: PauseMode,
    pub(crate) enabled: bool,
    /// Message ids this system consumes, in declaration order.
    pub(crate) messages: Vec<ComponentId>,
}

/// Registration-ordered system table with per-phase index lists.
#[derive(Default)]
pub(crate) struct Scheduler {
    entries: Vec<SystemEntry>,
    by_type: FxHashMap<TypeId, usize>,
    phase_lists: FxHashMap<Phase, Vec<usize>>,
}

impl Scheduler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends a validated entry. Duplicate and `requires` checks happen at
    /// world construction, before any entry reaches the scheduler.
    pub(crate) fn push(&mut self, entry: SystemEntry, phases: &[Phase]) {
        let index = self.entries.len();
        self.by_type.insert(entry.type_id, index);
        for &phase in phases {
            self.phase_lists.entry(phase).or_default().push(index);
        }
        self.entries.push(entry);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Indices of the systems declared for `phase`, registration order.
    pub(crate) fn phase_indices(&self, phase: Phase) -> Vec<usize> {
        self.phase_lists.get(&phase).cloned().unwrap_or_default()
    }

    pub(crate) fn entry(&self, index: usize) -> &SystemEntry {
        &self.entries[index]
    }

    pub(crate) fn index_of(&self, type_id: TypeId) -> Option<usize> {
        self.by_type.get(&type_id).copied()
    }

    pub(crate) fn set_enabled(&mut self, index: usize, enabled: bool) {
        self.entries[index].enabled = enabled;
    }

    /// Borrows the system object out of its slot for execution.
    pub(crate) fn take_system(&mut self, index: usize) -> Option<Box<dyn System>> {
        self.entries[index].system.take()
    }

    /// Returns a borrowed system object to its slot.
    pub(crate) fn put_system(&mut self, index: usize, system: Box<dyn System>) {
        self.entries[index].system = Some(system);
    }

    /// Applies the enable flag and pause rules for one system and phase.
    ///
    /// Render systems always run. Update-family phases consult the pause
    /// mode: pausable systems are skipped while paused, include-on-pause
    /// systems always run, on-pause systems run only while paused. Startup
    /// and reactive phases are unaffected by pause.
    pub(crate) fn should_run(&self, index: usize, phase: Phase, paused: bool) -> bool {
        let entry = &self.entries[index];
        if !entry.enabled {
            return false;
        }
        match phase {
            Phase::EarlyStart | Phase::Start | Phase::Reactive | Phase::Render => true,
            Phase::Update | Phase::FixedUpdate | Phase::LateUpdate => match entry.pause {
                PauseMode::Pausable => !paused,
                PauseMode::IncludeOnPause => true,
                PauseMode::OnPause => paused,
            },
        }
    }
}
