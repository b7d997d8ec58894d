//! Per-system timing sinks.
//!
//! After every system execution the world reports
//! `(system id, phase, elapsed milliseconds, entity count)` to the installed
//! sink. The default sink is a no-op, so the cost of the surface when unused
//! is one virtual call per system per phase.
//!
//! Usage:
//!   let sink = Arc::new(AggregateSink::default());
//!   world.set_timing_sink(sink.clone());
//!   // run frames...
//!   let report = sink.report();

use std::sync::Mutex;

use rustc_hash::FxHashMap;

use crate::engine::types::{Phase, SystemId};

/// Receiver of per-system timing records.
///
/// Implementations must tolerate being called once per system per phase per
/// frame; keep `record` cheap.
pub trait TimingSink: Send + Sync {
    /// Reports one system execution.
    fn record(&self, system: SystemId, phase: Phase, elapsed_ms: f64, entity_count: usize);
}

/// Sink that discards every record. The default.
#[derive(Default, Clone, Copy, Debug)]
pub struct NoopSink;

impl TimingSink for NoopSink {
    #[inline]
    fn record(&self, _system: SystemId, _phase: Phase, _elapsed_ms: f64, _entity_count: usize) {}
}

/// Accumulated timings of one (system, phase) pair.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TimingRecord {
    /// Number of executions recorded.
    pub calls: u64,
    /// Total elapsed milliseconds across executions.
    pub total_ms: f64,
    /// Entity count reported by the most recent execution.
    pub last_entity_count: usize,
}

/// Sink that aggregates records per (system, phase).
///
/// Interior mutability keeps [`TimingSink::record`] callable behind a shared
/// reference from the frame pipeline.
#[derive(Default)]
pub struct AggregateSink {
    records: Mutex<FxHashMap<(SystemId, Phase), TimingRecord>>,
}

impl AggregateSink {
    /// Creates an empty aggregating sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the accumulated records.
    pub fn report(&self) -> FxHashMap<(SystemId, Phase), TimingRecord> {
        self.records.lock().expect("timing sink lock poisoned").clone()
    }

    /// Returns the record of one (system, phase) pair, if any execution was
    /// recorded.
    pub fn get(&self, system: SystemId, phase: Phase) -> Option<TimingRecord> {
        self.records
            .lock()
            .expect("timing sink lock poisoned")
            .get(&(system, phase))
            .copied()
    }
}

impl TimingSink for AggregateSink {
    fn record(&self, system: SystemId, phase: Phase, elapsed_ms: f64, entity_count: usize) {
        let mut records = self.records.lock().expect("timing sink lock poisoned");
        let record = records.entry((system, phase)).or_default();
        record.calls += 1;
        record.total_ms += elapsed_ms;
        record.last_entity_count = entity_count;
    }
}
