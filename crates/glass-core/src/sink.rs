//! The outbound message sink capability.
//!
//! spec.md §9: "Replace [the] ambient global sink with an injected sink
//! capability (a function or interface) owned by the orchestrator and
//! passed to HypoList." JSON serialization of the emitted message is out
//! of scope for the core (spec.md §1); the core only hands the sink a
//! `HypoMessage`/`CancelMessage` value.

/// A promoted hypocenter, ready to be serialized and emitted (spec.md §6).
#[derive(Debug, Clone, PartialEq)]
pub struct HypoMessage {
    pub pid: String,
    pub time_sec: f64,
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub depth_km: f64,
    pub bayes: f64,
    pub number_of_associated_data: usize,
    pub data_pick_ids: Vec<u64>,
}

/// A hypo cancellation notice (spec.md §6).
#[derive(Debug, Clone, PartialEq)]
pub struct CancelMessage {
    pub pid: String,
    pub reason: String,
}

/// Implemented by whatever forwards engine output to the outside world.
/// Mirrors spec.md §1's "message sink" external collaborator: "a single
/// 'emit-hypo' call."
pub trait MessageSink: Send + Sync {
    fn emit_hypo(&self, msg: HypoMessage);
    fn emit_cancel(&self, msg: CancelMessage);
}

/// A sink that drops everything. Useful for tests and for components that
/// haven't been wired to a real transport yet.
#[derive(Debug, Default)]
pub struct NullSink;

impl MessageSink for NullSink {
    fn emit_hypo(&self, _msg: HypoMessage) {}
    fn emit_cancel(&self, _msg: CancelMessage) {}
}

/// A sink that records everything it's given, for tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub hypos: parking_lot::Mutex<Vec<HypoMessage>>,
    pub cancels: parking_lot::Mutex<Vec<CancelMessage>>,
}

impl MessageSink for RecordingSink {
    fn emit_hypo(&self, msg: HypoMessage) {
        self.hypos.lock().push(msg);
    }
    fn emit_cancel(&self, msg: CancelMessage) {
        self.cancels.lock().push(msg);
    }
}
