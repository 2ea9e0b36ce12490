//! Telemetry for the admission gate.
//!
//! The gate and the document API emit structured [`GateEvent`]s. Events flow
//! through [`TelemetrySink`] implementations, which are plain
//! `tower::Service<GateEvent>`s, so they can be logged, kept in memory for
//! tests, or forwarded elsewhere.
//!
//! Emission is best-effort: a sink that is not ready or fails never affects
//! admission.

pub mod events;
pub mod sinks;

pub use events::{AdmissionEvent, GateEvent, LifecycleEvent, SubmissionOutcome};
#[cfg(feature = "telemetry-json")]
pub use events::event_to_json;
pub use sinks::{emit_best_effort, try_emit, LogSink, MemorySink, NullSink, TelemetrySink};
