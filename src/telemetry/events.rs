use std::fmt;
use std::time::Duration;

#[cfg(feature = "telemetry-json")]
use crate::window::clamp_u64;
#[cfg(feature = "telemetry-json")]
use serde_json::json;

/// Gate events emitted during admission and submission.
///
/// Events describe what the gate did, not why; sinks decide whether to log,
/// count, or forward them.
#[derive(Debug, Clone, PartialEq)]
pub enum GateEvent {
    /// Permit admission events
    Admission(AdmissionEvent),
    /// Gate lifecycle and refill events
    Lifecycle(LifecycleEvent),
    /// Outcome of a guarded submission
    Submission(SubmissionOutcome),
}

/// Events emitted while callers acquire permits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionEvent {
    /// A caller obtained a permit.
    Granted {
        /// Permits left in the pool after this grant
        available: usize,
        /// Pool capacity
        capacity: usize,
        /// Time spent queued (zero on the fast path)
        waited: Duration,
    },
    /// A caller found the pool empty and joined the wait queue.
    Queued {
        /// Number of callers waiting, including this one
        waiting: usize,
    },
    /// A caller was refused because the gate is shut down.
    Rejected,
    /// A queued caller stopped waiting before a permit arrived.
    Interrupted {
        /// Time spent queued before cancellation
        waited: Duration,
    },
}

/// Events describing the gate itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The refill task started.
    Started {
        /// Pool capacity
        capacity: usize,
        /// Period between single-permit refills
        refill_interval: Duration,
    },
    /// A refill tick produced a permit.
    ///
    /// Not emitted for ticks that found the pool already full.
    Replenished {
        /// Permits available after the tick
        available: usize,
        /// Whether the permit went straight to a queued caller
        handed_off: bool,
    },
    /// The gate was shut down.
    ShutDown {
        /// Queued callers released with a closed error
        released: usize,
    },
}

/// Outcome of a submission that was admitted by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// The collaborator reported success.
    Success {
        /// Time spent in the collaborator
        duration: Duration,
    },
    /// The collaborator reported failure.
    Failure {
        /// Time spent in the collaborator
        duration: Duration,
    },
}

impl fmt::Display for GateEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateEvent::Admission(event) => write!(f, "Admission::{}", event),
            GateEvent::Lifecycle(event) => write!(f, "Lifecycle::{}", event),
            GateEvent::Submission(event) => write!(f, "Submission::{}", event),
        }
    }
}

impl fmt::Display for AdmissionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdmissionEvent::Granted { available, capacity, waited } => {
                write!(f, "Granted({}/{}, waited={:?})", available, capacity, waited)
            }
            AdmissionEvent::Queued { waiting } => write!(f, "Queued(waiting={})", waiting),
            AdmissionEvent::Rejected => write!(f, "Rejected"),
            AdmissionEvent::Interrupted { waited } => {
                write!(f, "Interrupted(waited={:?})", waited)
            }
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleEvent::Started { capacity, refill_interval } => {
                write!(f, "Started(capacity={}, interval={:?})", capacity, refill_interval)
            }
            LifecycleEvent::Replenished { available, handed_off } => {
                write!(f, "Replenished(available={}, handed_off={})", available, handed_off)
            }
            LifecycleEvent::ShutDown { released } => write!(f, "ShutDown(released={})", released),
        }
    }
}

impl fmt::Display for SubmissionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionOutcome::Success { duration } => {
                write!(f, "Success(duration={:?})", duration)
            }
            SubmissionOutcome::Failure { duration } => {
                write!(f, "Failure(duration={:?})", duration)
            }
        }
    }
}

/// Convert a GateEvent into a JSON value for sinks.
#[cfg(feature = "telemetry-json")]
pub fn event_to_json(event: &GateEvent) -> serde_json::Value {
    match event {
        GateEvent::Admission(a) => match a {
            AdmissionEvent::Granted { available, capacity, waited } => json!({
                "kind": "permit_granted",
                "available": *available,
                "capacity": *capacity,
                "waited_ms": clamp_u64(waited.as_millis()),
            }),
            AdmissionEvent::Queued { waiting } => {
                json!({ "kind": "permit_queued", "waiting": *waiting })
            }
            AdmissionEvent::Rejected => json!({ "kind": "permit_rejected" }),
            AdmissionEvent::Interrupted { waited } => json!({
                "kind": "permit_interrupted",
                "waited_ms": clamp_u64(waited.as_millis()),
            }),
        },
        GateEvent::Lifecycle(l) => match l {
            LifecycleEvent::Started { capacity, refill_interval } => json!({
                "kind": "gate_started",
                "capacity": *capacity,
                "refill_interval_ns": clamp_u64(refill_interval.as_nanos()),
            }),
            LifecycleEvent::Replenished { available, handed_off } => json!({
                "kind": "gate_replenished",
                "available": *available,
                "handed_off": *handed_off,
            }),
            LifecycleEvent::ShutDown { released } => {
                json!({ "kind": "gate_shutdown", "released": *released })
            }
        },
        GateEvent::Submission(s) => match s {
            SubmissionOutcome::Success { duration } => json!({
                "kind": "submission_success",
                "duration_ms": clamp_u64(duration.as_millis()),
            }),
            SubmissionOutcome::Failure { duration } => json!({
                "kind": "submission_failure",
                "duration_ms": clamp_u64(duration.as_millis()),
            }),
        },
    }
}
