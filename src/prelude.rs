//! Convenient re-exports for common docgate types.
pub use crate::{
    api::DocumentApi,
    client::{Document, DocumentSubmitter, HttpSubmitter, SubmitError},
    error::{ConfigError, GateError},
    gate::{AdmissionGate, GateBuilder},
    middleware::GateLayer,
    settings::{ClientConfig, GateConfig, Settings},
    telemetry::{GateEvent, LogSink, MemorySink, NullSink, TelemetrySink},
    window::{RateWindow, TimeUnit},
};
