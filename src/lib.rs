#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # docgate
//!
//! Client-side rate limiting for a document-submission endpoint.
//!
//! ## Features
//!
//! - **Admission gate** with a fixed permit ceiling per time window
//! - **FIFO queueing** of callers while the pool is empty
//! - **Drip refill** of one permit per `window / capacity`
//! - **Clean shutdown** that releases every queued caller
//! - **Tower middleware** for guarding arbitrary services
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docgate::{ClientConfig, Document, DocumentApi, GateConfig, HttpSubmitter, TimeUnit};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = HttpSubmitter::new(ClientConfig::new(
//!         "https://api.example/api/v3/lk/documents/create",
//!         "token",
//!     ))?;
//!     let api = DocumentApi::new(&GateConfig::new(TimeUnit::Seconds, 10), client)?;
//!
//!     api.submit_document(&Document::default(), "signature").await?;
//!     api.shutdown();
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod client;
pub mod error;
pub mod gate;
pub mod middleware;
pub mod prelude;
pub mod settings;
pub mod telemetry;
pub mod window;

// Re-exports
pub use api::DocumentApi;
pub use client::{
    Description, Document, DocumentSubmitter, HttpSubmitter, Product, SubmissionBody, SubmitError,
};
pub use error::{ConfigError, GateError};
pub use gate::{AdmissionGate, GateBuilder, GateSnapshot, MAX_CAPACITY};
pub use middleware::{GateLayer, GateService};
pub use settings::{ClientConfig, GateConfig, Settings};
pub use window::{RateWindow, TimeUnit};
