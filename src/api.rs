//! Rate-limited document submission.
//!
//! [`DocumentApi`] puts an [`AdmissionGate`] in front of a
//! [`DocumentSubmitter`]: every call waits for a permit, then makes exactly
//! one submission attempt. Permits are spent on attempts, so a failed
//! submission still counts against the rate.

use crate::client::{Document, DocumentSubmitter, SubmitError};
use crate::error::GateError;
use crate::gate::AdmissionGate;
use crate::settings::GateConfig;
use crate::telemetry::{GateEvent, NullSink, SubmissionOutcome, TelemetrySink};
use std::future::Future;
use tokio::time::Instant;

/// Client for the document endpoint, limited to a fixed number of attempts
/// per window.
#[derive(Debug, Clone)]
pub struct DocumentApi<C, S = NullSink> {
    gate: AdmissionGate<S>,
    client: C,
}

impl<C> DocumentApi<C, NullSink>
where
    C: DocumentSubmitter,
{
    /// Build the gate described by `config` and guard `client` with it.
    ///
    /// # Errors
    /// `GateError::InvalidConfiguration` if the request limit is not positive,
    /// the window is empty, or no tokio runtime is running.
    pub fn new(config: &GateConfig, client: C) -> Result<Self, GateError<SubmitError>> {
        let capacity = config.capacity()?;
        let gate = AdmissionGate::new(config.window(), capacity).map_err(GateError::widen)?;
        Ok(Self { gate, client })
    }
}

impl<C, S> DocumentApi<C, S>
where
    C: DocumentSubmitter,
    S: TelemetrySink,
    S::Future: Send + 'static,
{
    /// Guard `client` with an existing gate.
    pub fn with_gate(gate: AdmissionGate<S>, client: C) -> Self {
        Self { gate, client }
    }

    /// Wait for admission, then submit `document` once.
    ///
    /// # Errors
    /// - `GateError::Closed` after [`shutdown`](Self::shutdown).
    /// - `GateError::SubmissionFailed` with the client's error. The permit is
    ///   not refunded.
    pub async fn submit_document(
        &self,
        document: &Document,
        signature: &str,
    ) -> Result<(), GateError<SubmitError>> {
        self.submit_document_until(document, signature, std::future::pending::<()>()).await
    }

    /// Like [`submit_document`](Self::submit_document), but stops waiting for
    /// admission with `GateError::Interrupted` once `cancel` completes.
    ///
    /// Cancellation only covers the wait; an admitted submission runs to
    /// completion.
    pub async fn submit_document_until<F>(
        &self,
        document: &Document,
        signature: &str,
        cancel: F,
    ) -> Result<(), GateError<SubmitError>>
    where
        F: Future,
    {
        self.gate.acquire_until(cancel).await.map_err(GateError::widen)?;

        let started = Instant::now();
        match self.client.submit(document, signature).await {
            Ok(()) => {
                let duration = started.elapsed();
                self.gate.emit(GateEvent::Submission(SubmissionOutcome::Success { duration }));
                Ok(())
            }
            Err(err) => {
                let duration = started.elapsed();
                tracing::warn!(error = %err, doc_id = ?document.doc_id, "document submission failed");
                self.gate.emit(GateEvent::Submission(SubmissionOutcome::Failure { duration }));
                Err(GateError::SubmissionFailed(err))
            }
        }
    }

    /// Stop admitting submissions. Queued callers fail with `GateError::Closed`;
    /// submissions already admitted are not waited for.
    pub fn shutdown(&self) -> bool {
        self.gate.shutdown()
    }

    pub fn gate(&self) -> &AdmissionGate<S> {
        &self.gate
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}
