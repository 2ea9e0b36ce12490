use crate::error::GateError;
use crate::gate::AdmissionGate;
use crate::telemetry::{NullSink, TelemetrySink};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

/// A layer that admits requests through an [`AdmissionGate`].
///
/// Each request waits for a permit before reaching the inner service. An
/// inner-service error is surfaced as `GateError::SubmissionFailed`.
#[derive(Clone, Debug)]
pub struct GateLayer<S = NullSink> {
    gate: AdmissionGate<S>,
}

impl<S> GateLayer<S> {
    /// Create a new gate layer; services built from it share `gate`.
    pub fn new(gate: AdmissionGate<S>) -> Self {
        Self { gate }
    }
}

impl<Svc, S> Layer<Svc> for GateLayer<S> {
    type Service = GateService<Svc, S>;

    fn layer(&self, service: Svc) -> Self::Service {
        GateService { inner: service, gate: self.gate.clone() }
    }
}

/// Middleware service produced by [`GateLayer`].
#[derive(Clone, Debug)]
pub struct GateService<Svc, S = NullSink> {
    inner: Svc,
    gate: AdmissionGate<S>,
}

impl<Svc, S, Req> Service<Req> for GateService<Svc, S>
where
    Svc: Service<Req> + Clone + Send + 'static,
    Svc::Future: Send + 'static,
    Svc::Error: Send + 'static,
    S: TelemetrySink,
    S::Future: Send + 'static,
    Req: Send + 'static,
{
    type Response = Svc::Response;
    type Error = GateError<Svc::Error>;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(GateError::SubmissionFailed)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let gate = self.gate.clone();
        // take the service that was driven to readiness
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            gate.acquire().await.map_err(GateError::widen)?;
            inner.call(req).await.map_err(GateError::SubmissionFailed)
        })
    }
}
