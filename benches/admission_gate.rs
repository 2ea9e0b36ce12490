use criterion::{black_box, criterion_group, criterion_main, Criterion};
use docgate::{AdmissionGate, GateLayer, RateWindow, TimeUnit};
use futures::future::Ready;
use tower::{Service, ServiceBuilder, ServiceExt};

// Returns its input unchanged, so only the gate is measured.
#[derive(Clone)]
struct EchoService;

impl Service<&'static str> for EchoService {
    type Response = &'static str;
    type Error = std::io::Error;
    type Future = Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: &'static str) -> Self::Future {
        futures::future::ready(Ok(req))
    }
}

// A capacity this large never runs dry during a bench run.
const ROOMY: usize = 1 << 30;

fn uncontended_acquire(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let gate = rt.block_on(async { AdmissionGate::new(RateWindow::per(TimeUnit::Days), ROOMY).unwrap() });

    c.bench_function("admission_gate_acquire_uncontended", |b| {
        b.to_async(&rt).iter(|| async {
            let _ = black_box(gate.acquire().await);
        });
    });
}

fn closed_gate_rejection(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let gate = rt.block_on(async { AdmissionGate::new(RateWindow::per(TimeUnit::Seconds), 1).unwrap() });
    gate.shutdown();

    c.bench_function("admission_gate_acquire_closed", |b| {
        b.to_async(&rt).iter(|| async {
            let _ = black_box(gate.acquire().await);
        });
    });
}

fn gate_layer_call(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let gate = rt.block_on(async { AdmissionGate::new(RateWindow::per(TimeUnit::Days), ROOMY).unwrap() });
    let svc = ServiceBuilder::new().layer(GateLayer::new(gate)).service(EchoService);

    c.bench_function("gate_layer_call", |b| {
        b.to_async(&rt).iter(|| async {
            let _ = black_box(svc.clone().oneshot(black_box("request")).await);
        });
    });
}

criterion_group!(benches, uncontended_acquire, closed_gate_rejection, gate_layer_call);
criterion_main!(benches);
