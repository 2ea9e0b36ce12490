use docgate::{AdmissionGate, GateLayer, RateWindow, TimeUnit};
use futures::future::join_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::{service_fn, ServiceBuilder, ServiceExt};

#[tokio::test(start_paused = true)]
async fn layer_paces_concurrent_requests() {
    let gate = AdmissionGate::new(RateWindow::per(TimeUnit::Seconds), 4).unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counted = hits.clone();
    let svc = ServiceBuilder::new().layer(GateLayer::new(gate.clone())).service(service_fn(
        move |doc: String| {
            let counted = counted.clone();
            async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok::<_, std::io::Error>(doc.len())
            }
        },
    ));

    let start = tokio::time::Instant::now();
    let calls = (0..6).map(|n| svc.clone().oneshot(format!("doc-{n}")));
    let results = join_all(calls).await;

    assert!(results.into_iter().all(|r| r.unwrap() == 5));
    assert_eq!(hits.load(Ordering::SeqCst), 6);
    // four at once, then one every 250ms
    assert!(start.elapsed() >= Duration::from_millis(500));
    assert!(start.elapsed() < Duration::from_millis(600));
}

#[tokio::test]
async fn shutdown_rejects_through_the_layer() {
    let gate = AdmissionGate::new(RateWindow::per(TimeUnit::Seconds), 1).unwrap();
    let svc = ServiceBuilder::new()
        .layer(GateLayer::new(gate.clone()))
        .service(service_fn(|_: ()| async { Ok::<_, std::io::Error>(()) }));

    svc.clone().oneshot(()).await.unwrap();
    gate.shutdown();
    assert!(svc.oneshot(()).await.unwrap_err().is_closed());
}
