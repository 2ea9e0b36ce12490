mod common;

use docgate::telemetry::{GateEvent, LifecycleEvent, MemorySink};
use docgate::{AdmissionGate, GateError, RateWindow, TimeUnit};
use futures::future::join_all;
use futures::FutureExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

fn gate(capacity: usize, unit: TimeUnit) -> AdmissionGate {
    AdmissionGate::new(RateWindow::per(unit), capacity).unwrap()
}

#[tokio::test]
async fn zero_capacity_is_rejected_before_anything_runs() {
    let err = AdmissionGate::new(RateWindow::per(TimeUnit::Seconds), 0).unwrap_err();
    assert!(err.is_invalid_configuration());
}

#[tokio::test]
async fn cold_gate_admits_capacity_then_blocks() {
    for capacity in [1usize, 2, 7, 64] {
        let gate = gate(capacity, TimeUnit::Hours);
        let admitted = join_all((0..capacity).map(|_| gate.acquire())).await;
        assert!(admitted.iter().all(Result::is_ok));

        let mut next = Box::pin(gate.acquire());
        assert!((&mut next).now_or_never().is_none(), "capacity {capacity} should block");
        drop(next);
        assert_eq!(gate.waiting(), 0);
        gate.shutdown();
    }
}

#[tokio::test(start_paused = true)]
async fn three_per_second_serves_five_callers() {
    common::test_helpers::init_tracing();
    let gate = gate(3, TimeUnit::Seconds);
    assert_eq!(gate.refill_interval(), Duration::from_nanos(333_333_333));

    let start = Instant::now();
    let handles: Vec<_> = (0..5)
        .map(|_| {
            let gate = gate.clone();
            tokio::spawn(async move {
                gate.acquire().await.unwrap();
                start.elapsed()
            })
        })
        .collect();

    let mut waited = Vec::new();
    for handle in handles {
        waited.push(handle.await.unwrap());
    }
    waited.sort();

    assert!(waited[..3].iter().all(|w| *w < Duration::from_millis(1)));
    assert!(waited[3] >= Duration::from_millis(333) && waited[3] < Duration::from_millis(340));
    assert!(waited[4] >= Duration::from_millis(666) && waited[4] < Duration::from_millis(680));
}

#[tokio::test(start_paused = true)]
async fn replenish_interval_converges_to_window_over_capacity() {
    let sink = MemorySink::new();
    let gate = AdmissionGate::builder()
        .window(RateWindow::new(TimeUnit::Seconds, 2))
        .capacity(4)
        .sink(sink.clone())
        .build()
        .unwrap();

    // drain, then time a run of handed-off permits
    for _ in 0..4 {
        gate.acquire().await.unwrap();
    }
    let start = Instant::now();
    for _ in 0..8 {
        gate.acquire().await.unwrap();
    }
    let per_permit = start.elapsed() / 8;
    assert!(per_permit >= Duration::from_millis(495) && per_permit <= Duration::from_millis(505));

    // let the refill task record the last hand-off
    tokio::time::sleep(Duration::from_millis(1)).await;

    let replenished = sink
        .events()
        .into_iter()
        .filter(|e| matches!(e, GateEvent::Lifecycle(LifecycleEvent::Replenished { .. })))
        .count();
    assert!(replenished >= 8);
}

#[tokio::test(start_paused = true)]
async fn pool_never_exceeds_capacity_while_idle() {
    let gate = gate(5, TimeUnit::Seconds);
    gate.acquire().await.unwrap();
    gate.acquire().await.unwrap();

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(gate.available_permits(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pool_stays_bounded_under_contention() {
    let capacity = 8;
    let gate = AdmissionGate::new(RateWindow::new(TimeUnit::Milliseconds, 40), capacity).unwrap();
    let admitted = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));

    let observer = {
        let gate = gate.clone();
        let max_seen = max_seen.clone();
        tokio::spawn(async move {
            for _ in 0..200 {
                max_seen.fetch_max(gate.available_permits(), Ordering::SeqCst);
                tokio::task::yield_now().await;
            }
        })
    };

    let workers: Vec<_> = (0..16)
        .map(|_| {
            let gate = gate.clone();
            let admitted = admitted.clone();
            tokio::spawn(async move {
                for _ in 0..4 {
                    if gate.acquire().await.is_ok() {
                        admitted.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();

    for worker in join_all(workers).await {
        worker.unwrap();
    }
    observer.await.unwrap();

    assert_eq!(admitted.load(Ordering::SeqCst), 64);
    assert!(max_seen.load(Ordering::SeqCst) <= capacity);
    assert!(gate.available_permits() <= capacity);
    gate.shutdown();
}

#[tokio::test(start_paused = true)]
async fn blocked_callers_are_granted_in_arrival_order() {
    let gate = gate(1, TimeUnit::Seconds);
    gate.acquire().await.unwrap();

    let order = Arc::new(Mutex::new(Vec::new()));
    let mut handles = Vec::new();
    for n in 0..4 {
        let task_gate = gate.clone();
        let order = order.clone();
        handles.push(tokio::spawn(async move {
            task_gate.acquire().await.unwrap();
            order.lock().unwrap().push(n);
        }));
        // make sure each caller has queued before the next one arrives
        while gate.waiting() < n + 1 {
            tokio::task::yield_now().await;
        }
    }

    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn shutdown_releases_blocked_callers() {
    let gate = gate(2, TimeUnit::Hours);
    gate.acquire().await.unwrap();
    gate.acquire().await.unwrap();

    let blocked: Vec<_> = (0..3)
        .map(|_| {
            let gate = gate.clone();
            tokio::spawn(async move { gate.acquire().await })
        })
        .collect();
    while gate.waiting() < 3 {
        tokio::task::yield_now().await;
    }

    assert!(gate.shutdown());
    let released = tokio::time::timeout(Duration::from_secs(1), join_all(blocked))
        .await
        .expect("blocked callers released");
    for result in released {
        assert!(matches!(result.unwrap(), Err(GateError::Closed)));
    }
    assert!(gate.acquire().await.unwrap_err().is_closed());
    assert!(gate.is_shutdown());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_shutdown_transitions_once() {
    let gate = gate(3, TimeUnit::Seconds);
    let calls: Vec<_> = (0..8)
        .map(|_| {
            let gate = gate.clone();
            tokio::spawn(async move { gate.shutdown() })
        })
        .collect();

    let transitions = join_all(calls).await.into_iter().filter(|r| *r.as_ref().unwrap()).count();
    assert_eq!(transitions, 1);
    assert!(gate.acquire().await.unwrap_err().is_closed());
    assert_eq!(gate.waiting(), 0);
}

#[tokio::test(start_paused = true)]
async fn interrupted_caller_leaves_pool_untouched() {
    let gate = gate(1, TimeUnit::Seconds);
    gate.acquire().await.unwrap();

    let err = gate.acquire_until(tokio::time::sleep(Duration::from_millis(100))).await.unwrap_err();
    assert!(err.is_interrupted());
    assert_eq!(gate.waiting(), 0);
    assert_eq!(gate.available_permits(), 0);

    // the next single replenish is enough for the next caller
    let start = Instant::now();
    gate.acquire().await.unwrap();
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(gate.available_permits(), 0);
}

#[tokio::test(start_paused = true)]
async fn refill_task_stops_with_shutdown() {
    let sink = MemorySink::new();
    let gate = AdmissionGate::builder()
        .window(RateWindow::per(TimeUnit::Milliseconds))
        .capacity(1)
        .sink(sink.clone())
        .build()
        .unwrap();
    gate.acquire().await.unwrap();
    gate.shutdown();

    tokio::time::sleep(Duration::from_millis(50)).await;
    let snapshot = gate.snapshot();
    assert_eq!(snapshot.available, 0);
    assert!(snapshot.shutdown);
    assert!(sink
        .events()
        .iter()
        .any(|e| matches!(e, GateEvent::Lifecycle(LifecycleEvent::ShutDown { .. }))));
}
