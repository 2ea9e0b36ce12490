//! Admission gate: a fixed-capacity permit pool drip-fed by a background task.
//!
//! Callers take a permit before doing rate-limited work and never give it
//! back. A single refill task adds one permit per refill interval
//! (`window / capacity`), handing it straight to the longest-waiting caller
//! when one is queued. The pool starts full, so a cold gate admits
//! `capacity` callers without waiting.
//!
//! ```rust
//! use docgate::{AdmissionGate, RateWindow, TimeUnit};
//!
//! #[tokio::main]
//! async fn main() {
//!     let gate = AdmissionGate::new(RateWindow::per(TimeUnit::Seconds), 10).unwrap();
//!     gate.acquire().await.unwrap();
//!     gate.shutdown();
//!     assert!(gate.acquire().await.unwrap_err().is_closed());
//! }
//! ```

use crate::error::{ConfigError, GateError};
use crate::telemetry::{
    try_emit, AdmissionEvent, GateEvent, LifecycleEvent, NullSink, TelemetrySink,
};
use crate::window::{RateWindow, TimeUnit};
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Largest accepted capacity.
pub const MAX_CAPACITY: usize = usize::MAX >> 3;

/// Refill periods shorter than this are folded into whole timer ticks.
const TIMER_RESOLUTION: Duration = Duration::from_millis(1);

#[derive(Debug)]
struct Waiter {
    id: u64,
    grant: oneshot::Sender<()>,
}

/// Everything behind the state lock. `available > 0` implies `waiters` is empty.
#[derive(Debug)]
struct PoolState {
    available: usize,
    shutdown: bool,
    waiters: VecDeque<Waiter>,
    next_waiter: u64,
    refiller: Option<JoinHandle<()>>,
}

/// Where a released permit ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Release {
    HandedOff,
    Stored,
    Full,
}

impl PoolState {
    fn release_one(&mut self, capacity: usize) -> Release {
        while let Some(waiter) = self.waiters.pop_front() {
            if waiter.grant.send(()).is_ok() {
                return Release::HandedOff;
            }
        }
        if self.available < capacity {
            self.available += 1;
            Release::Stored
        } else {
            Release::Full
        }
    }
}

/// Result of one refill tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Replenish {
    Closed,
    Produced { available: usize, handed_off: usize, stored: usize },
}

struct Shared<S> {
    state: Mutex<PoolState>,
    capacity: usize,
    window: RateWindow,
    refill_interval: Duration,
    runtime: Handle,
    sink: S,
}

impl<S> Shared<S> {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            tracing::warn!("admission gate state lock poisoned; recovering");
            poisoned.into_inner()
        })
    }

    fn replenish(&self, units: usize) -> Replenish {
        let mut state = self.lock();
        if state.shutdown {
            return Replenish::Closed;
        }
        let (mut handed_off, mut stored) = (0, 0);
        for _ in 0..units {
            match state.release_one(self.capacity) {
                Release::HandedOff => handed_off += 1,
                Release::Stored => stored += 1,
                Release::Full => break,
            }
        }
        Replenish::Produced { available: state.available, handed_off, stored }
    }
}

impl<S> Shared<S>
where
    S: TelemetrySink,
    S::Future: Send + 'static,
{
    /// Hand `event` to the sink without waiting on it.
    fn emit(&self, event: GateEvent) {
        if !try_emit(&self.runtime, self.sink.clone(), event) {
            tracing::trace!("telemetry sink not ready; gate event dropped");
        }
    }
}

/// A queued caller. Dropping an unsettled ticket leaves the queue and passes
/// on any grant that raced with the cancellation.
struct Ticket<'a, S> {
    shared: &'a Shared<S>,
    id: u64,
    grant: oneshot::Receiver<()>,
    settled: bool,
}

impl<S> Ticket<'_, S> {
    /// Leave the queue. Returns true if a grant had already been delivered.
    fn abandon(&mut self) -> bool {
        self.settled = true;
        let mut state = self.shared.lock();
        if let Some(pos) = state.waiters.iter().position(|w| w.id == self.id) {
            state.waiters.remove(pos);
            return false;
        }
        if self.grant.try_recv().is_ok() {
            state.release_one(self.shared.capacity);
            return true;
        }
        false
    }
}

impl<S> Drop for Ticket<'_, S> {
    fn drop(&mut self) {
        if !self.settled && self.abandon() {
            tracing::debug!(waiter = self.id, "cancelled waiter passed its grant on");
        }
    }
}

enum Entry<'a, S> {
    Granted { available: usize },
    Queued { ticket: Ticket<'a, S>, waiting: usize },
    Closed,
}

/// Point-in-time view of a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateSnapshot {
    pub capacity: usize,
    pub available: usize,
    pub waiting: usize,
    pub refill_interval: Duration,
    pub shutdown: bool,
}

/// Leaky-bucket admission gate.
///
/// Clones share the same pool, queue and refill task. The refill task ends on
/// [`shutdown`](Self::shutdown) or once every handle has been dropped.
pub struct AdmissionGate<S = NullSink> {
    shared: Arc<Shared<S>>,
}

impl<S> Clone for AdmissionGate<S> {
    fn clone(&self) -> Self {
        Self { shared: self.shared.clone() }
    }
}

impl<S> fmt::Debug for AdmissionGate<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionGate")
            .field("window", &self.shared.window)
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

impl AdmissionGate<NullSink> {
    /// Create a gate admitting `capacity` operations per `window`.
    ///
    /// Must be called from within a tokio runtime, which hosts the refill task.
    pub fn new(window: RateWindow, capacity: usize) -> Result<Self, GateError> {
        Self::builder().window(window).capacity(capacity).build()
    }

    /// Start building a gate; defaults to one permit per second.
    pub fn builder() -> GateBuilder<NullSink> {
        GateBuilder::new()
    }
}

impl<S> AdmissionGate<S>
where
    S: TelemetrySink,
    S::Future: Send + 'static,
{
    /// Wait for a permit.
    ///
    /// # Errors
    /// Returns `GateError::Closed` if the gate is (or becomes) shut down.
    pub async fn acquire(&self) -> Result<(), GateError> {
        self.acquire_until(std::future::pending::<()>()).await
    }

    /// Wait for a permit, giving up when `cancel` completes first.
    ///
    /// # Errors
    /// - `GateError::Closed` if the gate is (or becomes) shut down.
    /// - `GateError::Interrupted` if `cancel` fires first; the pool is left as
    ///   if this caller had never queued.
    pub async fn acquire_until<F>(&self, cancel: F) -> Result<(), GateError>
    where
        F: Future,
    {
        let (mut ticket, waiting) = match self.enter() {
            Entry::Granted { available } => {
                self.emit(GateEvent::Admission(AdmissionEvent::Granted {
                    available,
                    capacity: self.shared.capacity,
                    waited: Duration::ZERO,
                }));
                return Ok(());
            }
            Entry::Closed => {
                self.emit(GateEvent::Admission(AdmissionEvent::Rejected));
                return Err(GateError::Closed);
            }
            Entry::Queued { ticket, waiting } => (ticket, waiting),
        };

        let started = Instant::now();
        self.emit(GateEvent::Admission(AdmissionEvent::Queued { waiting }));

        tokio::select! {
            biased;
            granted = &mut ticket.grant => {
                ticket.settled = true;
                match granted {
                    Ok(()) => {
                        self.emit(GateEvent::Admission(AdmissionEvent::Granted {
                            available: self.available_permits(),
                            capacity: self.shared.capacity,
                            waited: started.elapsed(),
                        }));
                        Ok(())
                    }
                    Err(_) => {
                        self.emit(GateEvent::Admission(AdmissionEvent::Rejected));
                        Err(GateError::Closed)
                    }
                }
            }
            _ = cancel => {
                ticket.abandon();
                self.emit(GateEvent::Admission(AdmissionEvent::Interrupted {
                    waited: started.elapsed(),
                }));
                Err(GateError::Interrupted)
            }
        }
    }

    /// Never waits on the sink, so telemetry cannot hold up admission.
    pub(crate) fn emit(&self, event: GateEvent) {
        self.shared.emit(event);
    }
}

impl<S> AdmissionGate<S> {
    fn enter(&self) -> Entry<'_, S> {
        let mut state = self.shared.lock();
        if state.shutdown {
            return Entry::Closed;
        }
        if state.available > 0 {
            state.available -= 1;
            return Entry::Granted { available: state.available };
        }
        let (tx, rx) = oneshot::channel();
        let id = state.next_waiter;
        state.next_waiter += 1;
        state.waiters.push_back(Waiter { id, grant: tx });
        let waiting = state.waiters.len();
        Entry::Queued {
            ticket: Ticket { shared: &self.shared, id, grant: rx, settled: false },
            waiting,
        }
    }

    /// Release one permit, as a refill tick does.
    #[cfg(test)]
    fn replenish(&self) -> Replenish {
        self.shared.replenish(1)
    }

    /// Stop the gate permanently.
    ///
    /// Queued callers fail with `GateError::Closed`, later calls to `acquire`
    /// fail immediately, and the refill task is aborted. In-flight work that
    /// already holds a permit is not waited for. Returns `false` if the gate
    /// was already shut down.
    pub fn shutdown(&self) -> bool
    where
        S: TelemetrySink,
        S::Future: Send + 'static,
    {
        let (released, refiller) = {
            let mut state = self.shared.lock();
            if state.shutdown {
                return false;
            }
            state.shutdown = true;
            let released = state.waiters.len();
            state.waiters.clear();
            (released, state.refiller.take())
        };
        if let Some(task) = refiller {
            task.abort();
        }
        tracing::info!(released, capacity = self.shared.capacity, "admission gate shut down");
        self.shared.emit(GateEvent::Lifecycle(LifecycleEvent::ShutDown { released }));
        true
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn window(&self) -> RateWindow {
        self.shared.window
    }

    /// Period between single-permit refills.
    pub fn refill_interval(&self) -> Duration {
        self.shared.refill_interval
    }

    pub fn available_permits(&self) -> usize {
        self.shared.lock().available
    }

    /// Number of callers currently queued.
    pub fn waiting(&self) -> usize {
        self.shared.lock().waiters.len()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.lock().shutdown
    }

    pub fn snapshot(&self) -> GateSnapshot {
        let state = self.shared.lock();
        GateSnapshot {
            capacity: self.shared.capacity,
            available: state.available,
            waiting: state.waiters.len(),
            refill_interval: self.shared.refill_interval,
            shutdown: state.shutdown,
        }
    }
}

/// Builder for [`AdmissionGate`].
#[derive(Debug, Clone)]
pub struct GateBuilder<S = NullSink> {
    window: RateWindow,
    capacity: usize,
    sink: S,
    runtime: Option<Handle>,
}

impl GateBuilder<NullSink> {
    pub fn new() -> Self {
        Self { window: RateWindow::per(TimeUnit::Seconds), capacity: 1, sink: NullSink, runtime: None }
    }
}

impl Default for GateBuilder<NullSink> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> GateBuilder<S> {
    pub fn window(mut self, window: RateWindow) -> Self {
        self.window = window;
        self
    }

    /// Permits admitted per window; must be > 0.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Host the refill task on `runtime` instead of the current one.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Deliver gate events to `sink`.
    pub fn sink<T>(self, sink: T) -> GateBuilder<T> {
        GateBuilder { window: self.window, capacity: self.capacity, sink, runtime: self.runtime }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::InvalidCapacity { provided: 0 });
        }
        if self.capacity > MAX_CAPACITY {
            return Err(ConfigError::CapacityTooLarge {
                provided: self.capacity,
                max: MAX_CAPACITY,
            });
        }
        if self.window.count() == 0 {
            return Err(ConfigError::EmptyWindow);
        }
        Ok(())
    }

    /// Validate the configuration, fill the pool and start the refill task.
    ///
    /// # Errors
    /// `GateError::InvalidConfiguration` for a zero or oversized capacity, an
    /// empty window, or when no tokio runtime is available. Nothing is
    /// spawned on error.
    pub fn build(self) -> Result<AdmissionGate<S>, GateError>
    where
        S: TelemetrySink,
        S::Future: Send + 'static,
    {
        self.validate()?;
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| ConfigError::NoRuntime)?,
        };
        let refill_interval = self.window.refill_interval(self.capacity);
        let started = Instant::now();
        let shared = Arc::new(Shared {
            state: Mutex::new(PoolState {
                available: self.capacity,
                shutdown: false,
                waiters: VecDeque::new(),
                next_waiter: 0,
                refiller: None,
            }),
            capacity: self.capacity,
            window: self.window,
            refill_interval,
            runtime: runtime.clone(),
            sink: self.sink,
        });

        let task = runtime.spawn(refill_loop(Arc::downgrade(&shared), refill_interval, started));
        shared.lock().refiller = Some(task);
        tracing::debug!(
            capacity = self.capacity,
            window = %self.window,
            interval = ?refill_interval,
            "admission gate started"
        );
        Ok(AdmissionGate { shared })
    }
}

/// Drip one permit per refill interval until shutdown or until the gate is
/// dropped.
///
/// Intervals shorter than the timer resolution fold the ticks that elapsed
/// since the last one into a single replenish, capped at `capacity`, so they
/// keep their rate without spinning. Longer intervals release exactly one
/// permit per tick.
async fn refill_loop<S>(shared: Weak<Shared<S>>, period: Duration, start: Instant)
where
    S: TelemetrySink,
    S::Future: Send + 'static,
{
    let Some(capacity) = shared.upgrade().map(|gate| {
        gate.emit(GateEvent::Lifecycle(LifecycleEvent::Started {
            capacity: gate.capacity,
            refill_interval: period,
        }));
        gate.capacity
    }) else {
        return;
    };

    let mut ticker = time::interval_at(start + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last = start;

    loop {
        ticker.tick().await;
        let now = Instant::now();
        let due = units_due(now.saturating_duration_since(last), period, capacity);
        last = if due == capacity {
            now
        } else {
            last + period.saturating_mul(u32::try_from(due).unwrap_or(u32::MAX))
        };

        let Some(gate) = shared.upgrade() else {
            tracing::debug!("admission gate dropped; refill task exiting");
            return;
        };
        match gate.replenish(due) {
            Replenish::Closed => {
                tracing::debug!("admission gate closed; refill task exiting");
                return;
            }
            Replenish::Produced { available, handed_off, stored } => {
                if handed_off + stored > 0 {
                    tracing::trace!(available, handed_off, stored, "permits replenished");
                    gate.emit(GateEvent::Lifecycle(LifecycleEvent::Replenished {
                        available,
                        handed_off: handed_off > 0,
                    }));
                }
            }
        }
    }
}

fn units_due(elapsed: Duration, period: Duration, capacity: usize) -> usize {
    if period >= TIMER_RESOLUTION {
        return 1;
    }
    let periods = elapsed.as_nanos() / period.as_nanos().max(1);
    usize::try_from(periods).unwrap_or(usize::MAX).clamp(1, capacity)
}
