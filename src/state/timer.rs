//! Delayed callbacks driving the automatic session transitions.
//!
//! The scheduler only knows about opaque [`TimerHandle`]s; sessions hold the
//! handle of their single outstanding timer and every effect re-validates its
//! precondition against the session before mutating anything.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use dashmap::DashMap;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::{task::AbortHandle, time::sleep};
use tracing::{debug, warn};

/// Opaque identifier of a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Build a handle from a raw value. Only useful to scheduler implementations and tests.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// The two kinds of timer a session can arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Countdown before a question opens.
    Countdown,
    /// Question duration, from open to close.
    Open,
}

/// What a session asks the scheduler to arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerRequest {
    /// Which timer to arm.
    pub kind: TimerKind,
    /// Delay before the effect runs.
    pub delay: Duration,
    /// Question position the timer belongs to.
    pub at_question: usize,
}

/// Callback run when a timer fires. Receives its own handle so it can check it is still current.
pub type TimerEffect = Box<dyn FnOnce(TimerHandle) -> BoxFuture<'static, ()> + Send>;

/// Capability to run an effect after a delay and to cancel it beforehand.
pub trait TimerScheduler: Send + Sync {
    /// Run `effect` once `delay` has elapsed unless cancelled first.
    fn schedule(&self, delay: Duration, effect: TimerEffect) -> TimerHandle;
    /// Cancel a timer. Cancelling a fired or already cancelled timer does nothing.
    fn cancel(&self, handle: TimerHandle);
    /// Number of timers scheduled but not yet fired or cancelled.
    fn outstanding(&self) -> usize;
}

/// [`TimerScheduler`] spawning one tokio task per timer.
#[derive(Default)]
pub struct TokioTimerScheduler {
    next: AtomicU64,
    tasks: Arc<DashMap<TimerHandle, Option<AbortHandle>>>,
}

impl TokioTimerScheduler {
    /// Create an empty scheduler. Must be used from within a tokio runtime.
    pub fn new() -> Self {
        Self::default()
    }
}

impl TimerScheduler for TokioTimerScheduler {
    fn schedule(&self, delay: Duration, effect: TimerEffect) -> TimerHandle {
        let handle = TimerHandle(self.next.fetch_add(1, Ordering::Relaxed) + 1);
        // Registered before spawning so a zero delay cannot outrun the bookkeeping.
        self.tasks.insert(handle, None);

        let tasks = Arc::clone(&self.tasks);
        let task = tokio::spawn(async move {
            sleep(delay).await;
            if tasks.remove(&handle).is_none() {
                debug!(timer = %handle, "timer cancelled before firing");
                return;
            }

            if let Err(err) = tokio::spawn(effect(handle)).await {
                if err.is_panic() {
                    warn!(timer = %handle, "timer effect panicked");
                }
            }
        });

        if let Some(mut slot) = self.tasks.get_mut(&handle) {
            *slot = Some(task.abort_handle());
        }

        handle
    }

    fn cancel(&self, handle: TimerHandle) {
        if let Some((_, Some(task))) = self.tasks.remove(&handle) {
            task.abort();
        }
    }

    fn outstanding(&self) -> usize {
        self.tasks.len()
    }
}
