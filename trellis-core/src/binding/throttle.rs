//! Throttle and Debounce
//!
//! Rate limiters for the DOM-to-property direction of a binding. Both run
//! their deferred call on a `tokio` timer.
//!
//! # How Throttling Works
//!
//! 1. The first call in a quiet period opens a window of `wait`.
//! 2. With `leading`, that first call runs immediately. Otherwise it is held.
//! 3. Calls inside the window replace the held call.
//! 4. When the window closes the held call runs (the trailing edge).
//!
//! A debounce instead restarts its timer on every call and runs only the
//! last call, `wait` after the burst ends.
//!
//! Deferred calls run on the thread that made them. When the timer fires
//! on another runtime thread the call is queued with [`Deferred`] for that
//! thread instead.
//!
//! Outside a tokio runtime there is no timer to defer to, so calls run
//! immediately and a warning is logged.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::reactive::{Deferred, Job};

/// Which edges of a throttle window fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottlePolicy {
    pub leading: bool,
    pub trailing: bool,
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self {
            leading: false,
            trailing: true,
        }
    }
}

impl ThrottlePolicy {
    pub fn with_leading(mut self, leading: bool) -> Self {
        self.leading = leading;
        self
    }
}

#[derive(Default)]
struct ThrottleState {
    pending: Option<Job>,
    window: Option<JoinHandle<()>>,
}

/// Runs at most one call per window.
pub struct Throttle {
    wait: Duration,
    policy: ThrottlePolicy,
    state: Arc<Mutex<ThrottleState>>,
}

impl Throttle {
    pub fn new(wait: Duration, policy: ThrottlePolicy) -> Self {
        Self {
            wait,
            policy,
            state: Arc::new(Mutex::new(ThrottleState::default())),
        }
    }

    pub fn wait(&self) -> Duration {
        self.wait
    }

    pub fn policy(&self) -> ThrottlePolicy {
        self.policy
    }

    pub fn call<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let Ok(handle) = Handle::try_current() else {
            tracing::warn!("throttled call outside a tokio runtime, running immediately");
            job();
            return;
        };

        let mut state = self.state.lock();
        if state.window.is_some() {
            if self.policy.trailing {
                state.pending = Some(Box::new(job));
            }
            return;
        }

        let immediate = if self.policy.leading {
            Some(job)
        } else {
            if self.policy.trailing {
                state.pending = Some(Box::new(job));
            }
            None
        };

        let shared = Arc::clone(&self.state);
        let deferred = Deferred::here();
        let wait = self.wait;
        state.window = Some(handle.spawn(async move {
            tokio::time::sleep(wait).await;
            let trailing = {
                let mut state = shared.lock();
                state.window = None;
                state.pending.take()
            };
            if let Some(job) = trailing {
                tracing::trace!("throttle trailing edge");
                deferred.dispatch(job);
            }
        }));
        drop(state);

        if let Some(job) = immediate {
            job();
        }
    }

    /// Drop the held call and close the window.
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        state.pending = None;
        if let Some(window) = state.window.take() {
            window.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state.lock().pending.is_some()
    }
}

#[derive(Default)]
struct DebounceState {
    pending: Option<Job>,
    timer: Option<JoinHandle<()>>,
}

/// Runs the last call once calls stop for `wait`.
pub struct Debounce {
    wait: Duration,
    generation: Arc<AtomicU64>,
    state: Arc<Mutex<DebounceState>>,
}

impl Debounce {
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            generation: Arc::new(AtomicU64::new(0)),
            state: Arc::new(Mutex::new(DebounceState::default())),
        }
    }

    pub fn wait(&self) -> Duration {
        self.wait
    }

    pub fn call<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let Ok(handle) = Handle::try_current() else {
            tracing::warn!("debounced call outside a tokio runtime, running immediately");
            job();
            return;
        };

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.state.lock();
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.pending = Some(Box::new(job));

        let shared = Arc::clone(&self.state);
        let current = Arc::clone(&self.generation);
        let deferred = Deferred::here();
        let wait = self.wait;
        state.timer = Some(handle.spawn(async move {
            tokio::time::sleep(wait).await;
            let job = {
                let mut state = shared.lock();
                if current.load(Ordering::SeqCst) != generation {
                    return;
                }
                state.timer = None;
                state.pending.take()
            };
            if let Some(job) = job {
                deferred.dispatch(job);
            }
        }));
    }

    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        state.pending = None;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state.lock().pending.is_some()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
