//! Deferred Calls
//!
//! Timers may complete on any thread of a multi-threaded async runtime, but
//! batching and dependency tracking live in thread-local state. Work a timer
//! carries back into the reactive system therefore has to run on the thread
//! that owns that state.
//!
//! # How It Works
//!
//! 1. Every thread has a queue, an unbounded channel created on first use.
//!
//! 2. [`Deferred::here`] captures a sender for the calling thread's queue.
//!
//! 3. [`Deferred::dispatch`] runs the job at once when it is already on the
//!    owning thread. Otherwise the job is sent to the owner's queue.
//!
//! 4. The owning thread runs queued jobs with [`Deferred::drain`], or waits
//!    for the next ones with [`Deferred::wait`].

use std::cell::RefCell;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Notify;

/// A call handed back to the owning thread.
pub type Job = Box<dyn FnOnce() + Send>;

thread_local! {
    static QUEUE: DeferredQueue = DeferredQueue::new();
}

struct DeferredQueue {
    sender: UnboundedSender<Job>,
    receiver: RefCell<UnboundedReceiver<Job>>,
    ready: Arc<Notify>,
}

impl DeferredQueue {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: RefCell::new(receiver),
            ready: Arc::new(Notify::new()),
        }
    }
}

/// A handle for sending work back to one thread.
#[derive(Clone)]
pub struct Deferred {
    owner: ThreadId,
    sender: UnboundedSender<Job>,
    ready: Arc<Notify>,
}

impl Deferred {
    /// A handle to the current thread's queue.
    pub fn here() -> Self {
        QUEUE.with(|queue| Self {
            owner: thread::current().id(),
            sender: queue.sender.clone(),
            ready: Arc::clone(&queue.ready),
        })
    }

    /// The thread jobs are sent to.
    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    /// Run `job` on the owning thread.
    ///
    /// On that thread the job runs before this returns. From anywhere else
    /// it is queued. A job for a thread that has exited is dropped.
    pub fn dispatch(&self, job: Job) {
        if thread::current().id() == self.owner {
            job();
            return;
        }

        if self.sender.send(job).is_err() {
            tracing::debug!(owner = ?self.owner, "owning thread is gone, dropping deferred call");
            return;
        }
        self.ready.notify_one();
    }

    /// Run every job queued for the current thread, including any queued by
    /// the jobs themselves. Returns how many ran.
    pub fn drain() -> usize {
        let mut ran = 0;
        loop {
            let next = QUEUE.with(|queue| queue.receiver.borrow_mut().try_recv().ok());
            match next {
                Some(job) => {
                    job();
                    ran += 1;
                }
                None => break,
            }
        }
        if ran > 0 {
            tracing::trace!(jobs = ran, "drained deferred calls");
        }
        ran
    }

    /// Wait until a job is queued for the current thread, then drain.
    ///
    /// The returned future must be polled on the thread whose queue it
    /// drains: inside `block_on`, a current-thread runtime, or a
    /// `LocalSet`.
    pub async fn wait() -> usize {
        let ready = QUEUE.with(|queue| Arc::clone(&queue.ready));
        loop {
            let ran = Self::drain();
            if ran > 0 {
                return ran;
            }
            ready.notified().await;
        }
    }
}

impl std::fmt::Debug for Deferred {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deferred").field("owner", &self.owner).finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;

    fn record(log: &Arc<Mutex<Vec<ThreadId>>>) -> Job {
        let log = Arc::clone(log);
        Box::new(move || log.lock().push(thread::current().id()))
    }

    #[test]
    fn dispatch_on_owner_runs_immediately() {
        let log = Arc::new(Mutex::new(Vec::new()));
        Deferred::here().dispatch(record(&log));
        assert_eq!(*log.lock(), vec![thread::current().id()]);
        assert_eq!(Deferred::drain(), 0);
    }

    #[test]
    fn dispatch_elsewhere_queues_for_owner() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let deferred = Deferred::here();

        let job = record(&log);
        thread::spawn(move || deferred.dispatch(job))
            .join()
            .unwrap();
        assert!(log.lock().is_empty());

        assert_eq!(Deferred::drain(), 1);
        assert_eq!(*log.lock(), vec![thread::current().id()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn wait_runs_jobs_from_runtime_workers() {
        let owner = thread::current().id();
        let log = Arc::new(Mutex::new(Vec::new()));
        let deferred = Deferred::here();

        let job = record(&log);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            deferred.dispatch(job);
        });

        let ran = tokio::time::timeout(Duration::from_secs(5), Deferred::wait())
            .await
            .unwrap();
        assert_eq!(ran, 1);
        assert_eq!(*log.lock(), vec![owner]);
    }
}
