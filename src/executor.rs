//! Bounded concurrency executor.
//!
//! The [`Executor`] admits asynchronous tasks while fewer than `capacity` of
//! them are running. Everyone else waits in a FIFO queue and is handed a slot
//! directly by the task that frees it, so a later submission can never
//! overtake an earlier one.

mod diagnostics;

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;

use crate::error::ExecutorError;

pub use diagnostics::Stats;

/// How many completion events a slow subscriber may fall behind before it
/// starts observing `RecvError::Lagged`.
const EVENT_BUFFER: usize = 1024;

/// Runs asynchronous tasks with a hard cap on how many execute at once.
///
/// The executor is cheap to clone, clones share the same slots, queue and
/// counters.
///
/// # Example
///
/// ```rust
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let executor = dirsum::Executor::new(2).unwrap();
/// let value = executor.submit(async { 40 + 2 }).await;
///
/// assert_eq!(value, 42);
/// assert_eq!(executor.executed(), 1);
/// # });
/// ```
#[derive(Clone)]
pub struct Executor {
    inner: Arc<Inner>,
}

struct Inner {
    capacity: usize,
    state: Mutex<State>,
    events: broadcast::Sender<Stats>,
}

#[derive(Default)]
struct State {
    running: usize,
    executed: u64,
    completed: u64,
    queue: VecDeque<oneshot::Sender<()>>,
}

impl State {
    fn snapshot(&self, capacity: usize) -> Stats {
        Stats {
            capacity,
            running: self.running,
            queued: self.queue.iter().filter(|waiter| !waiter.is_closed()).count(),
            executed: self.executed,
            completed: self.completed,
        }
    }

    /// Gives a freed slot to the oldest waiter that is still listening. If
    /// there is none the slot goes back to the pool.
    fn hand_off(&mut self) {
        while let Some(waiter) = self.queue.pop_front() {
            if waiter.send(()).is_ok() {
                return;
            }
        }

        self.running -= 1;
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reserve(self: &Arc<Self>) -> Ticket {
        let mut state = self.lock();

        if state.running < self.capacity && state.queue.is_empty() {
            state.running += 1;
            tracing::trace!(running = state.running, "slot granted");

            return Ticket {
                inner: self.clone(),
                admission: Admission::Granted,
            };
        }

        let (tx, rx) = oneshot::channel();
        state.queue.push_back(tx);
        tracing::trace!(queued = state.queue.len(), "waiting for a slot");

        Ticket {
            inner: self.clone(),
            admission: Admission::Queued(rx),
        }
    }

    fn start(&self) {
        let mut state = self.lock();
        state.executed += 1;
    }

    fn finish(&self) {
        let stats = {
            let mut state = self.lock();
            state.completed += 1;
            state.hand_off();
            state.snapshot(self.capacity)
        };

        tracing::trace!(
            running = stats.running,
            queued = stats.queued,
            completed = stats.completed,
            "task finished"
        );

        // no subscribers is fine
        let _ = self.events.send(stats);
    }

    /// Returns a slot that was granted to a caller who went away before
    /// using it.
    fn abandon(&self) {
        let mut state = self.lock();
        state.hand_off();
        tracing::trace!(running = state.running, "granted slot abandoned");
    }
}

enum Admission {
    /// A slot is held, but the task has not started yet.
    Granted,
    /// Waiting in the queue for a slot to be handed over.
    Queued(oneshot::Receiver<()>),
    /// The slot was turned into a [`Slot`].
    Used,
}

/// A place in line. Dropping it before the task starts gives up the place,
/// and gives back the slot if one had already been handed over.
struct Ticket {
    inner: Arc<Inner>,
    admission: Admission,
}

impl Ticket {
    async fn wait(mut self) -> Slot {
        if let Admission::Queued(rx) = &mut self.admission {
            // The sender is only dropped after a successful send, or after
            // our receiver was closed, and we hold the receiver open here.
            rx.await
                .expect("executor dropped a waiter without granting it a slot");
        }

        self.admission = Admission::Used;
        self.inner.start();

        Slot {
            inner: self.inner.clone(),
        }
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        match std::mem::replace(&mut self.admission, Admission::Used) {
            Admission::Granted => self.inner.abandon(),
            Admission::Queued(mut rx) => {
                rx.close();
                // A slot may have been handed over right before we closed.
                if rx.try_recv().is_ok() {
                    self.inner.abandon();
                }
            }
            Admission::Used => {}
        }
    }
}

/// An occupied slot. Released on drop, which covers success, failure, panic
/// and the caller dropping the future mid-run.
struct Slot {
    inner: Arc<Inner>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.inner.finish();
    }
}

impl Executor {
    /// Creates an executor that runs at most `capacity` tasks at once.
    pub fn new(capacity: usize) -> Result<Self, ExecutorError> {
        if capacity == 0 {
            return Err(ExecutorError::ZeroCapacity);
        }

        let (events, _) = broadcast::channel(EVENT_BUFFER);

        Ok(Self {
            inner: Arc::new(Inner {
                capacity,
                state: Mutex::new(State::default()),
                events,
            }),
        })
    }

    /// Runs `task` once a slot is available and returns its output.
    ///
    /// The caller is suspended while every slot is occupied or earlier callers
    /// are still waiting. The executor never inspects the output, so a failing
    /// task is reported only to this caller and the slot is released either
    /// way.
    pub async fn submit<F>(&self, task: F) -> F::Output
    where
        F: Future,
    {
        let _slot = self.inner.reserve().wait().await;
        task.await
    }

    /// Spawns `task` onto the current tokio runtime, gated by this executor.
    ///
    /// The place in the queue is taken synchronously, before this method
    /// returns, so tasks spawned one after another start in that order.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    pub fn spawn<F>(&self, task: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let ticket = self.inner.reserve();

        tokio::spawn(async move {
            let _slot = ticket.wait().await;
            task.await
        })
    }

    /// Subscribes to completion events. A [`Stats`] snapshot is published
    /// after every task finishes.
    pub fn subscribe(&self) -> broadcast::Receiver<Stats> {
        self.inner.events.subscribe()
    }

    pub fn stats(&self) -> Stats {
        self.inner.lock().snapshot(self.inner.capacity)
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn running(&self) -> usize {
        self.inner.lock().running
    }

    pub fn queued(&self) -> usize {
        self.stats().queued
    }

    pub fn executed(&self) -> u64 {
        self.inner.lock().executed
    }

    pub fn completed(&self) -> u64 {
        self.inner.lock().completed
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("stats", &self.stats())
            .finish()
    }
}
