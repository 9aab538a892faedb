/*!
 * Bounded Thread Pool
 *
 * Reusable worker threads with a queued backlog and idle-timeout
 * retirement.
 *
 * # Design
 *
 * Submission prefers, in order: the longest-idle worker, a freshly spawned
 * worker (while below `max_workers`), then the backlog. Idle workers and
 * queued tasks each carry a [`Completion`]; whoever hands over work
 * completes it under the pool lock.
 *
 * Workers: RUNNING → IDLE → (RUNNING | RETIRED). A worker retires when its
 * keep-alive elapses without work, or when shutdown is observed with an
 * empty backlog. The last worker to retire after shutdown marks the pool
 * terminated.
 */

use super::types::{PoolConfig, PoolLifecycle};
use crate::core::data_structures::OrderedSlots;
use crate::core::errors::{SyncError, SyncResult};
use crate::core::sync::{CancellationToken, Completion, Timeout, WaitOutcome};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info};

type Job = Box<dyn FnOnce() + Send + 'static>;

struct QueuedTask {
    job: Job,
    claimed: Completion<()>,
}

struct PoolState {
    lifecycle: PoolLifecycle,
    /// Live workers, running or idle
    active: usize,
    idle: OrderedSlots<Completion<Job>>,
    backlog: OrderedSlots<QueuedTask>,
    spawned: usize,
}

impl PoolState {
    /// Hand a task to the backlog's oldest entry, marking it claimed
    fn claim_queued(&mut self) -> Option<Job> {
        let task = self.backlog.pop_head()?;
        let _ = task.claimed.complete(());
        Some(task.job)
    }
}

struct PoolShared {
    config: PoolConfig,
    state: Mutex<PoolState>,
    terminated: Condvar,
    /// Cancelled once on shutdown; wakes every idle worker
    shutdown_signal: CancellationToken,
}

impl PoolShared {
    fn retire(&self, state: &mut PoolState) {
        state.active -= 1;
        if state.active == 0 && state.lifecycle == PoolLifecycle::ShuttingDown {
            state.lifecycle = PoolLifecycle::Terminated;
            self.terminated.notify_all();
            info!("thread pool terminated");
        }
    }
}

/// Fixed-ceiling pool of reusable worker threads
pub struct BoundedThreadPool {
    shared: Arc<PoolShared>,
}

impl BoundedThreadPool {
    pub fn new(config: PoolConfig) -> SyncResult<Self> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(PoolShared {
                config,
                state: Mutex::new(PoolState {
                    lifecycle: PoolLifecycle::Accepting,
                    active: 0,
                    idle: OrderedSlots::new(),
                    backlog: OrderedSlots::new(),
                    spawned: 0,
                }),
                terminated: Condvar::new(),
                shutdown_signal: CancellationToken::new(),
            }),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Submit `task`, waiting at most `timeout` for a worker to claim it
    ///
    /// Returns `Ok(false)` when no worker took the task in time; the task is
    /// then discarded. Fails with `Rejected` once shutdown has begun.
    pub fn execute<F>(&self, task: F, timeout: impl Into<Timeout>) -> SyncResult<bool>
    where
        F: FnOnce() + Send + 'static,
    {
        self.execute_inner(Box::new(task), timeout.into(), None)
    }

    /// Like [`execute`](Self::execute), abandoning a queued wait when `token`
    /// fires
    ///
    /// A task claimed before the cancellation was observed counts as
    /// accepted.
    pub fn execute_cancellable<F>(
        &self,
        task: F,
        timeout: impl Into<Timeout>,
        token: &CancellationToken,
    ) -> SyncResult<bool>
    where
        F: FnOnce() + Send + 'static,
    {
        self.execute_inner(Box::new(task), timeout.into(), Some(token))
    }

    fn execute_inner(
        &self,
        job: Job,
        timeout: Timeout,
        token: Option<&CancellationToken>,
    ) -> SyncResult<bool> {
        let deadline = timeout.start();
        let (claimed, slot) = {
            let mut state = self.shared.state.lock();
            if state.lifecycle != PoolLifecycle::Accepting {
                return Err(SyncError::Rejected("thread pool is shutting down".into()));
            }

            let mut job = job;
            while let Some(worker) = state.idle.pop_head() {
                match worker.complete(job) {
                    Ok(()) => return Ok(true),
                    Err(returned) => job = returned,
                }
            }

            if state.active < self.shared.config.max_workers {
                self.spawn_worker(&mut state, job)?;
                return Ok(true);
            }

            if timeout.is_no_wait() {
                return Ok(false);
            }
            let claimed = Completion::new();
            let slot = state.backlog.push_tail(QueuedTask {
                job,
                claimed: claimed.clone(),
            });
            (claimed, slot)
        };

        let outcome = claimed.wait(&deadline, token);

        let mut state = self.shared.state.lock();
        if claimed.is_complete() {
            return Ok(true);
        }
        state.backlog.remove(slot);
        match outcome {
            WaitOutcome::Cancelled => Err(SyncError::Cancelled),
            WaitOutcome::TimedOut | WaitOutcome::Completed => Ok(false),
        }
    }

    fn spawn_worker(&self, state: &mut PoolState, first: Job) -> SyncResult<()> {
        let id = state.spawned;
        let shared = Arc::clone(&self.shared);
        thread::Builder::new()
            .name(format!("{}-{}", self.shared.config.thread_name_prefix, id))
            .spawn(move || worker_loop(shared, first))?;

        state.spawned += 1;
        state.active += 1;
        debug!(worker = id, active = state.active, "worker spawned");
        Ok(())
    }

    /// Stop accepting work; queued tasks still run
    ///
    /// Idempotent and non-blocking. Callers already waiting in `execute`
    /// keep waiting until claimed or timed out.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock();
            if state.lifecycle != PoolLifecycle::Accepting {
                return;
            }
            state.lifecycle = PoolLifecycle::ShuttingDown;
            info!(
                active = state.active,
                queued = state.backlog.len(),
                "thread pool shutting down"
            );
            if state.active == 0 {
                state.lifecycle = PoolLifecycle::Terminated;
                self.shared.terminated.notify_all();
                info!("thread pool terminated");
            }
        }
        self.shared.shutdown_signal.cancel();
    }

    /// Wait until every worker has retired after shutdown
    pub fn await_termination(&self, timeout: impl Into<Timeout>) -> bool {
        let deadline = timeout.into().start();
        let mut state = self.shared.state.lock();
        loop {
            if state.lifecycle == PoolLifecycle::Terminated {
                return true;
            }
            match deadline.instant() {
                None => self.shared.terminated.wait(&mut state),
                Some(at) => {
                    if deadline.is_expired() {
                        return false;
                    }
                    let _ = self.shared.terminated.wait_until(&mut state, at);
                }
            }
        }
    }

    pub fn lifecycle(&self) -> PoolLifecycle {
        self.shared.state.lock().lifecycle
    }

    pub fn is_shutdown(&self) -> bool {
        self.lifecycle() != PoolLifecycle::Accepting
    }

    pub fn is_terminated(&self) -> bool {
        self.lifecycle() == PoolLifecycle::Terminated
    }

    /// Live workers, running or idle
    pub fn active_workers(&self) -> usize {
        self.shared.state.lock().active
    }

    pub fn idle_workers(&self) -> usize {
        self.shared.state.lock().idle.len()
    }

    pub fn queued_tasks(&self) -> usize {
        self.shared.state.lock().backlog.len()
    }
}

/// Dropping the pool shuts it down without waiting
impl Drop for BoundedThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for BoundedThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("BoundedThreadPool")
            .field("lifecycle", &state.lifecycle)
            .field("active", &state.active)
            .field("idle", &state.idle.len())
            .field("queued", &state.backlog.len())
            .finish()
    }
}

fn run_job(job: Job) {
    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
        error!(
            worker = thread::current().name().unwrap_or("unnamed"),
            "task panicked; worker continues"
        );
    }
}

fn worker_loop(shared: Arc<PoolShared>, first: Job) {
    let mut job = first;
    loop {
        run_job(job);

        let (wake, slot) = {
            let mut state = shared.state.lock();
            if let Some(next) = state.claim_queued() {
                job = next;
                continue;
            }
            if state.lifecycle != PoolLifecycle::Accepting {
                shared.retire(&mut state);
                return;
            }
            let wake = Completion::new();
            let slot = state.idle.push_tail(wake.clone());
            (wake, slot)
        };

        let deadline = Timeout::from(shared.config.keep_alive).start();
        let _ = wake.wait(&deadline, Some(&shared.shutdown_signal));

        let mut state = shared.state.lock();
        if let Some(next) = wake.take() {
            job = next;
            continue;
        }
        state.idle.remove(slot);
        if let Some(next) = state.claim_queued() {
            job = next;
            continue;
        }
        debug!(
            shutting_down = state.lifecycle != PoolLifecycle::Accepting,
            "worker retiring"
        );
        shared.retire(&mut state);
        return;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn pool(max_workers: usize, keep_alive: Duration) -> BoundedThreadPool {
        BoundedThreadPool::new(PoolConfig::new(max_workers, keep_alive)).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = BoundedThreadPool::new(PoolConfig::new(0, Duration::from_secs(1))).unwrap_err();
        assert!(matches!(err, SyncError::InvalidArgument(_)));
    }

    #[test]
    fn test_runs_tasks_and_reuses_workers() {
        let pool = pool(2, Duration::from_secs(5));
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..20 {
            let counter = counter.clone();
            assert_eq!(
                pool.execute(
                    move || {
                        counter.fetch_add(1, Ordering::SeqCst);
                    },
                    Timeout::Forever
                ),
                Ok(true)
            );
        }

        pool.shutdown();
        assert!(pool.await_termination(Duration::from_secs(5)));
        assert_eq!(counter.load(Ordering::SeqCst), 20);
        assert_eq!(pool.active_workers(), 0);
    }

    #[test]
    fn test_shutdown_without_workers_terminates_immediately() {
        let pool = pool(1, Duration::from_secs(1));
        pool.shutdown();
        assert!(pool.is_terminated());
        assert!(pool.await_termination(Timeout::NoWait));
        assert!(pool.execute(|| {}, Timeout::NoWait).unwrap_err().is_rejected());
    }

    #[test]
    fn test_idle_worker_retires_after_keep_alive() {
        let pool = pool(1, Duration::from_millis(30));
        assert_eq!(pool.execute(|| {}, Timeout::NoWait), Ok(true));
        thread::sleep(Duration::from_millis(300));
        assert_eq!(pool.active_workers(), 0);
        assert_eq!(pool.idle_workers(), 0);
    }

    #[test]
    fn test_panicking_task_keeps_accounting() {
        let pool = pool(1, Duration::from_secs(5));
        assert_eq!(pool.execute(|| panic!("boom"), Timeout::NoWait), Ok(true));

        let (tx, rx) = std::sync::mpsc::channel();
        assert_eq!(
            pool.execute(move || tx.send(()).unwrap(), Duration::from_secs(5)),
            Ok(true)
        );
        rx.recv_timeout(Duration::from_secs(5)).unwrap();

        pool.shutdown();
        assert!(pool.await_termination(Duration::from_secs(5)));
    }
}
