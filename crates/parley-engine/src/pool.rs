// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded worker admission pool.
//!
//! At most `workers` generation tasks run at once; further submissions wait
//! in a queue of at most `queue_high_water` entries and are rejected beyond
//! that. Shutdown cancels every queued and running task and waits for them
//! to finish their terminal bookkeeping.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parley_core::ParleyError;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Default number of concurrently running generation tasks.
pub const DEFAULT_WORKERS: usize = 100;

/// Process-wide task admission. Cheap to clone.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    permits: Arc<Semaphore>,
    workers: usize,
    queued: AtomicUsize,
    high_water: usize,
    root: CancellationToken,
    tracker: TaskTracker,
}

impl WorkerPool {
    pub fn new(workers: usize, high_water: usize) -> Self {
        let workers = workers.max(1);
        Self {
            inner: Arc::new(PoolInner {
                permits: Arc::new(Semaphore::new(workers)),
                workers,
                queued: AtomicUsize::new(0),
                high_water: high_water.max(1),
                root: CancellationToken::new(),
                tracker: TaskTracker::new(),
            }),
        }
    }

    /// Reserves a queue slot for one task.
    ///
    /// Fails with [`ParleyError::PoolSaturated`] above the high-water mark
    /// and with [`ParleyError::Cancelled`] once shutdown has begun.
    pub fn reserve(&self) -> Result<QueueSlot, ParleyError> {
        if self.inner.root.is_cancelled() {
            return Err(ParleyError::Cancelled);
        }
        let high_water = self.inner.high_water;
        self.inner
            .queued
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |queued| {
                (queued < high_water).then_some(queued + 1)
            })
            .map_err(|queued| {
                warn!(queued, high_water, "generation queue saturated");
                ParleyError::PoolSaturated
            })?;
        Ok(QueueSlot {
            pool: self.clone(),
            held: true,
        })
    }

    /// Runs a best-effort background job outside the worker limit.
    ///
    /// The job's token fires on pool shutdown and nowhere else, so it
    /// outlives the request that triggered it.
    pub fn spawn_background<F, Fut>(&self, job: F)
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = self.inner.root.child_token();
        self.inner.tracker.spawn(job(token));
    }

    /// Tasks waiting for a worker.
    pub fn queued(&self) -> usize {
        self.inner.queued.load(Ordering::Acquire)
    }

    /// Tasks currently holding a worker.
    pub fn running(&self) -> usize {
        self.inner.workers - self.inner.permits.available_permits()
    }

    pub fn workers(&self) -> usize {
        self.inner.workers
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.root.is_cancelled()
    }

    /// Cancels every queued, running, and background task and waits up to
    /// `timeout` for them to finish.
    pub async fn shutdown(&self, timeout: Duration) {
        info!(
            running = self.running(),
            queued = self.queued(),
            "worker pool shutting down"
        );
        self.inner.root.cancel();
        self.inner.tracker.close();
        if tokio::time::timeout(timeout, self.inner.tracker.wait())
            .await
            .is_err()
        {
            warn!(
                remaining = self.inner.tracker.len(),
                "worker pool drain timed out"
            );
        } else {
            info!("worker pool drained");
        }
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS, DEFAULT_WORKERS * 10)
    }
}

/// A reserved place in the pool queue, released when the task gets a
/// worker or when the slot is dropped unused.
pub struct QueueSlot {
    pool: WorkerPool,
    held: bool,
}

impl QueueSlot {
    /// Spawns `job` once a worker is free.
    ///
    /// The job's token is a child of `parent`, and is also cancelled on pool
    /// shutdown. A job still queued at shutdown runs immediately with an
    /// already-cancelled token so it can release what it owns.
    pub fn spawn<F, Fut>(self, parent: &CancellationToken, job: F)
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = parent.child_token();
        let inner = Arc::clone(&self.pool.inner);
        let root = inner.root.clone();
        let permits = Arc::clone(&inner.permits);

        inner.tracker.spawn(async move {
            let mut slot = self;
            let permit = tokio::select! {
                biased;
                _ = root.cancelled() => None,
                permit = permits.acquire_owned() => permit.ok(),
            };
            slot.release();
            if permit.is_none() {
                debug!("queued task drained by shutdown");
                token.cancel();
            }

            let job = job(token.clone());
            tokio::pin!(job);
            tokio::select! {
                () = &mut job => return,
                _ = root.cancelled() => token.cancel(),
            }
            job.await;
            drop(permit);
        });
    }

    fn release(&mut self) {
        if std::mem::take(&mut self.held) {
            self.pool.inner.queued.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

impl Drop for QueueSlot {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[tokio::test]
    async fn runs_at_most_workers_at_once() {
        let pool = WorkerPool::new(2, 10);
        let peak = Arc::new(AtomicUsize::new(0));
        let current = Arc::new(AtomicUsize::new(0));
        let parent = CancellationToken::new();
        let (done_tx, mut done_rx) = tokio::sync::mpsc::channel(6);

        for _ in 0..6 {
            let peak = Arc::clone(&peak);
            let current = Arc::clone(&current);
            let done_tx = done_tx.clone();
            pool.reserve().unwrap().spawn(&parent, move |_| async move {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                current.fetch_sub(1, Ordering::SeqCst);
                let _ = done_tx.send(()).await;
            });
        }
        for _ in 0..6 {
            done_rx.recv().await.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(pool.queued(), 0);
    }

    #[tokio::test]
    async fn rejects_above_high_water() {
        let pool = WorkerPool::new(1, 2);
        let first = pool.reserve().unwrap();
        let _second = pool.reserve().unwrap();
        assert!(matches!(pool.reserve(), Err(ParleyError::PoolSaturated)));
        drop(first);
        assert_eq!(pool.queued(), 1);
        assert!(pool.reserve().is_ok());
    }

    #[tokio::test]
    async fn parent_cancel_reaches_task() {
        let pool = WorkerPool::new(1, 4);
        let parent = CancellationToken::new();
        let (tx, rx) = tokio::sync::oneshot::channel();
        pool.reserve().unwrap().spawn(&parent, move |token| async move {
            token.cancelled().await;
            let _ = tx.send(());
        });
        parent.cancel();
        tokio::time::timeout(Duration::from_secs(1), rx)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn shutdown_runs_queued_tasks_cancelled() {
        let pool = WorkerPool::new(1, 4);
        let parent = CancellationToken::new();
        let gate = CancellationToken::new();

        let blocker = gate.clone();
        pool.reserve().unwrap().spawn(&parent, move |token| async move {
            tokio::select! {
                _ = blocker.cancelled() => {}
                _ = token.cancelled() => {}
            }
        });

        let saw_cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&saw_cancelled);
        pool.reserve().unwrap().spawn(&parent, move |token| async move {
            flag.store(token.is_cancelled(), Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(pool.running(), 1);
        assert_eq!(pool.queued(), 1);

        pool.shutdown(Duration::from_secs(5)).await;
        assert!(saw_cancelled.load(Ordering::SeqCst));
        assert!(matches!(pool.reserve(), Err(ParleyError::Cancelled)));
    }

    #[tokio::test]
    async fn background_jobs_observe_shutdown() {
        let pool = WorkerPool::new(1, 1);
        let done = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&done);
        pool.spawn_background(move |token| async move {
            token.cancelled().await;
            flag.store(true, Ordering::SeqCst);
        });
        pool.shutdown(Duration::from_secs(5)).await;
        assert!(done.load(Ordering::SeqCst));
    }
}
