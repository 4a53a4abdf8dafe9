//! Bounded, non-blocking worker pool.
//!
//! Each shard gets one pool so a slow or overloaded shard cannot starve its
//! siblings. Submission is strictly non-blocking: a job is handed to an idle
//! worker through a rendezvous channel, and if no worker is idle the
//! submission fails immediately with a capacity error — there is no queue
//! and no silent hang. Callers block only on their own job's completion.

use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::Mutex;
use std::thread::JoinHandle;

type Job = Box<dyn FnOnce() + Send>;

/// Submission failure.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// Every worker is busy.
    #[error("worker pool capacity exceeded")]
    CapacityExceeded,

    /// The pool has been shut down.
    #[error("worker pool terminated")]
    Terminated,
}

/// Fixed-size pool of worker threads with rendezvous hand-off.
pub struct WorkerPool {
    sender: Mutex<Option<SyncSender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    capacity: usize,
}

impl WorkerPool {
    /// Spawn a pool of `capacity` workers.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero; that is a construction-time misuse.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "worker pool capacity must be positive");

        // A rendezvous channel only accepts a send while a worker is parked
        // in `recv`, which makes `try_send` an exact idle-worker probe.
        let (sender, receiver) = mpsc::sync_channel::<Job>(0);
        let receiver = std::sync::Arc::new(Mutex::new(receiver));

        let workers = (0..capacity)
            .map(|i| {
                let receiver = std::sync::Arc::clone(&receiver);
                std::thread::Builder::new()
                    .name(format!("shard-worker-{i}"))
                    .spawn(move || loop {
                        let job = {
                            let guard = receiver.lock().expect("pool receiver poisoned");
                            guard.recv()
                        };
                        match job {
                            Ok(job) => job(),
                            Err(_) => return,
                        }
                    })
                    .expect("failed to spawn pool worker")
            })
            .collect();

        Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            capacity,
        }
    }

    /// The number of workers, which bounds concurrent jobs.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Run the closure on an idle worker and wait for its result.
    ///
    /// Fails immediately with [`PoolError::CapacityExceeded`] when no worker
    /// is idle — the caller sees backpressure, never an unbounded queue.
    pub fn execute<T, F>(&self, f: F) -> Result<T, PoolError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let sender = self
            .sender
            .lock()
            .expect("pool sender poisoned")
            .clone()
            .ok_or(PoolError::Terminated)?;

        let (done_tx, done_rx) = mpsc::channel();
        let job: Job = Box::new(move || {
            let _ = done_tx.send(f());
        });

        match sender.try_send(job) {
            Ok(()) => done_rx.recv().map_err(|_| PoolError::Terminated),
            Err(TrySendError::Full(_)) => Err(PoolError::CapacityExceeded),
            Err(TrySendError::Disconnected(_)) => Err(PoolError::Terminated),
        }
    }

    /// Stop accepting jobs and join the workers. In-flight jobs finish.
    pub fn shutdown(&self) {
        self.sender.lock().expect("pool sender poisoned").take();
        let workers = std::mem::take(&mut *self.workers.lock().expect("pool workers poisoned"));
        for worker in workers {
            let _ = worker.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;
    use std::sync::Arc;

    #[test]
    fn executes_and_returns_result() {
        let pool = WorkerPool::new(2);
        let result = pool.execute(|| 40 + 2).unwrap();
        assert_eq!(result, 42);
    }

    #[test]
    fn saturated_pool_rejects_immediately() {
        let pool = Arc::new(WorkerPool::new(1));

        // Occupy the single worker with a job that blocks until released.
        let (release_tx, release_rx) = channel::<()>();
        let (started_tx, started_rx) = channel::<()>();
        let blocker = {
            let pool = Arc::clone(&pool);
            std::thread::spawn(move || {
                pool.execute(move || {
                    started_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                })
                .unwrap();
            })
        };
        started_rx.recv().unwrap();

        let result = pool.execute(|| ());
        assert!(matches!(result, Err(PoolError::CapacityExceeded)));

        release_tx.send(()).unwrap();
        blocker.join().unwrap();
    }

    #[test]
    fn workers_become_idle_again() {
        let pool = WorkerPool::new(1);
        for i in 0..10 {
            assert_eq!(pool.execute(move || i).unwrap(), i);
        }
    }

    #[test]
    fn execute_after_shutdown_is_terminated() {
        let pool = WorkerPool::new(1);
        pool.shutdown();
        let result = pool.execute(|| ());
        assert!(matches!(result, Err(PoolError::Terminated)));
    }

    #[test]
    #[should_panic(expected = "capacity must be positive")]
    fn zero_capacity_panics() {
        WorkerPool::new(0);
    }
}
