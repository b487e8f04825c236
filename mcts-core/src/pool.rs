use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use crossbeam::channel::{self, Receiver, Sender};

use crate::error::SelectorError;

/// Capability set shared by an externally-supplied pool and the bundled
/// one. `queue` hands off a unit of work; `wait_done`, when supported,
/// blocks until the pool's queue has drained. A pool that can't support
/// that (most can't, in general) leaves callers to use a
/// [`BatchBarrier`] instead.
pub trait WorkerPool: Send + Sync {
    fn queue(&self, task: Box<dyn FnOnce() + Send>);

    fn supports_wait_done(&self) -> bool {
        false
    }

    /// Only meaningful when `supports_wait_done()` is true.
    fn wait_done(&self) {}

    fn shutdown(&self) -> Result<(), SelectorError>;
}

enum Task {
    Run(Box<dyn FnOnce() + Send>),
    Shutdown,
}

/// Fixed-size pool of worker threads reading from an unbounded channel,
/// dispatched the same way `kz-selfplay/src/server/generator.rs` hands
/// work off over a `crossbeam::channel` to long-lived threads. Does not
/// implement `wait_done` itself; the selector's own
/// [`crate::pool::BatchBarrier`] is the supported drain mechanism.
pub struct CrossbeamWorkerPool {
    sender: Sender<Task>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl CrossbeamWorkerPool {
    pub fn new(worker_count: usize) -> Self {
        let (sender, receiver) = channel::unbounded::<Task>();
        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let receiver: Receiver<Task> = receiver.clone();
            let handle = std::thread::Builder::new()
                .name(format!("mcts-selector-worker-{worker_id}"))
                .spawn(move || loop {
                    match receiver.recv() {
                        Ok(Task::Run(task)) => {
                            if let Err(panic) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(task)) {
                                tracing::warn!(?worker_id, ?panic, "leaf selector worker task panicked");
                            }
                        }
                        Ok(Task::Shutdown) | Err(_) => break,
                    }
                })
                .expect("failed to spawn leaf selector worker thread");
            workers.push(handle);
        }

        CrossbeamWorkerPool {
            sender,
            workers: Mutex::new(workers),
        }
    }
}

impl WorkerPool for CrossbeamWorkerPool {
    fn queue(&self, task: Box<dyn FnOnce() + Send>) {
        self.sender
            .send(Task::Run(task))
            .expect("leaf selector worker pool channel closed while queuing work");
    }

    fn shutdown(&self) -> Result<(), SelectorError> {
        let mut workers = self.workers.lock().unwrap();
        for _ in workers.iter() {
            let _ = self.sender.send(Task::Shutdown);
        }
        for handle in workers.drain(..) {
            handle.join().map_err(|_| SelectorError::PoolShutdown("worker thread panicked".to_string()))?;
        }
        Ok(())
    }
}

/// Countdown synchronization primitive seeded to 1, incremented by the
/// count of dispatched work, decremented by 1 per unit finalized. Counts
/// in units of *dispatched descents*, not individual leaves: the number of
/// leaves a dispatched subtree will actually emit isn't known until it
/// returns (some visits land on already-claimed siblings and are silently
/// absorbed), so "one unit per `pool.queue` call" is the granularity that
/// can be known up front.
pub struct BatchBarrier {
    remaining: Mutex<usize>,
    cond: Condvar,
}

impl BatchBarrier {
    pub fn new() -> Arc<Self> {
        Arc::new(BatchBarrier {
            remaining: Mutex::new(1),
            cond: Condvar::new(),
        })
    }

    pub fn add_expected(&self, units: usize) {
        *self.remaining.lock().unwrap() += units;
    }

    pub fn finish_one(&self) {
        let mut remaining = self.remaining.lock().unwrap();
        *remaining -= 1;
        if *remaining == 0 {
            self.cond.notify_all();
        }
    }

    pub fn wait(&self) {
        let mut remaining = self.remaining.lock().unwrap();
        while *remaining != 0 {
            remaining = self.cond.wait(remaining).unwrap();
        }
    }
}
