//! Fixed-size worker pool for one batch of evaluation tasks
//!
//! Tasks are pushed into a shared injector queue and drained by scoped worker
//! threads plus the calling thread. `execute` returns only after every task
//! finished, which makes each call a join barrier.

use std::panic::{self, AssertUnwindSafe};

use crossbeam::channel::{self, Sender};
use crossbeam_deque::{Injector, Steal};

use crate::error::TaskError;

/// Worker pool configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPool {
    threads: usize,
}

impl WorkerPool {
    /// Pool with `threads` workers (0 = number of CPUs)
    pub fn new(threads: usize) -> Self {
        let threads = if threads == 0 {
            num_cpus::get()
        } else {
            threads
        };
        Self { threads }
    }

    /// Single-threaded pool; tasks run on the calling thread
    pub fn inline() -> Self {
        Self { threads: 1 }
    }

    /// Number of worker threads
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Run every task and wait for all of them
    ///
    /// Panics inside `run` are caught and reported as
    /// [`TaskError::Panicked`]. Results are sorted by task.
    pub(crate) fn execute<T, R, F>(&self, tasks: Vec<T>, run: F) -> Vec<(T, Result<R, TaskError>)>
    where
        T: Copy + Ord + Send,
        R: Send,
        F: Fn(T) -> Result<R, TaskError> + Sync,
    {
        let total = tasks.len();
        let injector = Injector::new();
        for task in tasks {
            injector.push(task);
        }

        let (sender, receiver) = channel::unbounded();
        let helpers = self.threads.min(total).saturating_sub(1);

        std::thread::scope(|scope| {
            for index in 0..helpers {
                let sender = sender.clone();
                let (injector, run) = (&injector, &run);
                let spawned = std::thread::Builder::new()
                    .name(format!("hookfinder-worker-{index}"))
                    .spawn_scoped(scope, move || drain(injector, run, &sender));
                match spawned {
                    Ok(_) => tracing::trace!(worker = index, "worker.spawn"),
                    Err(error) => {
                        tracing::warn!(worker = index, %error, "worker.spawn_failed");
                        break;
                    }
                }
            }
            // The calling thread drains too
            drain(&injector, &run, &sender);
        });
        drop(sender);

        let mut results: Vec<_> = receiver.try_iter().collect();
        results.sort_by_key(|(task, _)| *task);
        debug_assert_eq!(results.len(), total);
        results
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(0)
    }
}

fn drain<T, R, F>(injector: &Injector<T>, run: &F, results: &Sender<(T, Result<R, TaskError>)>)
where
    T: Copy,
    F: Fn(T) -> Result<R, TaskError>,
{
    loop {
        match injector.steal() {
            Steal::Success(task) => {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| run(task)))
                    .unwrap_or_else(|payload| Err(TaskError::from_panic(payload)));
                if results.send((task, outcome)).is_err() {
                    return;
                }
            }
            Steal::Retry => continue,
            Steal::Empty => return,
        }
    }
}
