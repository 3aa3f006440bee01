//! Fixed-point resolution scheduler
//!
//! Resolution runs in sweeps. Each sweep visits the categories Class, Field,
//! Method and Constructor in order; for each category it snapshots the ready
//! matchers (dependency count 1), evaluates them on the worker pool and waits
//! at a join barrier before moving on. Publishing a result decrements the
//! counts of its dependents, which become ready for a later category of the
//! same sweep or for the next sweep. The loop stops after a sweep that
//! publishes nothing.
//!
//! ```text
//! sweep 1: [Class]──barrier──[Field]──barrier──[Method]──barrier──[Constructor]
//! sweep 2: [Class]── ...
//! ```

mod eval;
mod pool;

pub use pool::WorkerPool;

use parking_lot::Mutex;

use crate::catalog::NameCatalog;
use crate::config::SessionConfig;
use crate::error::{root_cause, MatchError, TaskError};
use crate::matcher::{DependencyGraph, EntityKind, SlotId};
use crate::policy::{Decision, ExceptionPolicy};
use crate::reflect::Reflector;
use crate::result::Failure;

/// Summary of a completed run
#[derive(Debug, Default)]
pub(crate) struct Resolution {
    pub sweeps: usize,
    pub failures: Vec<Failure>,
}

/// One resolution run over a finalized graph
pub(crate) struct Scheduler<'a> {
    graph: &'a DependencyGraph,
    catalog: &'a NameCatalog,
    reflector: &'a dyn Reflector,
    policy: &'a dyn ExceptionPolicy,
    pool: WorkerPool,
    config: &'a SessionConfig,
    failures: Mutex<Vec<Failure>>,
}

impl<'a> Scheduler<'a> {
    pub fn new(
        graph: &'a DependencyGraph,
        catalog: &'a NameCatalog,
        reflector: &'a dyn Reflector,
        policy: &'a dyn ExceptionPolicy,
        pool: WorkerPool,
        config: &'a SessionConfig,
    ) -> Self {
        Self {
            graph,
            catalog,
            reflector,
            policy,
            pool,
            config,
            failures: Mutex::new(Vec::new()),
        }
    }

    /// Sweep until a sweep publishes nothing
    ///
    /// Task failures are offered to the exception policy and the failed
    /// matcher is published empty. Protocol violations end the run.
    pub fn run(self) -> Result<Resolution, MatchError> {
        tracing::debug!(
            matchers = self.graph.len(),
            workers = self.pool.threads(),
            "resolve.start"
        );

        let mut sweep = 0;
        loop {
            sweep += 1;
            let mut published = 0;

            for kind in EntityKind::scheduled() {
                let ready = self.ready(kind);
                if ready.is_empty() {
                    continue;
                }
                tracing::debug!(sweep, category = ?kind, ready = ready.len(), "sweep.category");

                let results = self.pool.execute(ready, |slot| self.evaluate(slot, sweep));
                for (slot, result) in results {
                    match result {
                        Ok(_) => published += 1,
                        Err(TaskError::Protocol(err)) => return Err(err),
                        Err(err) => {
                            self.fail(slot, &err);
                            if self.graph.matcher(slot).is_ready() {
                                let publication = self.graph.publish(slot, Vec::new(), sweep)?;
                                self.observer_panics(slot, publication.panics);
                            }
                            published += 1;
                        }
                    }
                }
            }

            tracing::debug!(sweep, published, "sweep.done");
            if published == 0 {
                break;
            }
        }

        let failures = self.failures.into_inner();
        tracing::debug!(sweeps = sweep, failures = failures.len(), "resolve.done");
        Ok(Resolution {
            sweeps: sweep,
            failures,
        })
    }

    /// Ready, unpruned matchers of `kind` in slot order
    fn ready(&self, kind: EntityKind) -> Vec<SlotId> {
        self.graph
            .ids()
            .filter(|id| {
                let matcher = self.graph.matcher(*id);
                matcher.kind == kind
                    && matcher.is_ready()
                    && !matcher.is_pruned(self.config.prune_unconsumed)
            })
            .collect()
    }

    /// Record observers of `slot` that panicked while it was published
    pub fn observer_panics(&self, slot: SlotId, panics: Vec<TaskError>) {
        for err in panics {
            self.fail(slot, &err);
        }
    }

    fn fail(&self, slot: SlotId, err: &TaskError) {
        let cause = root_cause(err);
        let decision = self.policy.decide(cause);
        tracing::warn!(slot = %slot, error = %err, ?decision, "task.failed");
        self.record(slot, cause.to_string(), decision);
    }

    fn record(&self, slot: SlotId, message: String, decision: Decision) {
        self.failures.lock().push(Failure {
            slot,
            message,
            decision,
        });
    }
}
