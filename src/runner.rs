use crate::error::Error;
use crate::progress::SyncReporter;
use crate::report::{Phase, PhaseReport, TaskOutcome};
use crate::transport::TransportError;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use tracing::{debug, warn};

/// Pool size for short per-file operations (delete, re-stamp).
pub const DEFAULT_CONCURRENCY: usize = 8;
/// Pool size for pushes, which are long-running and contend for the bridge.
pub const UPLOAD_CONCURRENCY: usize = 4;

/// Runs independent tasks on a fixed-size worker pool and waits for all of them.
///
/// Each call builds its own pool scoped to that batch. Every task runs exactly
/// once, in no particular order, and nothing is cancelled once started.
#[derive(Debug, Clone, Copy)]
pub struct TaskRunner {
    max_concurrency: usize,
}

impl Default for TaskRunner {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

impl TaskRunner {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Returns one result per task. A task that panics does not stop the rest
    /// of the batch; once everything has finished the panic is reported as
    /// [`Error::TaskPanicked`].
    pub fn run_all<T, F>(&self, phase: Phase, tasks: Vec<F>) -> Result<Vec<T>, Error>
    where
        F: FnOnce() -> T + Send,
        T: Send,
    {
        if tasks.is_empty() {
            return Ok(Vec::new());
        }

        let threads = self.max_concurrency.min(tasks.len());
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(move |i| format!("{}-worker-{}", phase, i))
            .build()?;
        debug!("Running {} {} task(s) on {} worker(s)", tasks.len(), phase, threads);

        // One task per job so a slow task never holds others back on its thread.
        let results: Vec<std::thread::Result<T>> = pool.install(|| {
            tasks
                .into_par_iter()
                .with_max_len(1)
                .map(|task| panic::catch_unwind(AssertUnwindSafe(task)))
                .collect()
        });

        let mut outcomes = Vec::with_capacity(results.len());
        let mut panicked = 0;
        for result in results {
            match result {
                Ok(value) => outcomes.push(value),
                Err(_) => panicked += 1,
            }
        }

        if panicked > 0 {
            return Err(Error::TaskPanicked {
                phase,
                count: panicked,
            });
        }
        Ok(outcomes)
    }

    /// Applies `op` to every name and collects the per-file outcome log.
    pub fn run_phase<'a, I, F>(
        &self,
        phase: Phase,
        names: I,
        reporter: &dyn SyncReporter,
        op: F,
    ) -> Result<PhaseReport, Error>
    where
        I: IntoIterator<Item = &'a String>,
        F: Fn(&str) -> Result<(), TransportError> + Sync,
    {
        let names: Vec<&String> = names.into_iter().collect();
        reporter.on_phase_start(phase, names.len());
        let start = Instant::now();

        let op = &op;
        let tasks: Vec<_> = names
            .into_iter()
            .map(|name| {
                move || {
                    let result = op(name.as_str());
                    if let Err(e) = &result {
                        warn!("{} of '{}' failed: {}", phase, name, e);
                    } else {
                        debug!("{} of '{}' succeeded", phase, name);
                    }
                    reporter.on_task_complete(phase, name, result.is_ok());
                    (name.clone(), TaskOutcome::from_result(result))
                }
            })
            .collect();

        let outcomes = self.run_all(phase, tasks)?;
        let report = PhaseReport {
            phase,
            outcomes: outcomes.into_iter().collect(),
            duration: start.elapsed(),
        };
        reporter.on_phase_complete(&report);
        Ok(report)
    }
}
