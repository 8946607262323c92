// src/exec/runner.rs

//! Orchestration loops around the resolvers.
//!
//! Both runners repeat acquire → process → release until the resolver
//! reports that no module is left. The concurrent runner turns the first
//! failure of any worker into an `abort()`, so the remaining workers stop
//! instead of draining modules whose processing is pointless after a hard
//! failure.

use std::thread;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::dag::{CancelToken, ConcurrentResolver, SequentialResolver};
use crate::errors::ResolveError;
use crate::exec::processor::Processor;
use crate::module::{ModuleId, ModuleRef};

/// Summary of a completed run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Processed modules, in completion order.
    pub processed: Vec<ModuleId>,
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Resolve(ResolveError),

    #[error("Processing module '{module}' failed: {error:#}")]
    Processing {
        module: ModuleId,
        error: anyhow::Error,
    },

    #[error("A worker thread panicked")]
    WorkerPanicked,

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Run was cancelled")]
    Cancelled,
}

impl From<ResolveError> for RunError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Cancelled => RunError::Cancelled,
            other => RunError::Resolve(other),
        }
    }
}

/// Process every module reachable from `roots` on the calling thread.
pub fn run_sequential<P>(roots: &[ModuleRef], processor: &P) -> Result<RunReport, RunError>
where
    P: Processor + ?Sized,
{
    let mut resolver = SequentialResolver::new();
    resolver.init(roots)?;

    let mut report = RunReport::default();
    while let Some(module) = resolver.acquire_free()? {
        debug!(module = %module.id(), "processing module");
        processor
            .process(&module)
            .map_err(|error| RunError::Processing {
                module: module.id().clone(),
                error,
            })?;
        resolver.release(&module)?;
        report.processed.push(module.id().clone());
    }

    info!(processed = report.processed.len(), "sequential run complete");
    Ok(report)
}

/// Process every module reachable from `roots` with `workers` threads.
pub fn run_concurrent<P>(
    roots: &[ModuleRef],
    workers: usize,
    processor: &P,
) -> Result<RunReport, RunError>
where
    P: Processor + ?Sized,
{
    run_concurrent_with_cancel(roots, workers, processor, &CancelToken::new())
}

/// [`run_concurrent`] that also stops when `cancel` is cancelled, returning
/// [`RunError::Cancelled`].
pub fn run_concurrent_with_cancel<P>(
    roots: &[ModuleRef],
    workers: usize,
    processor: &P,
    cancel: &CancelToken,
) -> Result<RunReport, RunError>
where
    P: Processor + ?Sized,
{
    let resolver = ConcurrentResolver::new();
    resolver.init(roots)?;

    let workers = workers.max(1);
    let ctx = WorkerContext {
        resolver: &resolver,
        processor,
        cancel,
        processed: Mutex::new(Vec::new()),
        failure: Mutex::new(None),
    };

    info!(workers, "starting concurrent run");

    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let ctx = &ctx;
            let spawned = thread::Builder::new()
                .name(format!("depflow-worker-{worker}"))
                .spawn_scoped(scope, move || ctx.work(worker));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    ctx.fail(RunError::Spawn(err));
                    break;
                }
            }
        }

        for handle in handles {
            if handle.join().is_err() {
                ctx.fail(RunError::WorkerPanicked);
            }
        }
    });

    if let Some(err) = ctx.failure.into_inner() {
        return Err(err);
    }

    let report = RunReport {
        processed: ctx.processed.into_inner(),
    };
    info!(processed = report.processed.len(), "concurrent run complete");
    Ok(report)
}

struct WorkerContext<'a, P: ?Sized> {
    resolver: &'a ConcurrentResolver,
    processor: &'a P,
    cancel: &'a CancelToken,
    processed: Mutex<Vec<ModuleId>>,
    /// First failure of any worker; later ones are only logged.
    failure: Mutex<Option<RunError>>,
}

impl<P: Processor + ?Sized> WorkerContext<'_, P> {
    fn work(&self, worker: usize) {
        let _guard = AbortOnPanic(self.resolver);

        loop {
            let module = match self.resolver.acquire_free_cancellable(self.cancel) {
                Ok(Some(module)) => module,
                Ok(None) => {
                    debug!(worker, "no module left; worker exiting");
                    return;
                }
                Err(err) => {
                    self.fail(err.into());
                    return;
                }
            };

            debug!(worker, module = %module.id(), "processing module");
            if let Err(error) = self.processor.process(&module) {
                self.fail(RunError::Processing {
                    module: module.id().clone(),
                    error,
                });
                return;
            }

            if let Err(err) = self.resolver.release(&module) {
                self.fail(err.into());
                return;
            }
            self.processed.lock().push(module.id().clone());
        }
    }

    fn fail(&self, err: RunError) {
        self.resolver.abort();

        let mut failure = self.failure.lock();
        if failure.is_none() {
            error!(error = %err, "run failed; aborting remaining work");
            *failure = Some(err);
        } else {
            debug!(error = %err, "additional failure after abort");
        }
    }
}

/// Aborts the run if the owning worker unwinds, so siblings blocked on the
/// modules it held do not wait forever.
struct AbortOnPanic<'a>(&'a ConcurrentResolver);

impl Drop for AbortOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.abort();
        }
    }
}
