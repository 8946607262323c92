// src/dag/concurrent.rs

//! Multi-worker resolver.
//!
//! All mutable state sits behind one monitor (a mutex plus a condition
//! variable). Workers call [`ConcurrentResolver::acquire_free`], which blocks
//! while other workers still hold modules that may free new ones, and
//! [`ConcurrentResolver::release`] when done. [`ConcurrentResolver::abort`]
//! stops the run cooperatively: no further module is handed out and every
//! blocked worker wakes up with `None`.
//!
//! The only suspension point is the condition wait inside `acquire_free`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, trace};

use crate::dag::cancel::{CancelToken, WakeWaiters};
use crate::dag::graph::{NodeGraph, NodeId, build_graph};
use crate::errors::ResolveError;
use crate::module::{ModuleKey, ModuleRef};

/// Externally visible lifecycle of a [`ConcurrentResolver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Uninitialized,
    /// Modules remain to be handed out or released.
    Running,
    /// Every module has been acquired and released.
    Exhausted,
    Aborted,
}

#[derive(Debug)]
struct ConcurrentRun {
    graph: NodeGraph,
    /// Free nodes not yet handed out; most recently freed first.
    shortlist: Vec<NodeId>,
    acquired: HashMap<ModuleKey, NodeId>,
    /// Nodes not yet handed out.
    remaining: usize,
    aborted: bool,
}

#[derive(Debug, Default)]
struct Monitor {
    state: Mutex<Option<ConcurrentRun>>,
    changed: Condvar,
    /// Callers parked on `changed`; only updated with `state` held.
    waiting: AtomicUsize,
}

impl WakeWaiters for Monitor {
    fn wake_all(&self) {
        let _state = self.state.lock();
        self.changed.notify_all();
    }
}

/// Thread-safe resolver shared by a pool of workers.
///
/// Share it by reference (e.g. with scoped threads) or wrap it in an `Arc`.
#[derive(Debug, Default)]
pub struct ConcurrentResolver {
    monitor: Arc<Monitor>,
}

impl ConcurrentResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph for `roots` and start a new run, clearing any aborted
    /// status.
    ///
    /// Call this before workers start; on a cycle the previous state (if
    /// any) is left untouched.
    pub fn init(&self, roots: &[ModuleRef]) -> Result<(), ResolveError> {
        let graph = build_graph(roots)?;
        let remaining = graph.len();

        let mut state = self.monitor.state.lock();
        *state = Some(ConcurrentRun {
            shortlist: graph.initial_free(),
            acquired: HashMap::new(),
            remaining,
            aborted: false,
            graph,
        });
        debug!(modules = remaining, "concurrent resolver initialised");
        Ok(())
    }

    /// Hand out a free module, blocking while none is free but others are
    /// still in flight.
    ///
    /// Returns `None` once every module has been handed out or the run was
    /// aborted.
    pub fn acquire_free(&self) -> Result<Option<ModuleRef>, ResolveError> {
        self.acquire(None)
    }

    /// Like [`ConcurrentResolver::acquire_free`], but fails with
    /// [`ResolveError::Cancelled`] as soon as `token` is cancelled, whether or
    /// not the call is blocked at that moment.
    pub fn acquire_free_cancellable(
        &self,
        token: &CancelToken,
    ) -> Result<Option<ModuleRef>, ResolveError> {
        let monitor: Weak<Monitor> = Arc::downgrade(&self.monitor);
        token.register(monitor);
        self.acquire(Some(token))
    }

    fn acquire(&self, token: Option<&CancelToken>) -> Result<Option<ModuleRef>, ResolveError> {
        let mut state = self.monitor.state.lock();

        loop {
            if token.is_some_and(CancelToken::is_cancelled) {
                debug!("acquire cancelled");
                return Err(ResolveError::Cancelled);
            }

            let run = state.as_mut().ok_or_else(not_initialized)?;
            if run.aborted {
                return Ok(None);
            }

            if let Some(id) = run.shortlist.pop() {
                let module = Arc::clone(run.graph.module(id));
                run.acquired.insert(ModuleKey::new(&module), id);
                run.remaining -= 1;
                trace!(
                    module = %module.id(),
                    remaining = run.remaining,
                    in_flight = run.acquired.len(),
                    "module acquired"
                );
                if run.remaining == 0 {
                    // Nothing left to hand out; let blocked workers finish.
                    self.monitor.changed.notify_all();
                }
                return Ok(Some(module));
            }

            if run.remaining == 0 {
                return Ok(None);
            }

            if run.acquired.is_empty() {
                return Err(ResolveError::InvalidState(format!(
                    "{} modules remain but none is free or in flight",
                    run.remaining
                )));
            }

            trace!(remaining = run.remaining, "no free module; waiting");
            self.monitor.waiting.fetch_add(1, Ordering::SeqCst);
            self.monitor.changed.wait(&mut state);
            self.monitor.waiting.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Mark an acquired module processed and free the dependents whose last
    /// dependency it was.
    ///
    /// After [`ConcurrentResolver::abort`] any release is accepted as a no-op,
    /// since workers may still be finishing modules acquired before the abort.
    pub fn release(&self, module: &ModuleRef) -> Result<(), ResolveError> {
        let mut state = self.monitor.state.lock();
        let run = state.as_mut().ok_or_else(not_initialized)?;

        if run.aborted {
            trace!(module = %module.id(), "release after abort ignored");
            return Ok(());
        }

        let id = run.acquired.remove(&ModuleKey::new(module)).ok_or_else(|| {
            ResolveError::InvalidArgument(format!(
                "module '{}' is not currently acquired",
                module.id()
            ))
        })?;

        let freed = run.graph.complete(id);
        trace!(
            module = %module.id(),
            freed = freed.len(),
            in_flight = run.acquired.len(),
            "module released"
        );
        run.shortlist.extend(freed);

        self.monitor.changed.notify_all();
        Ok(())
    }

    /// Stop handing out modules and wake every blocked worker. Idempotent and
    /// safe to call at any time.
    pub fn abort(&self) {
        let mut state = self.monitor.state.lock();
        if let Some(run) = state.as_mut() {
            if !run.aborted {
                info!(
                    remaining = run.remaining,
                    in_flight = run.acquired.len(),
                    "aborting resolution run"
                );
                run.aborted = true;
                run.shortlist.clear();
                run.acquired.clear();
            }
        }
        self.monitor.changed.notify_all();
    }

    pub fn status(&self) -> RunStatus {
        match self.monitor.state.lock().as_ref() {
            None => RunStatus::Uninitialized,
            Some(run) if run.aborted => RunStatus::Aborted,
            Some(run) if run.remaining == 0 && run.acquired.is_empty() => RunStatus::Exhausted,
            Some(_) => RunStatus::Running,
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.status() == RunStatus::Aborted
    }

    /// Modules acquired but not yet released.
    pub fn in_flight(&self) -> usize {
        self.monitor
            .state
            .lock()
            .as_ref()
            .map_or(0, |run| run.acquired.len())
    }

    /// Callers currently blocked in `acquire_free` waiting for a module to
    /// become free.
    ///
    /// A non-zero count means those callers have released the lock and will
    /// be woken by the next `release`, `abort` or cancellation.
    pub fn waiting(&self) -> usize {
        self.monitor.waiting.load(Ordering::SeqCst)
    }
}

fn not_initialized() -> ResolveError {
    ResolveError::InvalidState("resolver has not been initialised".to_string())
}
