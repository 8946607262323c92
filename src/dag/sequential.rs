// src/dag/sequential.rs

//! Single-caller resolver.
//!
//! No locking and no blocking: the caller repeatedly asks for a free module,
//! processes it and releases it, until [`SequentialResolver::acquire_free`]
//! returns `None`.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::dag::graph::{NodeGraph, NodeId, build_graph};
use crate::errors::ResolveError;
use crate::module::ModuleRef;

/// Per-run state, replaced wholesale on every successful `init`.
#[derive(Debug)]
struct SequentialRun {
    graph: NodeGraph,
    /// Free, unreleased nodes. The top of the stack is handed out next.
    shortlist: Vec<NodeId>,
    released: Vec<bool>,
    remaining: usize,
}

#[derive(Debug, Default)]
pub struct SequentialResolver {
    run: Option<SequentialRun>,
}

impl SequentialResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph for `roots` and start a new run.
    ///
    /// On a cycle the previous state (if any) is left untouched.
    pub fn init(&mut self, roots: &[ModuleRef]) -> Result<(), ResolveError> {
        let graph = build_graph(roots)?;
        let remaining = graph.len();

        self.run = Some(SequentialRun {
            shortlist: graph.initial_free(),
            released: vec![false; remaining],
            remaining,
            graph,
        });
        debug!(modules = remaining, "sequential resolver initialised");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.run.is_some()
    }

    /// Modules not yet released, or `None` before `init`.
    pub fn remaining(&self) -> Option<usize> {
        self.run.as_ref().map(|run| run.remaining)
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == Some(0)
    }

    /// Return a module whose dependencies have all been released, or `None`
    /// once every module has been released.
    ///
    /// The module stays free until it is released: calling this again
    /// without a `release` in between returns the same module.
    pub fn acquire_free(&self) -> Result<Option<ModuleRef>, ResolveError> {
        let run = self.run.as_ref().ok_or_else(not_initialized)?;

        if run.remaining == 0 {
            return Ok(None);
        }

        match run.shortlist.last() {
            Some(&id) => {
                let module = run.graph.module(id);
                trace!(module = %module.id(), "free module available");
                Ok(Some(Arc::clone(module)))
            }
            None => Err(ResolveError::InvalidState(format!(
                "{} modules remain but none of them is free",
                run.remaining
            ))),
        }
    }

    /// Mark `module` processed, freeing dependents whose last dependency it
    /// was.
    pub fn release(&mut self, module: &ModuleRef) -> Result<(), ResolveError> {
        let run = self.run.as_mut().ok_or_else(not_initialized)?;

        let id = run.graph.index_of(module).ok_or_else(|| {
            ResolveError::InvalidArgument(format!(
                "module '{}' is not part of this run",
                module.id()
            ))
        })?;

        if run.released[id] {
            return Err(ResolveError::InvalidArgument(format!(
                "module '{}' was already released",
                module.id()
            )));
        }

        let pending = run.graph.pending_deps(id);
        if pending > 0 {
            return Err(ResolveError::InvalidArgument(format!(
                "module '{}' still has {pending} unprocessed dependencies",
                module.id()
            )));
        }

        if let Some(pos) = run.shortlist.iter().rposition(|&n| n == id) {
            run.shortlist.remove(pos);
        }
        run.released[id] = true;
        run.remaining -= 1;

        let freed = run.graph.complete(id);
        trace!(
            module = %module.id(),
            freed = freed.len(),
            remaining = run.remaining,
            "module released"
        );
        run.shortlist.extend(freed);

        Ok(())
    }
}

fn not_initialized() -> ResolveError {
    ResolveError::InvalidState("resolver has not been initialised".to_string())
}
