// src/dag/graph.rs

//! Resolution graph construction and cycle detection.
//!
//! [`build_graph`] walks the dependency edges reachable from a set of root
//! modules and produces a [`NodeGraph`]: an arena of resolution nodes, each
//! pairing a module with its count of unprocessed dependencies and the
//! indices of the nodes that depend on it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::errors::ResolveError;
use crate::module::{ModuleKey, ModuleRef};

/// Index of a node in a [`NodeGraph`] arena.
pub(crate) type NodeId = usize;

/// Ordered list of modules forming a dependency cycle.
///
/// Each module depends on the next one, and the last depends on the first.
#[derive(Debug, Clone)]
pub struct CyclePath(Vec<ModuleRef>);

impl CyclePath {
    pub fn modules(&self) -> &[ModuleRef] {
        &self.0
    }

    pub fn ids(&self) -> Vec<String> {
        self.0.iter().map(|m| m.id().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CyclePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for module in &self.0 {
            write!(f, "{} -> ", module.id())?;
        }
        match self.0.first() {
            Some(first) => write!(f, "{}", first.id()),
            None => Ok(()),
        }
    }
}

#[derive(Debug)]
struct ResolutionNode {
    module: ModuleRef,
    /// Dependencies not yet processed. Only ever decreases.
    pending_deps: usize,
    dependents: Vec<NodeId>,
}

/// Node arena for one resolution run.
///
/// The arena holds every module it reaches, so a run stays valid after the
/// registry that loaded the modules is gone.
#[derive(Debug)]
pub struct NodeGraph {
    nodes: Vec<ResolutionNode>,
    index: HashMap<ModuleKey, NodeId>,
    free: Vec<NodeId>,
}

impl NodeGraph {
    /// Number of nodes (modules reachable from the roots).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, module: &ModuleRef) -> bool {
        self.index.contains_key(&ModuleKey::new(module))
    }

    pub fn modules(&self) -> impl Iterator<Item = &ModuleRef> {
        self.nodes.iter().map(|n| &n.module)
    }

    /// Modules that had no dependencies when the graph was built.
    pub fn free_modules(&self) -> impl Iterator<Item = &ModuleRef> {
        self.free.iter().map(|&id| &self.nodes[id].module)
    }

    /// Modules that directly depend on `module`.
    pub fn dependents_of(&self, module: &ModuleRef) -> Vec<ModuleRef> {
        self.index_of(module)
            .map(|id| {
                self.nodes[id]
                    .dependents
                    .iter()
                    .map(|&d| Arc::clone(&self.nodes[d].module))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Dependencies of `module` that are not processed yet.
    pub fn pending_deps_of(&self, module: &ModuleRef) -> Option<usize> {
        self.index_of(module).map(|id| self.nodes[id].pending_deps)
    }

    pub(crate) fn index_of(&self, module: &ModuleRef) -> Option<NodeId> {
        self.index.get(&ModuleKey::new(module)).copied()
    }

    pub(crate) fn module(&self, id: NodeId) -> &ModuleRef {
        &self.nodes[id].module
    }

    pub(crate) fn pending_deps(&self, id: NodeId) -> usize {
        self.nodes[id].pending_deps
    }

    pub(crate) fn initial_free(&self) -> Vec<NodeId> {
        self.free.clone()
    }

    /// Mark `id` processed: decrement each dependent and return the ones that
    /// just became free.
    pub(crate) fn complete(&mut self, id: NodeId) -> Vec<NodeId> {
        let mut freed = Vec::new();
        for i in 0..self.nodes[id].dependents.len() {
            let dependent = self.nodes[id].dependents[i];
            let node = &mut self.nodes[dependent];
            debug_assert!(node.pending_deps > 0, "dependency count underflow");
            node.pending_deps = node.pending_deps.saturating_sub(1);
            if node.pending_deps == 0 {
                freed.push(dependent);
            }
        }
        freed
    }
}

/// Build the resolution graph for everything reachable from `roots`.
///
/// Fails with [`ResolveError::Cycle`] if any dependency chain loops back on
/// itself, and with [`ResolveError::InvalidArgument`] if a reachable module
/// lost a dependency because nothing owned it any more. Nothing is retained
/// on failure.
pub fn build_graph(roots: &[ModuleRef]) -> Result<NodeGraph, ResolveError> {
    let mut builder = GraphBuilder::default();
    for root in roots {
        builder.visit(root)?;
    }

    let graph = NodeGraph {
        nodes: builder.nodes,
        index: builder.finished,
        free: builder.free,
    };
    debug!(
        roots = roots.len(),
        nodes = graph.len(),
        free = graph.free.len(),
        "built resolution graph"
    );
    Ok(graph)
}

/// One module under active exploration.
struct Frame {
    module: ModuleRef,
    deps: Vec<ModuleRef>,
    node: NodeId,
    next_dep: usize,
}

#[derive(Default)]
struct GraphBuilder {
    nodes: Vec<ResolutionNode>,
    /// Modules whose whole dependency closure has been built.
    finished: HashMap<ModuleKey, NodeId>,
    /// Current DFS path, in order, plus each module's position in it.
    path: Vec<ModuleRef>,
    on_path: HashMap<ModuleKey, usize>,
    free: Vec<NodeId>,
}

impl GraphBuilder {
    /// Depth-first traversal from `root`, using an explicit stack so deep
    /// chains cannot overflow the thread stack.
    fn visit(&mut self, root: &ModuleRef) -> Result<(), ResolveError> {
        if self.finished.contains_key(&ModuleKey::new(root)) {
            return Ok(());
        }

        let mut stack = vec![self.enter(root)?];

        while let Some(frame) = stack.last_mut() {
            let parent = frame.node;
            let next = frame.deps.get(frame.next_dep).cloned();

            match next {
                Some(dep) => {
                    frame.next_dep += 1;
                    let key = ModuleKey::new(&dep);
                    if let Some(&dep_node) = self.finished.get(&key) {
                        self.nodes[dep_node].dependents.push(parent);
                    } else if let Some(&pos) = self.on_path.get(&key) {
                        return Err(self.cycle_from(pos));
                    } else {
                        let child = self.enter(&dep)?;
                        stack.push(child);
                    }
                }
                None => {
                    let done = stack.pop();
                    if let Some(done) = done {
                        self.leave(&done);
                        if let Some(parent) = stack.last() {
                            self.nodes[done.node].dependents.push(parent.node);
                        }
                    }
                }
            }
        }

        Ok(())
    }

    fn enter(&mut self, module: &ModuleRef) -> Result<Frame, ResolveError> {
        let deps = module.try_dependencies().ok_or_else(|| {
            ResolveError::InvalidArgument(format!(
                "a dependency of module '{}' was dropped before the graph was built",
                module.id()
            ))
        })?;

        let node = self.nodes.len();
        let pending_deps = deps.len();
        self.nodes.push(ResolutionNode {
            module: Arc::clone(module),
            pending_deps,
            dependents: Vec::new(),
        });
        if pending_deps == 0 {
            self.free.push(node);
        }

        self.on_path.insert(ModuleKey::new(module), self.path.len());
        self.path.push(Arc::clone(module));

        Ok(Frame {
            module: Arc::clone(module),
            deps,
            node,
            next_dep: 0,
        })
    }

    fn leave(&mut self, frame: &Frame) {
        self.path.pop();
        let key = ModuleKey::new(&frame.module);
        self.on_path.remove(&key);
        self.finished.insert(key, frame.node);
    }

    /// The part of the current path starting at `pos` is the cycle; anything
    /// before it merely leads into the cycle.
    fn cycle_from(&self, pos: usize) -> ResolveError {
        let cycle = CyclePath(self.path[pos..].to_vec());
        warn!(cycle = %cycle, "circular dependency detected");
        ResolveError::Cycle(cycle)
    }
}
