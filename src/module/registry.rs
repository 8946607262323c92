// src/module/registry.rs

//! Loading modules by identifier.
//!
//! A [`ModuleLoader`] produces the raw description of one module (dependency
//! identifiers plus attributes). [`ModuleRegistry`] drives a loader to build
//! the linked module graph reachable from a set of identifiers, caching every
//! module it creates so that each identifier maps to exactly one
//! [`ModuleRef`] within the registry.
//!
//! The registry is scoped to one resolution run; create a new one per run.
//! It owns the modules it creates: dependency edges are weak, so keep the
//! registry alive until the graph has been built from its modules.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, trace};

use super::{AttributeValue, Attributes, Module, ModuleRef};

/// Raw description of a module as produced by a loader.
#[derive(Debug, Clone, Default)]
pub struct ModuleSpec {
    /// Identifiers of direct dependencies.
    pub deps: Vec<String>,
    pub attributes: HashMap<String, AttributeValue>,
}

impl ModuleSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn after(mut self, dep: impl Into<String>) -> Self {
        self.deps.push(dep.into());
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Module not found: {0}")]
    NotFound(String),

    #[error("Module '{0}' cannot depend on itself")]
    SelfDependency(String),

    #[error("Dependencies of module '{0}' are already linked")]
    AlreadyLinked(String),

    #[error("Failed to load module '{id}': {reason}")]
    Failed { id: String, reason: String },
}

/// Source of module descriptions.
pub trait ModuleLoader {
    fn load(&self, id: &str) -> Result<ModuleSpec, LoadError>;
}

impl<F> ModuleLoader for F
where
    F: Fn(&str) -> Result<ModuleSpec, LoadError>,
{
    fn load(&self, id: &str) -> Result<ModuleSpec, LoadError> {
        self(id)
    }
}

/// Run-scoped cache and owner of loaded modules.
pub struct ModuleRegistry<'l, L: ModuleLoader + ?Sized> {
    loader: &'l L,
    modules: HashMap<String, ModuleRef>,
}

impl<'l, L: ModuleLoader + ?Sized> ModuleRegistry<'l, L> {
    pub fn new(loader: &'l L) -> Self {
        Self {
            loader,
            modules: HashMap::new(),
        }
    }

    /// Load `id` and everything it transitively depends on.
    ///
    /// A module is cached before its dependencies are resolved, so a chain
    /// that loops back to a module still being loaded links to the cached
    /// instance. Such cycles are reported later by the graph builder.
    ///
    /// On failure every module created during this call is discarded, so the
    /// registry never hands out a half-linked module.
    pub fn resolve(&mut self, id: &str) -> Result<ModuleRef, LoadError> {
        if let Some(module) = self.modules.get(id) {
            trace!(module = %id, "module already loaded");
            return Ok(Arc::clone(module));
        }

        let mut created = Vec::new();
        let result = self.load_closure(id, &mut created);
        if result.is_err() {
            for id in created {
                self.modules.remove(&id);
            }
        }
        result
    }

    /// Resolve several identifiers, e.g. the roots of a run.
    pub fn resolve_all<I, S>(&mut self, ids: I) -> Result<Vec<ModuleRef>, LoadError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ids.into_iter().map(|id| self.resolve(id.as_ref())).collect()
    }

    /// Previously resolved module, if any.
    pub fn get(&self, id: &str) -> Option<ModuleRef> {
        self.modules.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn modules(&self) -> impl Iterator<Item = &ModuleRef> {
        self.modules.values()
    }

    /// Load `root` and every module it reaches that is not cached yet.
    ///
    /// Works from an explicit list of modules still to be linked, so the depth
    /// of the dependency chain does not matter.
    fn load_closure(
        &mut self,
        root: &str,
        created: &mut Vec<String>,
    ) -> Result<ModuleRef, LoadError> {
        let (root_module, root_deps) = self.load_one(root, created)?;
        let mut unlinked = vec![(Arc::clone(&root_module), root_deps)];

        while let Some((module, dep_ids)) = unlinked.pop() {
            let mut deps = Vec::with_capacity(dep_ids.len());
            for dep in &dep_ids {
                let dep_module = match self.modules.get(dep.as_str()).cloned() {
                    Some(cached) => cached,
                    None => {
                        let (loaded, nested) = self.load_one(dep, created)?;
                        unlinked.push((Arc::clone(&loaded), nested));
                        loaded
                    }
                };
                deps.push(dep_module);
            }
            module.link(deps)?;
        }

        Ok(root_module)
    }

    /// Load and cache a single unlinked module, returning it with the
    /// identifiers of its dependencies.
    fn load_one(
        &mut self,
        id: &str,
        created: &mut Vec<String>,
    ) -> Result<(ModuleRef, Vec<String>), LoadError> {
        let spec = self.loader.load(id)?;
        if spec.deps.iter().any(|dep| dep == id) {
            return Err(LoadError::SelfDependency(id.to_string()));
        }

        debug!(module = %id, deps = ?spec.deps, "loaded module");

        let module = Module::new(id, Attributes::from_map(spec.attributes));
        self.modules.insert(id.to_string(), Arc::clone(&module));
        created.push(id.to_string());

        Ok((module, spec.deps))
    }
}
