// src/module/mod.rs

//! Module graph model.
//!
//! - [`Module`] is a node identity in the dependency graph: an identifier, a
//!   dependency set (weak references to other modules) and an attribute bag.
//! - [`attributes`] holds the attribute bag, which may be mutated
//!   concurrently by processing code.
//! - [`registry`] turns identifiers into linked, shared modules through a
//!   [`ModuleLoader`], caching them for the duration of one resolution run.
//!
//! Module identity is reference identity: two modules loaded independently
//! with the same identifier are distinct. Use [`Module::same`] or
//! [`ModuleKey`] to compare modules.
//!
//! A module does not keep its dependencies alive. Whoever builds the graph
//! owns every module in it: a [`ModuleRegistry`], a graph under
//! construction, or a collection held by the caller. Cyclic inputs are
//! therefore freed like any other, and dropping a long chain never recurses.

pub mod attributes;
pub mod registry;

use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock, Weak};

pub use attributes::{AttributeValue, Attributes};
pub use registry::{LoadError, ModuleLoader, ModuleRegistry, ModuleSpec};

/// Shared handle to a module.
pub type ModuleRef = Arc<Module>;

/// Stable identifier of a module (e.g. a path or a manifest key).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(String);

impl ModuleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ModuleId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for ModuleId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ModuleId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ModuleId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// A unit of dependency-ordered work.
///
/// The dependency set is linked exactly once (see [`Module::link`]) and is
/// read-only afterwards. Attributes stay mutable through [`Attributes`].
///
/// Dependency edges are weak, so the dependencies must be owned elsewhere for
/// as long as the graph is used.
pub struct Module {
    id: ModuleId,
    deps: OnceLock<Vec<Weak<Module>>>,
    attributes: Attributes,
}

impl Module {
    /// Create an unlinked module. Until [`Module::link`] is called it has no
    /// dependencies.
    pub fn new(id: impl Into<ModuleId>, attributes: Attributes) -> ModuleRef {
        Arc::new(Self {
            id: id.into(),
            deps: OnceLock::new(),
            attributes,
        })
    }

    /// Create an already-linked module with no attributes. The caller keeps
    /// `deps` alive.
    pub fn with_deps(id: impl Into<ModuleId>, deps: Vec<ModuleRef>) -> ModuleRef {
        Arc::new(Self {
            id: id.into(),
            deps: OnceLock::from(downgrade(deps)),
            attributes: Attributes::new(),
        })
    }

    /// Set the dependency set of this module.
    ///
    /// Duplicate entries are collapsed. Fails if `deps` contains this module
    /// or if the module was already linked.
    pub fn link(&self, deps: Vec<ModuleRef>) -> Result<(), LoadError> {
        if deps.iter().any(|dep| std::ptr::eq(Arc::as_ptr(dep), self)) {
            return Err(LoadError::SelfDependency(self.id.to_string()));
        }

        self.deps
            .set(downgrade(deps))
            .map_err(|_| LoadError::AlreadyLinked(self.id.to_string()))
    }

    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    /// Direct dependencies that are still alive.
    pub fn dependencies(&self) -> Vec<ModuleRef> {
        self.edges().iter().filter_map(Weak::upgrade).collect()
    }

    /// All direct dependencies, or `None` if any of them has already been
    /// dropped by its owner.
    pub fn try_dependencies(&self) -> Option<Vec<ModuleRef>> {
        self.edges().iter().map(Weak::upgrade).collect()
    }

    /// Number of linked dependency edges, alive or not.
    pub fn dependency_count(&self) -> usize {
        self.edges().len()
    }

    fn edges(&self) -> &[Weak<Module>] {
        self.deps.get().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_linked(&self) -> bool {
        self.deps.get().is_some()
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Reference identity.
    pub fn same(a: &ModuleRef, b: &ModuleRef) -> bool {
        Arc::ptr_eq(a, b)
    }
}

// Dependencies are printed by id only; a cyclic graph would otherwise recurse.
impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let deps: Vec<ModuleId> = self.dependencies().iter().map(|d| d.id().clone()).collect();
        f.debug_struct("Module")
            .field("id", &self.id)
            .field("deps", &deps)
            .field("attributes", &self.attributes)
            .finish()
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.id, f)
    }
}

/// Hash map key comparing modules by reference identity.
#[derive(Clone)]
pub struct ModuleKey(ModuleRef);

impl ModuleKey {
    pub fn new(module: &ModuleRef) -> Self {
        Self(Arc::clone(module))
    }

    pub fn module(&self) -> &ModuleRef {
        &self.0
    }
}

impl PartialEq for ModuleKey {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ModuleKey {}

impl Hash for ModuleKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Debug for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleKey({})", self.0.id())
    }
}

/// Weak edges to `deps`, with duplicates collapsed.
fn downgrade(deps: Vec<ModuleRef>) -> Vec<Weak<Module>> {
    let mut seen = HashSet::with_capacity(deps.len());
    deps.iter()
        .filter(|dep| seen.insert(Arc::as_ptr(dep)))
        .map(Arc::downgrade)
        .collect()
}
