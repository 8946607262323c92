#![allow(dead_code)]

use std::collections::BTreeMap;

use depflow::config::{Manifest, ModuleConfig, RawManifest, SettingsSection};
use depflow::module::{Attributes, Module, ModuleRef};

/// Builder for in-memory module graphs, addressed by id.
///
/// Dependencies may name modules declared later, and cycles are allowed so
/// tests can exercise cycle detection.
#[derive(Default)]
pub struct GraphBuilder {
    edges: BTreeMap<String, Vec<String>>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `id` depending on `deps`. Ids only mentioned as dependencies
    /// become modules with no dependencies.
    pub fn module(mut self, id: &str, deps: &[&str]) -> Self {
        for dep in deps {
            self.edges.entry(dep.to_string()).or_default();
        }
        self.edges
            .entry(id.to_string())
            .or_default()
            .extend(deps.iter().map(|d| d.to_string()));
        self
    }

    pub fn build(self) -> Graph {
        let modules: BTreeMap<String, ModuleRef> = self
            .edges
            .keys()
            .map(|id| (id.clone(), Module::new(id.as_str(), Attributes::new())))
            .collect();

        for (id, deps) in &self.edges {
            let deps = deps.iter().map(|d| modules[d].clone()).collect();
            modules[id].link(deps).expect("builder links each module once");
        }

        Graph { modules }
    }
}

/// Modules produced by [`GraphBuilder`].
pub struct Graph {
    modules: BTreeMap<String, ModuleRef>,
}

impl Graph {
    pub fn get(&self, id: &str) -> ModuleRef {
        self.modules
            .get(id)
            .unwrap_or_else(|| panic!("no module '{id}' in test graph"))
            .clone()
    }

    /// Every module, sorted by id. Handy as the root set.
    pub fn all(&self) -> Vec<ModuleRef> {
        self.modules.values().cloned().collect()
    }

    pub fn roots(&self, ids: &[&str]) -> Vec<ModuleRef> {
        ids.iter().map(|id| self.get(id)).collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }
}

/// Ids of `modules`, in order.
pub fn ids(modules: &[ModuleRef]) -> Vec<String> {
    modules.iter().map(|m| m.id().to_string()).collect()
}

/// Builder for `Manifest` to simplify test setup.
pub struct ManifestBuilder {
    manifest: RawManifest,
}

impl ManifestBuilder {
    pub fn new() -> Self {
        Self {
            manifest: RawManifest {
                settings: SettingsSection::default(),
                module: BTreeMap::new(),
            },
        }
    }

    pub fn with_module(mut self, id: &str, module: ModuleConfig) -> Self {
        self.manifest.module.insert(id.to_string(), module);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.manifest.settings.workers = workers;
        self
    }

    pub fn raw(self) -> RawManifest {
        self.manifest
    }

    pub fn build(self) -> Manifest {
        Manifest::try_from(self.manifest).expect("Failed to build valid manifest from builder")
    }
}

impl Default for ManifestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ModuleConfig`.
pub struct ModuleConfigBuilder {
    module: ModuleConfig,
}

impl ModuleConfigBuilder {
    pub fn new() -> Self {
        Self {
            module: ModuleConfig::default(),
        }
    }

    pub fn cmd(mut self, cmd: &str) -> Self {
        self.module.cmd = Some(cmd.to_string());
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.module.after.push(dep.to_string());
        self
    }

    pub fn attribute(mut self, name: &str, value: impl Into<toml::Value>) -> Self {
        self.module.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn build(self) -> ModuleConfig {
        self.module
    }
}

impl Default for ModuleConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
