// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

/// Manifest as read from a TOML file, before validation.
///
/// ```toml
/// [settings]
/// workers = 4
///
/// [module.core]
/// cmd = "make -C core"
///
/// [module.app]
/// cmd = "make -C app"
/// after = ["core"]
///
/// [module.app.attributes]
/// profile = "release"
/// ```
///
/// Every section is optional at parse time; validation then requires at
/// least one module.
#[derive(Debug, Clone, Deserialize)]
pub struct RawManifest {
    /// Global settings from `[settings]`.
    #[serde(default)]
    pub settings: SettingsSection,

    /// All modules from `[module.<id>]`, keyed by module identifier.
    #[serde(default)]
    pub module: BTreeMap<String, ModuleConfig>,
}

/// `[settings]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsSection {
    /// Worker threads used by the concurrent runner.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Default for SettingsSection {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

/// `[module.<id>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModuleConfig {
    /// Shell command run when the module is processed. Stored as the `cmd`
    /// attribute.
    #[serde(default)]
    pub cmd: Option<String>,

    /// Identifiers of the modules this one depends on.
    #[serde(default)]
    pub after: Vec<String>,

    /// Free-form attributes copied onto the loaded module.
    #[serde(default)]
    pub attributes: BTreeMap<String, toml::Value>,
}

/// A validated manifest. Construct through `TryFrom<RawManifest>` or
/// [`crate::config::load_and_validate`].
#[derive(Debug, Clone)]
pub struct Manifest {
    settings: SettingsSection,
    modules: BTreeMap<String, ModuleConfig>,
}

impl Manifest {
    pub(crate) fn new_unchecked(
        settings: SettingsSection,
        modules: BTreeMap<String, ModuleConfig>,
    ) -> Self {
        Self { settings, modules }
    }

    pub fn settings(&self) -> &SettingsSection {
        &self.settings
    }

    pub fn module(&self, id: &str) -> Option<&ModuleConfig> {
        self.modules.get(id)
    }

    pub fn modules(&self) -> impl Iterator<Item = (&str, &ModuleConfig)> {
        self.modules.iter().map(|(id, cfg)| (id.as_str(), cfg))
    }

    /// Module identifiers in sorted order.
    pub fn module_ids(&self) -> Vec<String> {
        self.modules.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
