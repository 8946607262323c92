// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{Manifest, RawManifest};
use crate::errors::Result;
use crate::exec::CMD_ATTRIBUTE;
use crate::module::{LoadError, ModuleLoader, ModuleSpec};

/// Load a manifest from a given path without validating it.
///
/// This only performs TOML deserialization. Use [`load_and_validate`] for
/// the checked [`Manifest`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawManifest> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let manifest: RawManifest = toml::from_str(&contents)?;

    Ok(manifest)
}

/// Load a manifest from path and validate it.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks for an empty manifest, unknown `after` references,
///   self-dependencies and a zero worker count.
///
/// Cycles are not rejected here; the graph builder reports them with the
/// exact chain of modules.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Manifest> {
    let raw = load_from_path(&path)?;
    let manifest = Manifest::try_from(raw)?;
    debug!(
        path = %path.as_ref().display(),
        modules = manifest.len(),
        "manifest loaded"
    );
    Ok(manifest)
}

/// Default manifest location: `Depflow.toml` in the current directory.
pub fn default_manifest_path() -> PathBuf {
    PathBuf::from("Depflow.toml")
}

impl ModuleLoader for Manifest {
    fn load(&self, id: &str) -> std::result::Result<ModuleSpec, LoadError> {
        let cfg = self
            .module(id)
            .ok_or_else(|| LoadError::NotFound(id.to_string()))?;

        let mut spec = ModuleSpec {
            deps: cfg.after.clone(),
            attributes: cfg
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        };
        if let Some(cmd) = &cfg.cmd {
            spec = spec.attribute(CMD_ATTRIBUTE, cmd.as_str());
        }

        Ok(spec)
    }
}
