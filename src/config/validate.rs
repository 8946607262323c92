// src/config/validate.rs

use crate::config::model::{Manifest, RawManifest};
use crate::errors::{DepflowError, Result};

impl TryFrom<RawManifest> for Manifest {
    type Error = DepflowError;

    fn try_from(raw: RawManifest) -> std::result::Result<Self, Self::Error> {
        validate_manifest(&raw)?;
        Ok(Manifest::new_unchecked(raw.settings, raw.module))
    }
}

/// Semantic checks on a parsed manifest.
pub fn validate_manifest(raw: &RawManifest) -> Result<()> {
    ensure_has_modules(raw)?;
    validate_settings(raw)?;
    validate_module_dependencies(raw)?;
    Ok(())
}

fn ensure_has_modules(raw: &RawManifest) -> Result<()> {
    if raw.module.is_empty() {
        return Err(DepflowError::ConfigError(
            "manifest must contain at least one [module.<id>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_settings(raw: &RawManifest) -> Result<()> {
    if raw.settings.workers == 0 {
        return Err(DepflowError::ConfigError(
            "[settings].workers must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_module_dependencies(raw: &RawManifest) -> Result<()> {
    for (id, module) in raw.module.iter() {
        for dep in module.after.iter() {
            if dep == id {
                return Err(DepflowError::ConfigError(format!(
                    "module '{}' cannot depend on itself in `after`",
                    id
                )));
            }
            if !raw.module.contains_key(dep) {
                return Err(DepflowError::ConfigError(format!(
                    "module '{}' has unknown dependency '{}' in `after`",
                    id, dep
                )));
            }
        }
    }
    Ok(())
}
