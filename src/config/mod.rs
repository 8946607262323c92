// src/config/mod.rs

//! Module manifests.
//!
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a manifest from disk and expose it as a module loader (`loader.rs`).
//! - Validate basic invariants like dependency references (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_manifest_path, load_and_validate, load_from_path};
pub use model::{Manifest, ModuleConfig, RawManifest, SettingsSection};
pub use validate::validate_manifest;
