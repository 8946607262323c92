// src/lib.rs

//! `depflow` processes a set of interdependent modules so that each module
//! runs only after everything it depends on, either one at a time or with a
//! pool of worker threads.
//!
//! - [`module`]: the module graph model and run-scoped module loading.
//! - [`dag`]: graph building with cycle detection, and the sequential and
//!   concurrent resolvers.
//! - [`exec`]: processing callbacks and the runner loops.
//! - [`config`]: TOML manifests, usable as a module loader.

pub mod cli;
pub mod config;
pub mod dag;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod module;

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{default_manifest_path, load_and_validate};
use crate::dag::SequentialResolver;
use crate::errors::Result;
use crate::exec::{CommandProcessor, run_concurrent, run_sequential};
use crate::module::{ModuleRef, ModuleRegistry};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - manifest loading
/// - module resolution from the requested roots
/// - the sequential or concurrent runner with a command processor
///
/// Failures keep their origin as a [`errors::DepflowError`] variant.
pub fn run(args: CliArgs) -> Result<()> {
    let manifest_path = args.manifest.clone().unwrap_or_else(default_manifest_path);
    let manifest = load_and_validate(&manifest_path)?;

    let root_ids = if args.root.is_empty() {
        manifest.module_ids()
    } else {
        args.root.clone()
    };

    let mut registry = ModuleRegistry::new(&manifest);
    let roots = registry.resolve_all(&root_ids)?;
    info!(roots = ?root_ids, modules = registry.len(), "modules loaded");

    if args.dry_run {
        print_dry_run(&roots)?;
        return Ok(());
    }

    let processor = CommandProcessor::new().with_working_dir(manifest_root_dir(&manifest_path));

    let report = if args.sequential {
        run_sequential(&roots, &processor)?
    } else {
        let workers = args
            .workers
            .map(|n| n as usize)
            .unwrap_or(manifest.settings().workers);
        run_concurrent(&roots, workers, &processor)?
    };

    info!(processed = report.processed.len(), "all modules processed");
    Ok(())
}

/// Directory commands run in.
///
/// - If the manifest path has a non-empty parent (e.g. "build/Depflow.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Depflow.toml" (parent = ""),
///   we fall back to the current working directory "."
fn manifest_root_dir(manifest_path: &Path) -> PathBuf {
    match manifest_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Print one valid processing order without running anything.
fn print_dry_run(roots: &[ModuleRef]) -> Result<()> {
    let mut resolver = SequentialResolver::new();
    resolver.init(roots)?;

    println!("depflow dry-run");
    println!();

    let mut step = 0;
    while let Some(module) = resolver.acquire_free()? {
        step += 1;
        println!("{step:>4}. {}", module.id());

        let deps: Vec<String> = module
            .dependencies()
            .iter()
            .map(|d| d.id().to_string())
            .collect();
        if !deps.is_empty() {
            println!("        after: {deps:?}");
        }
        if let Some(cmd) = module.attributes().get_str(exec::CMD_ATTRIBUTE) {
            println!("        cmd: {cmd}");
        }

        resolver.release(&module)?;
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
