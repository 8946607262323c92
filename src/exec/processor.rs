// src/exec/processor.rs

//! Per-module processing callbacks.

use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use crate::module::ModuleRef;

/// Attribute holding the shell command run by [`CommandProcessor`].
pub const CMD_ATTRIBUTE: &str = "cmd";
/// Attribute set to `"done"` once a module has been processed.
pub const STATUS_ATTRIBUTE: &str = "status";

/// Work performed for one module between acquire and release.
///
/// `Sync` because the concurrent runner calls it from several workers at
/// once.
pub trait Processor: Sync {
    fn process(&self, module: &ModuleRef) -> Result<()>;
}

impl<F> Processor for F
where
    F: Fn(&ModuleRef) -> Result<()> + Sync,
{
    fn process(&self, module: &ModuleRef) -> Result<()> {
        self(module)
    }
}

/// Runs each module's `cmd` attribute through the platform shell.
///
/// Modules without a `cmd` attribute are a no-op. A non-zero exit status is
/// a processing error.
#[derive(Debug, Clone, Default)]
pub struct CommandProcessor {
    working_dir: Option<PathBuf>,
}

impl CommandProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

impl Processor for CommandProcessor {
    fn process(&self, module: &ModuleRef) -> Result<()> {
        let Some(cmd) = module.attributes().get_str(CMD_ATTRIBUTE) else {
            debug!(module = %module.id(), "no command; nothing to run");
            module.attributes().set(STATUS_ATTRIBUTE, "done");
            return Ok(());
        };

        info!(module = %module.id(), cmd = %cmd, "running module command");

        let mut command = shell_command(&cmd);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let status = command
            .status()
            .with_context(|| format!("spawning process for module '{}'", module.id()))?;

        if !status.success() {
            bail!("command `{cmd}` for module '{}' exited with {status}", module.id());
        }

        module.attributes().set(STATUS_ATTRIBUTE, "done");
        Ok(())
    }
}

fn shell_command(cmd: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    }
}
