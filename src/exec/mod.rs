// src/exec/mod.rs

//! Module processing.
//!
//! - [`processor`] defines the per-module callback and a shell-command
//!   implementation driven by the `cmd` attribute.
//! - [`runner`] holds the sequential and concurrent orchestration loops that
//!   drive a resolver and a processor to completion.

pub mod processor;
pub mod runner;

pub use processor::{CMD_ATTRIBUTE, CommandProcessor, Processor, STATUS_ATTRIBUTE};
pub use runner::{RunError, RunReport, run_concurrent, run_concurrent_with_cancel, run_sequential};
