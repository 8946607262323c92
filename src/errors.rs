// src/errors.rs

//! Crate-wide error types.
//!
//! - [`ResolveError`] is what the graph builder and both resolvers return.
//! - [`DepflowError`] wraps everything the binary can run into.
//!
//! Loader and run errors live next to their code
//! ([`crate::module::LoadError`], [`crate::exec::RunError`]).

use thiserror::Error;

use crate::dag::CyclePath;
use crate::exec::RunError;
use crate::module::LoadError;

#[derive(Error, Debug)]
pub enum ResolveError {
    /// A circular dependency chain was found while building the graph.
    #[error("Cycle detected in module graph: {0}")]
    Cycle(CyclePath),

    /// `release` was called with a module that cannot be released right now.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The resolver is not in a state that allows the operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A blocking acquire was cancelled through its `CancelToken`. The token
    /// stays cancelled.
    #[error("Invalid state: waiting for a free module was cancelled")]
    Cancelled,
}

#[derive(Error, Debug)]
pub enum DepflowError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Run(#[from] RunError),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DepflowError>;
