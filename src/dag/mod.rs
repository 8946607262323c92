// src/dag/mod.rs

//! Dependency resolution.
//!
//! - [`graph`] builds the resolution graph from root modules and detects
//!   cycles.
//! - [`sequential`] is the single-caller resolver.
//! - [`concurrent`] is the thread-safe resolver shared by a worker pool.
//! - [`cancel`] provides the token used to cancel blocked workers.

pub mod cancel;
pub mod concurrent;
pub mod graph;
pub mod sequential;

pub use cancel::CancelToken;
pub use concurrent::{ConcurrentResolver, RunStatus};
pub use graph::{CyclePath, NodeGraph, build_graph};
pub use sequential::SequentialResolver;
