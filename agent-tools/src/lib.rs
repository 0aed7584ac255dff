//! Tool discovery and capability enforcement utilities.
//!
//! The modules exposed here make it possible to register annotated tool
//! functions, associate capability metadata, and invoke them at runtime.

#![warn(missing_docs, clippy::pedantic)]

/// Tool registry and execution runtime.
pub mod registry;
/// Capability-gated execution sandbox.
pub mod sandbox;

pub use agent_tools_macros::tool;
pub use inventory;
