//! Context management for pipeline execution.
//!
//! This module provides:
//! - The immutable request snapshot a run starts from
//! - The owned context threaded through every stage
//! - A namespaced metadata map for per-stage diagnostics

mod metadata;
mod pipeline_context;
mod state;

pub use metadata::Metadata;
pub use pipeline_context::PipelineContext;
pub use state::InitialState;
