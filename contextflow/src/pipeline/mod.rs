//! Pipeline building and execution.
//!
//! This module provides:
//! - The sequential context engine
//! - A builder that validates stage lists
//! - The default chat-turn assembly

mod assembly;
mod builder;
mod engine;

pub use assembly::{AssemblyParams, MessagesAssembler};
pub use builder::PipelineBuilder;
pub use engine::{ContextEngine, EngineStats, PipelineOutcome, RunStats, ValidationReport};
