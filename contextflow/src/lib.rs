//! # Contextflow
//!
//! A composable pipeline that turns a chat request into the exact message
//! list sent to a language model.
//!
//! A run starts from an [`InitialState`](context::InitialState) (model,
//! provider, system role, tools, message history) and threads a
//! [`PipelineContext`](context::PipelineContext) through an ordered list of
//! stages. Each stage injects one kind of content:
//!
//! - **System content**: system role, tool instructions, inbox guide and
//!   history summary are merged into a single leading system message
//! - **Attached content**: knowledge and files are injected as a synthetic
//!   user turn before the first real user message
//! - **Per-turn content**: retrieved chunks and search results are appended
//!   to the last user message
//! - **Text rewriting**: input templates and placeholder variables rewrite
//!   message text in place
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use contextflow::prelude::*;
//!
//! let assembler = MessagesAssembler::new(AssemblyParams {
//!     config: EngineConfig::default().with_system_role("You are concise."),
//!     ..Default::default()
//! });
//!
//! let state = InitialState::new("gpt-4o", "openai")
//!     .with_messages(vec![Message::user("Hello")]);
//! let messages = assembler.process_messages(state).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod search;
pub mod stages;
pub mod template;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{
        EngineConfig, FilesConfig, HistoryConfig, InboxConfig, LoggingConfig, RagConfig,
        SearchConfig, SearchMode,
    };
    pub use crate::context::{InitialState, Metadata, PipelineContext};
    pub use crate::core::{ContentPart, Message, MessageContent, ModelMessage, Role};
    pub use crate::errors::{
        ContextflowError, ContractErrorInfo, PipelineValidationError, Result,
        StageExecutionError, TemplateError,
    };
    pub use crate::events::{
        CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, PipelineEvent,
    };
    pub use crate::observability::init_tracing;
    pub use crate::pipeline::{
        AssemblyParams, ContextEngine, MessagesAssembler, PipelineBuilder, PipelineOutcome,
    };
    pub use crate::search::{SearchParams, SearchProvider, SearchResponse, SearchService};
    pub use crate::stages::{
        FileContent, KnowledgeInput, RagChunk, SearchResult, Stage, StagePorts,
    };
    pub use crate::template::Template;
    pub use crate::utils::{generate_uuid, iso_timestamp};
}
