//! Stage trait and implementations.
//!
//! Stages are the units of a contextflow pipeline. Each one receives the
//! context by value and returns the next context. Content-injection stages
//! never fail for ordinary "nothing to do" conditions: they record what
//! happened in their metadata namespace and pass the context on.

mod files;
mod history_summary;
mod history_truncate;
mod inbox_guide;
pub mod injection;
mod input_template;
mod knowledge;
mod placeholder_variables;
pub mod ports;
mod rag_context;
mod search_context;
mod system_role;
mod tool_system_role;

pub use files::FilesStage;
pub use history_summary::{default_history_summary, HistorySummaryStage};
pub use history_truncate::HistoryTruncateStage;
pub use inbox_guide::{InboxGuideStage, INBOX_SESSION_ID};
pub use input_template::InputTemplateStage;
pub use knowledge::KnowledgeStage;
pub use placeholder_variables::PlaceholderVariablesStage;
pub use ports::{
    CapabilityChecker, DefaultKnowledgeFormatter, FileContent, HistoryFormatter, KnowledgeBase,
    KnowledgeFormatter, KnowledgeInput, StagePorts, ToolInstructionRenderer,
};
pub use rag_context::{select_chunks, ChunkSelection, RagChunk, RagContextStage, MIN_TRUNCATION_BUDGET};
pub use search_context::{SearchContextStage, SearchResult};
pub use system_role::SystemRoleStage;
pub use tool_system_role::ToolSystemRoleStage;

use crate::context::PipelineContext;
use crate::errors::Result;
use async_trait::async_trait;
use std::fmt::Debug;
use tracing::warn;

/// Trait for pipeline stages.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Decides whether the stage runs for this context.
    ///
    /// The orchestrator skips the stage entirely when this returns false.
    fn should_run(&self, _ctx: &PipelineContext) -> bool {
        true
    }

    /// Transforms the context.
    ///
    /// # Errors
    ///
    /// Only for unexpected failures. Conditions that make the turn
    /// unprocessable are signalled with [`Stage::abort`] instead.
    async fn process(&self, ctx: PipelineContext) -> Result<PipelineContext>;

    /// Marks the run as aborted so no further stage is invoked.
    fn abort(&self, ctx: PipelineContext, reason: &str) -> PipelineContext {
        warn!(stage = self.name(), reason, "Stage aborted pipeline");
        ctx.aborted(reason)
    }

    /// Stamps that this stage ran.
    fn mark_executed(&self, ctx: PipelineContext) -> PipelineContext {
        ctx.mark_executed(self.name())
    }
}

/// A simple function-based stage.
pub struct FnStage<F>
where
    F: Fn(PipelineContext) -> Result<PipelineContext> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(PipelineContext) -> Result<PipelineContext> + Send + Sync,
{
    /// Creates a new function-based stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(PipelineContext) -> Result<PipelineContext> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(PipelineContext) -> Result<PipelineContext> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, ctx: PipelineContext) -> Result<PipelineContext> {
        let ctx = (self.func)(ctx)?;
        Ok(self.mark_executed(ctx))
    }
}

/// A stage that passes the context through unchanged.
#[derive(Debug, Clone)]
pub struct NoOpStage {
    name: String,
}

impl NoOpStage {
    /// Creates a new no-op stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Stage for NoOpStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, ctx: PipelineContext) -> Result<PipelineContext> {
        Ok(self.mark_executed(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::InitialState;
    use crate::core::Message;

    fn ctx() -> PipelineContext {
        PipelineContext::new(InitialState::new("m", "p").with_messages(vec![Message::user("hi")]))
    }

    #[tokio::test]
    async fn test_fn_stage() {
        let stage = FnStage::new("shout", |mut ctx: PipelineContext| {
            ctx.metadata.insert("shouted", true);
            Ok(ctx)
        });

        assert_eq!(stage.name(), "shout");

        let out = stage.process(ctx()).await.unwrap();
        assert!(out.metadata.get_bool("shouted"));
        assert!(out.has_executed("shout"));
    }

    #[tokio::test]
    async fn test_noop_stage() {
        let stage = NoOpStage::new("noop");
        let before = ctx();
        let out = stage.process(before.clone()).await.unwrap();

        assert_eq!(out.messages, before.messages);
        assert!(out.has_executed("noop"));
        assert!(stage.should_run(&out));
    }

    #[test]
    fn test_default_abort_sets_flag_and_reason() {
        let stage = NoOpStage::new("guard");
        let out = stage.abort(ctx(), "empty turn");
        assert!(out.is_aborted());
        assert_eq!(out.abort_reason(), Some("empty turn"));
    }
}
