//! Knowledge injection before the first user message.

use super::injection::inject_before_first_user;
use super::ports::{DefaultKnowledgeFormatter, KnowledgeFormatter, KnowledgeInput};
use super::Stage;
use crate::context::PipelineContext;
use crate::errors::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Injects formatted files and knowledge bases as a synthetic user turn.
#[derive(Clone)]
pub struct KnowledgeStage {
    input: KnowledgeInput,
    formatter: Arc<dyn KnowledgeFormatter>,
}

impl std::fmt::Debug for KnowledgeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeStage")
            .field("file_count", &self.input.file_contents.len())
            .field("knowledge_base_count", &self.input.knowledge_bases.len())
            .finish()
    }
}

impl KnowledgeStage {
    /// Stage name.
    pub const NAME: &'static str = "knowledge";

    /// Creates the stage with the default formatter.
    #[must_use]
    pub fn new(input: KnowledgeInput) -> Self {
        Self {
            input,
            formatter: Arc::new(DefaultKnowledgeFormatter::new()),
        }
    }

    /// Replaces the formatter.
    #[must_use]
    pub fn with_formatter(mut self, formatter: Arc<dyn KnowledgeFormatter>) -> Self {
        self.formatter = formatter;
        self
    }
}

#[async_trait]
impl Stage for KnowledgeStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn process(&self, mut ctx: PipelineContext) -> Result<PipelineContext> {
        if self.input.is_empty() {
            debug!("No knowledge to inject");
            return Ok(self.mark_executed(ctx));
        }

        let content = match self.formatter.format(&self.input).await {
            Ok(content) => content,
            Err(e) => {
                warn!(error = %e, "Knowledge formatter failed");
                ctx.metadata.set_in(Self::NAME, "error", e.to_string());
                return Ok(self.mark_executed(ctx));
            }
        };
        if content.trim().is_empty() {
            debug!("Knowledge formatter returned nothing");
            return Ok(self.mark_executed(ctx));
        }

        match inject_before_first_user(&mut ctx.messages, &content) {
            Some(outcome) => {
                ctx.metadata.set_in(Self::NAME, "injected", true);
                ctx.metadata
                    .set_in(Self::NAME, "fileCount", self.input.file_contents.len());
                ctx.metadata.set_in(
                    Self::NAME,
                    "knowledgeBaseCount",
                    self.input.knowledge_bases.len(),
                );
                debug!(?outcome, "Injected knowledge");
            }
            None => debug!("No user message to anchor knowledge"),
        }

        Ok(self.mark_executed(ctx))
    }
}
