//! History window truncation.

use super::Stage;
use crate::config::HistoryConfig;
use crate::context::PipelineContext;
use crate::errors::Result;
use async_trait::async_trait;
use tracing::debug;

/// Keeps only the most recent `historyCount` messages.
#[derive(Debug, Clone, Default)]
pub struct HistoryTruncateStage {
    config: HistoryConfig,
}

impl HistoryTruncateStage {
    /// Stage name.
    pub const NAME: &'static str = "historyTruncate";

    /// Creates the stage.
    #[must_use]
    pub fn new(config: HistoryConfig) -> Self {
        Self { config }
    }

    /// Keeps the last `count` messages.
    #[must_use]
    pub fn keep_last(count: usize) -> Self {
        Self::new(HistoryConfig {
            enable_history_count: true,
            history_count: Some(count),
        })
    }
}

#[async_trait]
impl Stage for HistoryTruncateStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn process(&self, mut ctx: PipelineContext) -> Result<PipelineContext> {
        let limit = match self.config.history_count {
            Some(limit) if self.config.enable_history_count => limit,
            _ => {
                debug!("History truncation disabled");
                return Ok(self.mark_executed(ctx));
            }
        };

        let original = ctx.messages.len();
        if original > limit {
            ctx.messages.drain(..original - limit);
        }
        let kept = ctx.messages.len();

        ctx.metadata.set_in(Self::NAME, "originalCount", original);
        ctx.metadata.set_in(Self::NAME, "keptCount", kept);
        debug!(original, kept, "Truncated history");

        Ok(self.mark_executed(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::InitialState;
    use crate::core::Message;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ctx(count: usize) -> PipelineContext {
        let messages = (0..count).map(|i| Message::user(format!("m{i}"))).collect();
        PipelineContext::new(InitialState::new("m", "p").with_messages(messages))
    }

    #[tokio::test]
    async fn test_keeps_last_messages_in_order() {
        let out = HistoryTruncateStage::keep_last(2).process(ctx(5)).await.unwrap();
        let texts: Vec<String> = out.messages.iter().map(|m| m.content.text()).collect();

        assert_eq!(texts, vec!["m3", "m4"]);
        assert_eq!(out.metadata.get_in("historyTruncate", "originalCount"), Some(&json!(5)));
        assert_eq!(out.metadata.get_in("historyTruncate", "keptCount"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_short_history_untouched() {
        let out = HistoryTruncateStage::keep_last(10).process(ctx(3)).await.unwrap();
        assert_eq!(out.messages.len(), 3);
    }

    #[tokio::test]
    async fn test_disabled_is_noop() {
        let stage = HistoryTruncateStage::new(HistoryConfig {
            enable_history_count: false,
            history_count: Some(1),
        });
        let out = stage.process(ctx(3)).await.unwrap();
        assert_eq!(out.messages.len(), 3);
        assert!(out.metadata.namespace("historyTruncate").is_none());
    }
}
