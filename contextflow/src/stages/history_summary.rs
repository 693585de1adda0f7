//! History summary injection.

use super::injection::merge_or_create_system_message;
use super::ports::HistoryFormatter;
use super::Stage;
use crate::context::PipelineContext;
use crate::errors::Result;
use async_trait::async_trait;
use tracing::debug;

/// Wraps a summary in the built-in envelope.
#[must_use]
pub fn default_history_summary(summary: &str) -> String {
    format!(
        "<chat_history_summary>\n<docstring>Users may have lots of chat messages, here is the summary of the history:</docstring>\n<summary>{summary}</summary>\n</chat_history_summary>"
    )
}

/// Merges a summary of earlier turns into the system message.
#[derive(Clone, Default)]
pub struct HistorySummaryStage {
    summary: Option<String>,
    formatter: Option<HistoryFormatter>,
}

impl std::fmt::Debug for HistorySummaryStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistorySummaryStage")
            .field("has_summary", &self.summary.is_some())
            .field("has_formatter", &self.formatter.is_some())
            .finish()
    }
}

impl HistorySummaryStage {
    /// Stage name.
    pub const NAME: &'static str = "historySummary";

    /// Creates the stage.
    #[must_use]
    pub fn new(summary: Option<String>) -> Self {
        Self {
            summary,
            formatter: None,
        }
    }

    /// Replaces the built-in envelope.
    #[must_use]
    pub fn with_formatter(mut self, formatter: HistoryFormatter) -> Self {
        self.formatter = Some(formatter);
        self
    }
}

#[async_trait]
impl Stage for HistorySummaryStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn process(&self, mut ctx: PipelineContext) -> Result<PipelineContext> {
        let Some(summary) = self.summary.as_deref().filter(|s| !s.is_empty()) else {
            debug!("No history summary");
            return Ok(self.mark_executed(ctx));
        };

        let content = match &self.formatter {
            Some(formatter) => formatter(summary),
            None => default_history_summary(summary),
        };

        let outcome = merge_or_create_system_message(&mut ctx.messages, &content, Self::NAME);
        ctx.metadata.set_in(Self::NAME, "injected", true);
        debug!(?outcome, summary_length = summary.len(), "Injected history summary");

        Ok(self.mark_executed(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::InitialState;
    use crate::core::{Message, Role};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn ctx(messages: Vec<Message>) -> PipelineContext {
        PipelineContext::new(InitialState::new("m", "p").with_messages(messages))
    }

    #[tokio::test]
    async fn test_default_envelope_creates_system_message() {
        let out = HistorySummaryStage::new(Some("talked about rust".to_string()))
            .process(ctx(vec![Message::user("q")]))
            .await
            .unwrap();

        assert_eq!(out.messages[0].role, Role::System);
        let text = out.messages[0].content.text();
        assert!(text.starts_with("<chat_history_summary>"));
        assert!(text.contains("here is the summary of the history:</docstring>"));
        assert!(text.contains("<summary>talked about rust</summary>"));
        assert!(out.metadata.get_bool_in("historySummary", "injected"));
    }

    #[tokio::test]
    async fn test_custom_formatter_merges() {
        let out = HistorySummaryStage::new(Some("s".to_string()))
            .with_formatter(Arc::new(|s: &str| format!("Summary: {s}")))
            .process(ctx(vec![Message::system("base"), Message::user("q")]))
            .await
            .unwrap();

        assert_eq!(out.messages.len(), 2);
        assert_eq!(out.messages[0].content.as_text(), Some("base\n\nSummary: s"));
    }

    #[tokio::test]
    async fn test_absent_or_empty_summary_is_noop() {
        for summary in [None, Some(String::new())] {
            let out = HistorySummaryStage::new(summary)
                .process(ctx(vec![Message::user("q")]))
                .await
                .unwrap();
            assert_eq!(out.messages.len(), 1);
            assert!(!out.metadata.get_bool_in("historySummary", "injected"));
        }
    }
}
