//! Inbox welcome guide injection.

use super::injection::merge_or_create_system_message;
use super::Stage;
use crate::config::InboxConfig;
use crate::context::PipelineContext;
use crate::errors::Result;
use async_trait::async_trait;
use tracing::debug;

/// Session id of the distinguished inbox session.
pub const INBOX_SESSION_ID: &str = "inbox";

/// Merges a guide into the system message on the inbox welcome question.
#[derive(Debug, Clone, Default)]
pub struct InboxGuideStage {
    config: InboxConfig,
}

impl InboxGuideStage {
    /// Stage name.
    pub const NAME: &'static str = "inboxGuide";

    /// Creates the stage.
    #[must_use]
    pub fn new(config: InboxConfig) -> Self {
        Self { config }
    }

    fn guide(&self) -> Option<&str> {
        let config = &self.config;
        let is_inbox = config.session_id.as_deref() == Some(INBOX_SESSION_ID);
        if !is_inbox || !config.is_welcome_question {
            return None;
        }
        config.guide.as_deref().filter(|g| !g.trim().is_empty())
    }
}

#[async_trait]
impl Stage for InboxGuideStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn should_run(&self, _ctx: &PipelineContext) -> bool {
        self.guide().is_some()
    }

    async fn process(&self, mut ctx: PipelineContext) -> Result<PipelineContext> {
        let Some(guide) = self.guide() else {
            debug!("Not an inbox welcome question");
            return Ok(self.mark_executed(ctx));
        };

        let outcome = merge_or_create_system_message(&mut ctx.messages, guide, Self::NAME);
        ctx.metadata.set_in(Self::NAME, "injected", true);
        debug!(?outcome, "Injected inbox guide");

        Ok(self.mark_executed(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::InitialState;
    use crate::core::Message;
    use pretty_assertions::assert_eq;

    fn config(session: &str, welcome: bool, guide: &str) -> InboxConfig {
        InboxConfig {
            session_id: Some(session.to_string()),
            is_welcome_question: welcome,
            guide: Some(guide.to_string()),
        }
    }

    fn ctx() -> PipelineContext {
        PipelineContext::new(
            InitialState::new("m", "p").with_messages(vec![Message::system("base"), Message::user("q")]),
        )
    }

    #[tokio::test]
    async fn test_all_conditions_hold() {
        let stage = InboxGuideStage::new(config("inbox", true, "Welcome!"));
        assert!(stage.should_run(&ctx()));

        let out = stage.process(ctx()).await.unwrap();
        assert_eq!(out.messages.len(), 2);
        assert_eq!(out.messages[0].content.as_text(), Some("base\n\nWelcome!"));
        assert!(out.metadata.get_bool_in("inboxGuide", "injected"));
    }

    #[tokio::test]
    async fn test_any_condition_missing_is_noop() {
        for cfg in [
            config("other", true, "Welcome!"),
            config("inbox", false, "Welcome!"),
            config("inbox", true, " "),
            InboxConfig::default(),
        ] {
            let stage = InboxGuideStage::new(cfg);
            assert!(!stage.should_run(&ctx()));

            let out = stage.process(ctx()).await.unwrap();
            assert_eq!(out.messages[0].content.as_text(), Some("base"));
        }
    }
}
