//! Leading system role injection.

use super::injection::new_system_message;
use super::Stage;
use crate::context::PipelineContext;
use crate::core::Role;
use crate::errors::Result;
use async_trait::async_trait;
use tracing::debug;

/// Inserts the configured system role as the first message.
///
/// Runs at most once per context: nothing is inserted when index 0 is
/// already a system message.
#[derive(Debug, Clone, Default)]
pub struct SystemRoleStage {
    system_role: Option<String>,
}

impl SystemRoleStage {
    /// Stage name.
    pub const NAME: &'static str = "systemRole";

    /// Uses the request's system role.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `system_role` instead of the request's.
    #[must_use]
    pub fn with_system_role(mut self, system_role: impl Into<String>) -> Self {
        self.system_role = Some(system_role.into());
        self
    }

    fn resolve<'a>(&'a self, ctx: &'a PipelineContext) -> Option<&'a str> {
        self.system_role
            .as_deref()
            .or(ctx.initial_state().system_role.as_deref())
            .filter(|role| !role.trim().is_empty())
    }
}

#[async_trait]
impl Stage for SystemRoleStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn process(&self, mut ctx: PipelineContext) -> Result<PipelineContext> {
        let Some(system_role) = self.resolve(&ctx).map(str::to_owned) else {
            debug!("No system role configured");
            return Ok(self.mark_executed(ctx));
        };

        if ctx.messages.first().is_some_and(|m| m.role == Role::System) {
            debug!("System message already leads the conversation");
            return Ok(self.mark_executed(ctx));
        }

        ctx.messages
            .insert(0, new_system_message(&system_role, Self::NAME));
        ctx.metadata.insert("systemRoleInjected", true);
        debug!(length = system_role.len(), "Injected system role");

        Ok(self.mark_executed(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::InitialState;
    use crate::core::Message;
    use pretty_assertions::assert_eq;

    fn ctx(system_role: Option<&str>, messages: Vec<Message>) -> PipelineContext {
        let mut state = InitialState::new("m", "p").with_messages(messages);
        state.system_role = system_role.map(str::to_string);
        PipelineContext::new(state)
    }

    #[tokio::test]
    async fn test_injects_leading_system_message() {
        let out = SystemRoleStage::new()
            .process(ctx(Some("Be kind."), vec![Message::user("hi")]))
            .await
            .unwrap();

        assert_eq!(out.messages.len(), 2);
        assert_eq!(out.messages[0].role, Role::System);
        assert_eq!(out.messages[0].content.as_text(), Some("Be kind."));
        assert!(out.metadata.get_bool("systemRoleInjected"));
        assert!(out.has_executed(SystemRoleStage::NAME));
    }

    #[tokio::test]
    async fn test_idempotent() {
        let stage = SystemRoleStage::new();
        let once = stage
            .process(ctx(Some("Be kind."), vec![Message::user("hi")]))
            .await
            .unwrap();
        let twice = stage.process(once.clone()).await.unwrap();

        assert_eq!(twice.messages, once.messages);
    }

    #[tokio::test]
    async fn test_existing_leading_system_message_is_kept() {
        let out = SystemRoleStage::new()
            .process(ctx(
                Some("Be kind."),
                vec![Message::system("existing"), Message::user("hi")],
            ))
            .await
            .unwrap();

        assert_eq!(out.messages.len(), 2);
        assert_eq!(out.messages[0].content.as_text(), Some("existing"));
        assert!(!out.metadata.contains_key("systemRoleInjected"));
    }

    #[tokio::test]
    async fn test_blank_or_missing_role_is_noop() {
        for role in [None, Some("   ")] {
            let out = SystemRoleStage::new()
                .process(ctx(role, vec![Message::user("hi")]))
                .await
                .unwrap();
            assert_eq!(out.messages.len(), 1);
            assert!(out.has_executed(SystemRoleStage::NAME));
        }
    }

    #[tokio::test]
    async fn test_override_wins() {
        let out = SystemRoleStage::new()
            .with_system_role("override")
            .process(ctx(Some("request"), vec![Message::user("hi")]))
            .await
            .unwrap();
        assert_eq!(out.messages[0].content.as_text(), Some("override"));
    }
}
