//! Tool-use instruction injection.

use super::injection::{merge_or_create_system_message, SystemInjection};
use super::ports::{CapabilityChecker, ToolInstructionRenderer};
use super::Stage;
use crate::context::PipelineContext;
use crate::errors::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Merges rendered tool instructions into the system message.
///
/// Requires a non-empty tool list, function-calling support for the
/// model/provider pair, and a non-empty rendering.
#[derive(Clone, Default)]
pub struct ToolSystemRoleStage {
    tools: Option<Vec<String>>,
    checker: Option<Arc<dyn CapabilityChecker>>,
    renderer: Option<Arc<dyn ToolInstructionRenderer>>,
}

impl std::fmt::Debug for ToolSystemRoleStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSystemRoleStage")
            .field("tools", &self.tools)
            .field("has_checker", &self.checker.is_some())
            .field("has_renderer", &self.renderer.is_some())
            .finish()
    }
}

impl ToolSystemRoleStage {
    /// Stage name.
    pub const NAME: &'static str = "toolSystemRole";

    /// Creates the stage. Tools default to the request's tool list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the tool list.
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Sets the capability checker. Without one, support is assumed.
    #[must_use]
    pub fn with_checker(mut self, checker: Arc<dyn CapabilityChecker>) -> Self {
        self.checker = Some(checker);
        self
    }

    /// Sets the instruction renderer.
    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn ToolInstructionRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    fn supports_function_calling(&self, ctx: &PipelineContext) -> bool {
        match &self.checker {
            None => true,
            Some(checker) => {
                let state = ctx.initial_state();
                checker
                    .supports_function_calling(&state.model, &state.provider)
                    .unwrap_or(false)
            }
        }
    }
}

#[async_trait]
impl Stage for ToolSystemRoleStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn process(&self, mut ctx: PipelineContext) -> Result<PipelineContext> {
        let tools = self
            .tools
            .clone()
            .unwrap_or_else(|| ctx.initial_state().tools.clone());
        if tools.is_empty() {
            debug!("No tools enabled");
            return Ok(self.mark_executed(ctx));
        }

        if !self.supports_function_calling(&ctx) {
            debug!(
                model = %ctx.initial_state().model,
                provider = %ctx.initial_state().provider,
                "Model does not support function calling"
            );
            return Ok(self.mark_executed(ctx));
        }

        let instructions = self
            .renderer
            .as_ref()
            .and_then(|renderer| renderer.render(&tools))
            .filter(|text| !text.trim().is_empty());
        let Some(instructions) = instructions else {
            debug!("Tool renderer produced no instructions");
            return Ok(self.mark_executed(ctx));
        };

        let outcome = merge_or_create_system_message(&mut ctx.messages, &instructions, Self::NAME);
        ctx.metadata.set_in(Self::NAME, "injected", true);
        ctx.metadata.set_in(Self::NAME, "toolCount", tools.len());
        ctx.metadata
            .set_in(Self::NAME, "merged", matches!(outcome, SystemInjection::Merged(_)));
        debug!(tool_count = tools.len(), ?outcome, "Injected tool instructions");

        Ok(self.mark_executed(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::InitialState;
    use crate::core::{Message, Role};
    use pretty_assertions::assert_eq;

    fn ctx(messages: Vec<Message>) -> PipelineContext {
        PipelineContext::new(
            InitialState::new("gpt-4o", "openai")
                .with_tools(vec!["search".to_string(), "calc".to_string()])
                .with_messages(messages),
        )
    }

    fn renderer() -> Arc<dyn ToolInstructionRenderer> {
        Arc::new(|tools: &[String]| Some(format!("Tools: {}", tools.join(", "))))
    }

    #[tokio::test]
    async fn test_merges_into_existing_system_message() {
        let out = ToolSystemRoleStage::new()
            .with_renderer(renderer())
            .process(ctx(vec![Message::system("base"), Message::user("q")]))
            .await
            .unwrap();

        assert_eq!(out.messages.len(), 2);
        assert_eq!(
            out.messages[0].content.as_text(),
            Some("base\n\nTools: search, calc")
        );
        assert!(out.metadata.get_bool_in("toolSystemRole", "injected"));
    }

    #[tokio::test]
    async fn test_creates_system_message_when_absent() {
        let out = ToolSystemRoleStage::new()
            .with_renderer(renderer())
            .process(ctx(vec![Message::user("q")]))
            .await
            .unwrap();

        assert_eq!(out.messages.len(), 2);
        assert_eq!(out.messages[0].role, Role::System);
        assert_eq!(out.messages[0].content.as_text(), Some("Tools: search, calc"));
    }

    #[tokio::test]
    async fn test_checker_none_means_unsupported() {
        let out = ToolSystemRoleStage::new()
            .with_renderer(renderer())
            .with_checker(Arc::new(|_: &str, _: &str| None))
            .process(ctx(vec![Message::user("q")]))
            .await
            .unwrap();

        assert_eq!(out.messages.len(), 1);
        assert!(!out.metadata.get_bool_in("toolSystemRole", "injected"));
    }

    #[tokio::test]
    async fn test_checker_false_is_noop() {
        let out = ToolSystemRoleStage::new()
            .with_renderer(renderer())
            .with_checker(Arc::new(|_: &str, _: &str| Some(false)))
            .process(ctx(vec![Message::user("q")]))
            .await
            .unwrap();
        assert_eq!(out.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_no_tools_or_empty_rendering_is_noop() {
        let out = ToolSystemRoleStage::new()
            .with_tools(Vec::new())
            .with_renderer(renderer())
            .process(ctx(vec![Message::user("q")]))
            .await
            .unwrap();
        assert_eq!(out.messages.len(), 1);

        let out = ToolSystemRoleStage::new()
            .with_renderer(Arc::new(|_: &[String]| Some("  ".to_string())))
            .process(ctx(vec![Message::user("q")]))
            .await
            .unwrap();
        assert_eq!(out.messages.len(), 1);

        let out = ToolSystemRoleStage::new()
            .process(ctx(vec![Message::user("q")]))
            .await
            .unwrap();
        assert_eq!(out.messages.len(), 1);
    }
}
