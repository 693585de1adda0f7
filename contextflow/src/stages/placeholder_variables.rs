//! Placeholder substitution across all messages.

use super::Stage;
use crate::context::PipelineContext;
use crate::core::Message;
use crate::errors::{Result, TemplateError};
use crate::template::{
    extract_placeholders, preview_placeholders, substitute, PlaceholderPreview, VariableGenerator, VariableScope,
    VariableSource,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Substitutes `{{ }}`, `<%- %>` and `<%= %>` tags in every message.
#[derive(Clone, Default)]
pub struct PlaceholderVariablesStage {
    values: BTreeMap<String, String>,
    generators: BTreeMap<String, VariableGenerator>,
}

impl std::fmt::Debug for PlaceholderVariablesStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaceholderVariablesStage")
            .field("values", &self.values.keys().collect::<Vec<_>>())
            .field("generators", &self.generators.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PlaceholderVariablesStage {
    /// Stage name.
    pub const NAME: &'static str = "placeholderVariables";

    /// Creates the stage from static values.
    #[must_use]
    pub fn new(values: BTreeMap<String, String>) -> Self {
        Self {
            values,
            generators: BTreeMap::new(),
        }
    }

    /// Adds lazily evaluated variables. Static values take precedence.
    #[must_use]
    pub fn with_generators(mut self, generators: BTreeMap<String, VariableGenerator>) -> Self {
        self.generators.extend(generators);
        self
    }

    /// Previews substitution on `text` without touching any message.
    #[must_use]
    pub fn preview(&self, text: &str) -> PlaceholderPreview {
        let scope = VariableScope::new(&self.values, &self.generators);
        preview_placeholders(text, &scope)
    }

    /// Names referenced by any tag in `text`, de-duplicated in first-seen order.
    #[must_use]
    pub fn placeholders(text: &str) -> Vec<String> {
        extract_placeholders(text)
    }

    fn substitute_message(
        message: &Message,
        vars: &dyn VariableSource,
    ) -> std::result::Result<Option<Message>, TemplateError> {
        let mut updated: Option<Message> = None;
        for (position, text) in message.content.texts().into_iter().enumerate() {
            if let Some(rendered) = substitute(text, vars)? {
                if rendered != text {
                    let target = updated.get_or_insert_with(|| message.clone());
                    if let Some(slot) = target.content.texts_mut().into_iter().nth(position) {
                        *slot = rendered;
                    }
                }
            }
        }
        Ok(updated)
    }
}

#[async_trait]
impl Stage for PlaceholderVariablesStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn process(&self, mut ctx: PipelineContext) -> Result<PipelineContext> {
        if self.values.is_empty() && self.generators.is_empty() {
            debug!("No placeholder variables");
            return Ok(self.mark_executed(ctx));
        }

        let scope = VariableScope::new(&self.values, &self.generators);
        ctx.metadata.set_in(Self::NAME, "processedCount", 0);
        ctx.metadata.set_in(Self::NAME, "errorCount", 0);
        for (index, message) in ctx.messages.iter_mut().enumerate() {
            match Self::substitute_message(message, &scope) {
                Ok(Some(updated)) => {
                    *message = updated;
                    ctx.metadata.increment(Self::NAME, "processedCount");
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(index, error = %e, "Skipping message in placeholder substitution");
                    ctx.metadata.increment(Self::NAME, "errorCount");
                }
            }
        }

        debug!(stats = ?ctx.metadata.namespace(Self::NAME), "Substituted placeholders");

        Ok(self.mark_executed(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::InitialState;
    use crate::core::{ContentPart, MessageContent};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn stage() -> PlaceholderVariablesStage {
        PlaceholderVariablesStage::new(BTreeMap::from([
            ("name".to_string(), "Ada".to_string()),
            ("tag".to_string(), "<b>".to_string()),
        ]))
    }

    fn ctx(messages: Vec<Message>) -> PipelineContext {
        PipelineContext::new(InitialState::new("m", "p").with_messages(messages))
    }

    #[tokio::test]
    async fn test_substitutes_every_role() {
        let out = stage()
            .process(ctx(vec![
                Message::system("You talk to {{name}}."),
                Message::user("Hi, I am <%- tag %>"),
                Message::assistant("<%= 'Hello ' + name.upper() %>"),
            ]))
            .await
            .unwrap();

        assert_eq!(out.messages[0].content.as_text(), Some("You talk to Ada."));
        assert_eq!(out.messages[1].content.as_text(), Some("Hi, I am &lt;b&gt;"));
        assert_eq!(out.messages[2].content.as_text(), Some("Hello ADA"));
        assert_eq!(out.metadata.get_in("placeholderVariables", "processedCount"), Some(&json!(3)));
    }

    #[tokio::test]
    async fn test_untouched_messages_are_identical() {
        let original = Message::user("no tags here").with_id("keep");
        let out = stage().process(ctx(vec![original.clone()])).await.unwrap();
        assert_eq!(out.messages[0], original);
        assert_eq!(out.metadata.get_in("placeholderVariables", "processedCount"), Some(&json!(0)));
    }

    #[tokio::test]
    async fn test_per_message_error_keeps_original() {
        let broken = Message::user("{{name}} <%= missing %>");
        let out = stage()
            .process(ctx(vec![broken.clone(), Message::user("{{name}}")]))
            .await
            .unwrap();

        assert_eq!(out.messages[0], broken);
        assert_eq!(out.messages[1].content.as_text(), Some("Ada"));
        assert_eq!(out.metadata.get_in("placeholderVariables", "errorCount"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_deeply_nested_tag_is_a_message_error() {
        let deep = Message::user(format!(
            "{{{{name}}}} <%= {}name{} %>",
            "(".repeat(200_000),
            ")".repeat(200_000)
        ));
        let out = stage().process(ctx(vec![deep.clone()])).await.unwrap();

        assert_eq!(out.messages[0], deep);
        assert_eq!(out.metadata.get_in("placeholderVariables", "errorCount"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_multimodal_parts() {
        let out = stage()
            .process(ctx(vec![Message::user(vec![
                ContentPart::text("a {{name}}"),
                ContentPart::image("u"),
                ContentPart::text("b {{name}}"),
            ])]))
            .await
            .unwrap();
        assert_eq!(
            out.messages[0].content,
            MessageContent::Parts(vec![
                ContentPart::text("a Ada"),
                ContentPart::image("u"),
                ContentPart::text("b Ada"),
            ])
        );
    }

    #[tokio::test]
    async fn test_generators_are_lazy_and_shared() {
        let stage = PlaceholderVariablesStage::new(BTreeMap::new()).with_generators(BTreeMap::from([(
            "id".to_string(),
            Arc::new(|| crate::utils::generate_uuid().to_string()) as VariableGenerator,
        )]));
        let out = stage
            .process(ctx(vec![Message::user("{{id}}"), Message::user("{{id}}")]))
            .await
            .unwrap();
        assert_eq!(out.messages[0].content, out.messages[1].content);
        assert_ne!(out.messages[0].content.as_text(), Some("{{id}}"));
    }

    #[test]
    fn test_preview() {
        let preview = stage().preview("Hi {{name}}");
        assert_eq!(preview.rendered, "Hi Ada");
        assert!(preview.changed);
    }

    #[test]
    fn test_placeholders_round_trip() {
        let text = "{{name}} and <%- name %> met <%= city || \"home\" %>";
        assert_eq!(
            PlaceholderVariablesStage::placeholders(text),
            vec!["name".to_string(), "city".to_string()]
        );
        assert_eq!(stage().preview("Hello {{name}}").rendered, "Hello Ada");
    }
}
