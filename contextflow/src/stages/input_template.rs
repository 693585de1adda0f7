//! User input templating.

use super::Stage;
use crate::context::PipelineContext;
use crate::core::{Message, Role};
use crate::errors::{Result, TemplateError};
use crate::template::{Segment, Template};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, warn};

const TEXT_TOKEN: &str = "text";

fn compile_input_template(source: &str) -> std::result::Result<Template, TemplateError> {
    let template = Template::compile(source)?;
    for segment in template.segments() {
        match segment {
            Segment::Literal(_) => {}
            Segment::Raw { name, .. } if name == TEXT_TOKEN => {}
            other => {
                return Err(TemplateError::UnknownToken {
                    token: other.source().to_string(),
                })
            }
        }
    }
    Ok(template)
}

/// Rewrites every user message through a template such as
/// `Please respond to: {{text}}`.
#[derive(Debug, Clone)]
pub struct InputTemplateStage {
    compiled: Option<std::result::Result<Template, TemplateError>>,
}

impl InputTemplateStage {
    /// Stage name.
    pub const NAME: &'static str = "inputTemplate";

    /// Compiles `template` once. Blank templates disable the stage.
    #[must_use]
    pub fn new(template: Option<&str>) -> Self {
        let compiled = template
            .filter(|t| !t.trim().is_empty())
            .map(compile_input_template);
        Self { compiled }
    }

    fn apply(template: &Template, message: &mut Message) -> std::result::Result<(), TemplateError> {
        let Some(text) = message.content.first_text_mut() else {
            return Err(TemplateError::MissingText);
        };
        let vars = HashMap::from([(TEXT_TOKEN.to_string(), text.clone())]);
        *text = template.render(&vars)?;
        Ok(())
    }
}

#[async_trait]
impl Stage for InputTemplateStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn process(&self, mut ctx: PipelineContext) -> Result<PipelineContext> {
        let template = match &self.compiled {
            None => {
                debug!("No input template");
                return Ok(self.mark_executed(ctx));
            }
            Some(Err(e)) => {
                warn!(error = %e, "Input template failed to compile");
                ctx.metadata.set_in(Self::NAME, "error", e.to_string());
                return Ok(self.mark_executed(ctx));
            }
            Some(Ok(template)) => template,
        };

        ctx.metadata.set_in(Self::NAME, "processedCount", 0);
        ctx.metadata.set_in(Self::NAME, "errorCount", 0);
        for (index, message) in ctx.messages.iter_mut().enumerate() {
            if message.role != Role::User || message.is_system_injection() {
                continue;
            }
            let mut candidate = message.clone();
            match Self::apply(template, &mut candidate) {
                Ok(()) => {
                    *message = candidate;
                    ctx.metadata.increment(Self::NAME, "processedCount");
                }
                Err(e) => {
                    warn!(index, error = %e, "Skipping message in input template");
                    ctx.metadata.increment(Self::NAME, "errorCount");
                }
            }
        }

        debug!(stats = ?ctx.metadata.namespace(Self::NAME), "Applied input template");

        Ok(self.mark_executed(ctx))
    }
}
