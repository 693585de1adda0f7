//! Attached-file injection before the first user message.

use super::injection::inject_before_first_user;
use super::ports::{DefaultKnowledgeFormatter, FileContent, KnowledgeFormatter, KnowledgeInput};
use super::Stage;
use crate::config::FilesConfig;
use crate::context::PipelineContext;
use crate::core::{Message, Role};
use crate::errors::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Injects file contents as a synthetic user turn.
///
/// Files come from the stage itself and, when enabled, from the
/// `fileList` of user messages that carry extracted content.
#[derive(Clone)]
pub struct FilesStage {
    config: FilesConfig,
    files: Vec<FileContent>,
    formatter: Arc<dyn KnowledgeFormatter>,
}

impl std::fmt::Debug for FilesStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilesStage")
            .field("config", &self.config)
            .field("file_count", &self.files.len())
            .finish()
    }
}

impl FilesStage {
    /// Stage name.
    pub const NAME: &'static str = "files";

    /// Creates the stage with the default formatter.
    #[must_use]
    pub fn new(config: FilesConfig) -> Self {
        let formatter = DefaultKnowledgeFormatter::new().with_file_urls(config.include_file_url);
        Self {
            config,
            files: Vec::new(),
            formatter: Arc::new(formatter),
        }
    }

    /// Adds files supplied by the caller.
    #[must_use]
    pub fn with_files(mut self, files: Vec<FileContent>) -> Self {
        self.files = files;
        self
    }

    /// Replaces the formatter.
    #[must_use]
    pub fn with_formatter(mut self, formatter: Arc<dyn KnowledgeFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    fn collect(&self, messages: &[Message]) -> Vec<FileContent> {
        let mut files = self.files.clone();
        if self.config.enabled {
            let attached = messages
                .iter()
                .filter(|m| m.role == Role::User)
                .flat_map(|m| &m.file_list)
                .filter_map(|item| {
                    let content = item.content.as_deref()?;
                    Some(FileContent {
                        file_id: item.id.clone(),
                        filename: item.name.clone(),
                        content: content.to_string(),
                        url: item.url.clone(),
                    })
                });
            for file in attached {
                if !files.iter().any(|f| f.file_id == file.file_id) {
                    files.push(file);
                }
            }
        }
        files
    }
}

#[async_trait]
impl Stage for FilesStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn process(&self, mut ctx: PipelineContext) -> Result<PipelineContext> {
        let files = self.collect(&ctx.messages);
        if files.is_empty() {
            debug!("No files to inject");
            return Ok(self.mark_executed(ctx));
        }

        let count = files.len();
        let input = KnowledgeInput {
            file_contents: files,
            knowledge_bases: Vec::new(),
        };
        let content = match self.formatter.format(&input).await {
            Ok(content) => content,
            Err(e) => {
                warn!(error = %e, "File formatter failed");
                ctx.metadata.set_in(Self::NAME, "error", e.to_string());
                return Ok(self.mark_executed(ctx));
            }
        };
        if content.trim().is_empty() {
            debug!("File formatter returned nothing");
            return Ok(self.mark_executed(ctx));
        }

        match inject_before_first_user(&mut ctx.messages, &content) {
            Some(outcome) => {
                ctx.metadata.set_in(Self::NAME, "injected", true);
                ctx.metadata.set_in(Self::NAME, "fileCount", count);
                debug!(?outcome, file_count = count, "Injected files");
            }
            None => debug!("No user message to anchor files"),
        }

        Ok(self.mark_executed(ctx))
    }
}
