//! StagePorts - injected collaborators for stages.
//!
//! Collaborators are external to the pipeline: the capability checker, the
//! tool-instruction renderer, the knowledge formatter and the history
//! formatter. Closures implement the synchronous ports directly.

use crate::errors::Result;
use crate::template::VariableGenerator;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Reports whether a model/provider pair supports function calling.
pub trait CapabilityChecker: Send + Sync {
    /// Returns `None` when the pair is unknown.
    fn supports_function_calling(&self, model: &str, provider: &str) -> Option<bool>;
}

impl<F> CapabilityChecker for F
where
    F: Fn(&str, &str) -> Option<bool> + Send + Sync,
{
    fn supports_function_calling(&self, model: &str, provider: &str) -> Option<bool> {
        self(model, provider)
    }
}

/// Renders a tool list into natural-language instructions.
pub trait ToolInstructionRenderer: Send + Sync {
    /// Returns `None` when there is nothing to say about the tools.
    fn render(&self, tools: &[String]) -> Option<String>;
}

impl<F> ToolInstructionRenderer for F
where
    F: Fn(&[String]) -> Option<String> + Send + Sync,
{
    fn render(&self, tools: &[String]) -> Option<String> {
        self(tools)
    }
}

/// Wraps a history summary into the text injected into the system message.
pub type HistoryFormatter = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Extracted content of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FileContent {
    /// File id.
    pub file_id: String,
    /// File name.
    pub filename: String,
    /// Extracted text.
    pub content: String,
    /// Download location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl FileContent {
    /// Creates a file content record.
    #[must_use]
    pub fn new(
        file_id: impl Into<String>,
        filename: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            file_id: file_id.into(),
            filename: filename.into(),
            content: content.into(),
            url: None,
        }
    }
}

/// A knowledge base the model may be told about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct KnowledgeBase {
    /// Knowledge base id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// What the knowledge base contains.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Input handed to a [`KnowledgeFormatter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeInput {
    /// File contents.
    #[serde(default)]
    pub file_contents: Vec<FileContent>,
    /// Knowledge base descriptors.
    #[serde(default)]
    pub knowledge_bases: Vec<KnowledgeBase>,
}

impl KnowledgeInput {
    /// Returns true if there is nothing to format.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.file_contents.is_empty() && self.knowledge_bases.is_empty()
    }
}

/// Renders knowledge into a single instructional block.
///
/// An empty string means "nothing to inject".
#[async_trait]
pub trait KnowledgeFormatter: Send + Sync {
    /// Formats the input.
    ///
    /// # Errors
    ///
    /// Returns an error if the formatter cannot produce output.
    async fn format(&self, input: &KnowledgeInput) -> Result<String>;
}

/// Built-in XML-like knowledge formatter.
#[derive(Debug, Clone, Default)]
pub struct DefaultKnowledgeFormatter {
    include_file_url: bool,
}

impl DefaultKnowledgeFormatter {
    /// Creates the default formatter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also renders each file's download location.
    #[must_use]
    pub fn with_file_urls(mut self, include: bool) -> Self {
        self.include_file_url = include;
        self
    }

    /// Formats synchronously.
    #[must_use]
    pub fn render(&self, input: &KnowledgeInput) -> String {
        if input.is_empty() {
            return String::new();
        }

        let mut out = String::from("<knowledge>\n");
        out.push_str(
            "<instruction>The following files and knowledge bases are available to answer the user's question.</instruction>\n",
        );

        if !input.file_contents.is_empty() {
            out.push_str("<files>\n");
            for file in &input.file_contents {
                out.push_str(&format!("<file id=\"{}\" name=\"{}\"", file.file_id, file.filename));
                if self.include_file_url {
                    if let Some(url) = &file.url {
                        out.push_str(&format!(" url=\"{url}\""));
                    }
                }
                out.push_str(&format!(">\n{}\n</file>\n", file.content));
            }
            out.push_str("</files>\n");
        }

        if !input.knowledge_bases.is_empty() {
            out.push_str("<knowledge_bases>\n");
            for kb in &input.knowledge_bases {
                out.push_str(&format!(
                    "<knowledge_base id=\"{}\" name=\"{}\">{}</knowledge_base>\n",
                    kb.id,
                    kb.name,
                    kb.description.as_deref().unwrap_or_default()
                ));
            }
            out.push_str("</knowledge_bases>\n");
        }

        out.push_str("</knowledge>");
        out
    }
}

#[async_trait]
impl KnowledgeFormatter for DefaultKnowledgeFormatter {
    async fn format(&self, input: &KnowledgeInput) -> Result<String> {
        Ok(self.render(input))
    }
}

/// Collaborators injected into the default stage set.
#[derive(Clone, Default)]
pub struct StagePorts {
    /// Function-calling capability check.
    pub capability_checker: Option<Arc<dyn CapabilityChecker>>,
    /// Tool list renderer.
    pub tool_renderer: Option<Arc<dyn ToolInstructionRenderer>>,
    /// Knowledge formatter. Falls back to [`DefaultKnowledgeFormatter`].
    pub knowledge_formatter: Option<Arc<dyn KnowledgeFormatter>>,
    /// History summary formatter. Falls back to the built-in envelope.
    pub history_formatter: Option<HistoryFormatter>,
    /// Lazily evaluated placeholder variables.
    pub variable_generators: BTreeMap<String, VariableGenerator>,
}

impl std::fmt::Debug for StagePorts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagePorts")
            .field("has_capability_checker", &self.capability_checker.is_some())
            .field("has_tool_renderer", &self.tool_renderer.is_some())
            .field("has_knowledge_formatter", &self.knowledge_formatter.is_some())
            .field("has_history_formatter", &self.history_formatter.is_some())
            .field(
                "variable_generators",
                &self.variable_generators.keys().collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl StagePorts {
    /// Creates empty ports.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the capability checker.
    #[must_use]
    pub fn with_capability_checker(mut self, checker: Arc<dyn CapabilityChecker>) -> Self {
        self.capability_checker = Some(checker);
        self
    }

    /// Sets the tool renderer.
    #[must_use]
    pub fn with_tool_renderer(mut self, renderer: Arc<dyn ToolInstructionRenderer>) -> Self {
        self.tool_renderer = Some(renderer);
        self
    }

    /// Sets the knowledge formatter.
    #[must_use]
    pub fn with_knowledge_formatter(mut self, formatter: Arc<dyn KnowledgeFormatter>) -> Self {
        self.knowledge_formatter = Some(formatter);
        self
    }

    /// Sets the history formatter.
    #[must_use]
    pub fn with_history_formatter(mut self, formatter: HistoryFormatter) -> Self {
        self.history_formatter = Some(formatter);
        self
    }

    /// Adds a variable generator.
    #[must_use]
    pub fn with_variable_generator(
        mut self,
        name: impl Into<String>,
        generator: VariableGenerator,
    ) -> Self {
        self.variable_generators.insert(name.into(), generator);
        self
    }

    /// Adds every built-in generator (`date`, `time`, `uuid`, ...).
    #[must_use]
    pub fn with_builtin_generators(mut self) -> Self {
        self.variable_generators
            .extend(crate::template::builtin_generators());
        self
    }

    /// Returns true if a capability checker is configured.
    #[must_use]
    pub fn has_capability_checker(&self) -> bool {
        self.capability_checker.is_some()
    }

    /// Returns true if a tool renderer is configured.
    #[must_use]
    pub fn has_tool_renderer(&self) -> bool {
        self.tool_renderer.is_some()
    }
}
