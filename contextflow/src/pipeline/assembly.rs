//! Default stage order for a chat turn.

use super::engine::{ContextEngine, PipelineOutcome};
use crate::config::EngineConfig;
use crate::context::{InitialState, PipelineContext};
use crate::core::ModelMessage;
use crate::errors::Result;
use crate::events::EventSink;
use crate::stages::{
    FileContent, FilesStage, HistorySummaryStage, HistoryTruncateStage, InboxGuideStage,
    InputTemplateStage, KnowledgeInput, KnowledgeStage, PlaceholderVariablesStage, RagChunk,
    RagContextStage, SearchContextStage, SearchResult, Stage, StagePorts, SystemRoleStage,
    ToolSystemRoleStage,
};
use std::sync::Arc;
use tracing::debug;

/// Everything the default pipeline needs for one turn.
#[derive(Clone, Default)]
pub struct AssemblyParams {
    /// Serializable settings.
    pub config: EngineConfig,
    /// Injected collaborators.
    pub ports: StagePorts,
    /// Files and knowledge bases for the knowledge block.
    pub knowledge: KnowledgeInput,
    /// Extra files for the files block.
    pub files: Vec<FileContent>,
    /// Retrieved chunks.
    pub rag_chunks: Vec<RagChunk>,
    /// Search results already fetched by the caller.
    pub search_results: Vec<SearchResult>,
    /// Lifecycle event sink.
    pub event_sink: Option<Arc<dyn EventSink>>,
}

impl std::fmt::Debug for AssemblyParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssemblyParams")
            .field("config", &self.config)
            .field("ports", &self.ports)
            .field("knowledge", &self.knowledge)
            .field("files", &self.files.len())
            .field("rag_chunks", &self.rag_chunks.len())
            .field("search_results", &self.search_results.len())
            .field("has_event_sink", &self.event_sink.is_some())
            .finish()
    }
}

/// Builds and runs the default pipeline:
///
/// history truncation, system role, inbox guide, tool instructions,
/// history summary, knowledge, files, input template, placeholder
/// variables, retrieved knowledge, then search context.
#[derive(Debug, Clone)]
pub struct MessagesAssembler {
    engine: ContextEngine,
}

impl MessagesAssembler {
    /// Creates an assembler from `params`.
    #[must_use]
    pub fn new(params: AssemblyParams) -> Self {
        let AssemblyParams {
            config,
            ports,
            knowledge,
            files,
            rag_chunks,
            search_results,
            event_sink,
        } = params;

        let mut system_role = SystemRoleStage::new();
        if let Some(role) = &config.system_role {
            system_role = system_role.with_system_role(role.clone());
        }

        let mut tool_role = ToolSystemRoleStage::new();
        if let Some(tools) = &config.tools {
            tool_role = tool_role.with_tools(tools.clone());
        }
        if let Some(checker) = &ports.capability_checker {
            tool_role = tool_role.with_checker(Arc::clone(checker));
        }
        if let Some(renderer) = &ports.tool_renderer {
            tool_role = tool_role.with_renderer(Arc::clone(renderer));
        }

        let mut summary = HistorySummaryStage::new(config.history_summary.clone());
        if let Some(formatter) = &ports.history_formatter {
            summary = summary.with_formatter(Arc::clone(formatter));
        }

        let mut knowledge_stage = KnowledgeStage::new(knowledge);
        let mut files_stage = FilesStage::new(config.files.clone()).with_files(files);
        if let Some(formatter) = &ports.knowledge_formatter {
            knowledge_stage = knowledge_stage.with_formatter(Arc::clone(formatter));
            files_stage = files_stage.with_formatter(Arc::clone(formatter));
        }

        let placeholders = PlaceholderVariablesStage::new(config.variables.clone())
            .with_generators(ports.variable_generators.clone());

        let stages: Vec<Arc<dyn Stage>> = vec![
            Arc::new(HistoryTruncateStage::new(config.history.clone())),
            Arc::new(system_role),
            Arc::new(InboxGuideStage::new(config.inbox.clone())),
            Arc::new(tool_role),
            Arc::new(summary),
            Arc::new(knowledge_stage),
            Arc::new(files_stage),
            Arc::new(InputTemplateStage::new(config.input_template.as_deref())),
            Arc::new(placeholders),
            Arc::new(RagContextStage::new(rag_chunks, config.rag.clone())),
            Arc::new(SearchContextStage::new(config.search.clone()).with_results(search_results)),
        ];

        let mut engine = ContextEngine::new(stages);
        if let Some(sink) = event_sink {
            engine = engine.with_event_sink(sink);
        }
        debug!(stages = ?engine.stats().stage_names, "Built default pipeline");

        Self { engine }
    }

    /// Returns the underlying engine.
    #[must_use]
    pub fn engine(&self) -> &ContextEngine {
        &self.engine
    }

    /// Runs the default pipeline over `state`.
    ///
    /// # Errors
    ///
    /// Returns an error if a stage fails unexpectedly.
    pub async fn process(&self, state: InitialState) -> Result<PipelineOutcome> {
        self.engine.process(PipelineContext::new(state)).await
    }

    /// Runs the default pipeline and returns the model-ready messages.
    ///
    /// # Errors
    ///
    /// Returns an error if a stage fails unexpectedly.
    pub async fn process_messages(&self, state: InitialState) -> Result<Vec<ModelMessage>> {
        let outcome = self.process(state).await?;
        Ok(outcome.context.to_model_messages())
    }
}
