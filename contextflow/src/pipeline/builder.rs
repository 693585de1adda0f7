//! Pipeline builder with validation.

use super::engine::ContextEngine;
use crate::errors::{ContractErrorInfo, PipelineValidationError};
use crate::events::EventSink;
use crate::stages::Stage;
use std::collections::HashSet;
use std::sync::Arc;

/// Builder for creating validated engines.
#[derive(Clone)]
pub struct PipelineBuilder {
    /// The pipeline name.
    name: String,
    /// Stages in run order.
    stages: Vec<Arc<dyn Stage>>,
    event_sink: Option<Arc<dyn EventSink>>,
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("name", &self.name)
            .field(
                "stages",
                &self.stages.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            event_sink: None,
        }
    }

    /// Appends a stage.
    #[must_use]
    pub fn stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Sets the event sink handed to the built engine.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Builds the engine.
    ///
    /// # Errors
    ///
    /// Returns the first validation problem: no stages, a stage with a
    /// blank name, or duplicate stage names.
    pub fn build(self) -> Result<ContextEngine, PipelineValidationError> {
        if let Some(err) = validation_errors(&self.stages).into_iter().next() {
            return Err(err);
        }

        let engine = ContextEngine::new(self.stages);
        Ok(match self.event_sink {
            Some(sink) => engine.with_event_sink(sink),
            None => engine,
        })
    }
}

/// Collects every problem with a stage list.
pub(crate) fn validation_errors(stages: &[Arc<dyn Stage>]) -> Vec<PipelineValidationError> {
    let mut errors = Vec::new();

    if stages.is_empty() {
        errors.push(
            PipelineValidationError::new("No stages in pipeline").with_error_info(
                ContractErrorInfo::new("PIPELINE-EMPTY", "Cannot build an empty pipeline")
                    .with_fix_hint("Add at least one stage to the pipeline before building."),
            ),
        );
        return errors;
    }

    if stages.iter().any(|s| s.name().trim().is_empty()) {
        errors.push(
            PipelineValidationError::new("Stage missing name").with_error_info(
                ContractErrorInfo::new("PIPELINE-UNNAMED-STAGE", "A stage has a blank name")
                    .with_fix_hint("Give every stage a unique, non-empty name."),
            ),
        );
    }

    let mut seen = HashSet::new();
    let mut duplicates: Vec<String> = Vec::new();
    for stage in stages {
        let name = stage.name();
        if !seen.insert(name) && !duplicates.iter().any(|d| d == name) {
            duplicates.push(name.to_string());
        }
    }
    if !duplicates.is_empty() {
        errors.push(
            PipelineValidationError::new(format!(
                "Found duplicate stage names: {}",
                duplicates.join(", ")
            ))
            .with_stages(duplicates.clone())
            .with_error_info(
                ContractErrorInfo::new(
                    "PIPELINE-DUPLICATE-STAGE",
                    "Stage names must be unique within a pipeline",
                )
                .with_fix_hint("Remove the repeated stage or give it a distinct name."),
            ),
        );
    }

    errors
}
