//! The owned context threaded through a pipeline run.

use super::{InitialState, Metadata};
use crate::core::{Message, ModelMessage, Role};
use serde::Serialize;
use std::sync::Arc;

/// State carried from stage to stage during one chat turn.
///
/// Each stage receives the context by value and returns the next one, so
/// no stage can hold on to a context it has handed off. The initial state
/// is shared read-only between a context and its clones.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineContext {
    initial_state: Arc<InitialState>,
    /// Ordered message sequence.
    pub messages: Vec<Message>,
    /// Per-stage diagnostics.
    pub metadata: Metadata,
    is_aborted: bool,
    abort_reason: Option<String>,
    executed_stages: Vec<String>,
}

impl PipelineContext {
    /// Creates a context from the submitted request.
    ///
    /// Messages start as a copy of the request history, and metadata is
    /// seeded with the model and provider ids.
    #[must_use]
    pub fn new(initial_state: InitialState) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert("model", initial_state.model.clone());
        metadata.insert("provider", initial_state.provider.clone());

        Self {
            messages: initial_state.messages.clone(),
            initial_state: Arc::new(initial_state),
            metadata,
            is_aborted: false,
            abort_reason: None,
            executed_stages: Vec::new(),
        }
    }

    /// Replaces the message sequence.
    #[must_use]
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    /// Returns the request snapshot.
    #[must_use]
    pub fn initial_state(&self) -> &InitialState {
        &self.initial_state
    }

    /// Returns true once a stage has aborted the run.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.is_aborted
    }

    /// Returns the abort reason, if any.
    #[must_use]
    pub fn abort_reason(&self) -> Option<&str> {
        self.abort_reason.as_deref()
    }

    /// Marks the context as aborted.
    ///
    /// The first reason wins; aborting an already-aborted context keeps
    /// the original reason.
    #[must_use]
    pub fn aborted(mut self, reason: impl Into<String>) -> Self {
        if !self.is_aborted {
            self.is_aborted = true;
            self.abort_reason = Some(reason.into());
        }
        self
    }

    /// Records that a stage ran. Messages are untouched.
    #[must_use]
    pub fn mark_executed(mut self, stage: &str) -> Self {
        self.executed_stages.push(stage.to_string());
        self
    }

    /// Returns true if the named stage has run on this context.
    #[must_use]
    pub fn has_executed(&self, stage: &str) -> bool {
        self.executed_stages.iter().any(|s| s == stage)
    }

    /// Names of the stages that ran, in order.
    #[must_use]
    pub fn executed_stages(&self) -> &[String] {
        &self.executed_stages
    }

    /// Index of the first message with the given role.
    #[must_use]
    pub fn position_of(&self, role: Role) -> Option<usize> {
        self.messages.iter().position(|m| m.role == role)
    }

    /// Returns the messages in the shape the model layer consumes.
    #[must_use]
    pub fn to_model_messages(&self) -> Vec<ModelMessage> {
        self.messages.iter().map(Message::to_model_message).collect()
    }
}
