//! Error types for the contextflow pipeline.
//!
//! Content-injection stages degrade to metadata + no-op instead of failing,
//! so the variants here cover pipeline construction, unexpected stage
//! failures, template compilation and the external collaborators.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ContextflowError>;

/// The main error type for contextflow operations.
#[derive(Debug, Error)]
pub enum ContextflowError {
    /// Pipeline construction or validation failed.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// A stage returned an unexpected error.
    #[error("{0}")]
    StageExecution(#[from] StageExecutionError),

    /// A template could not be compiled or rendered.
    #[error("{0}")]
    Template(#[from] TemplateError),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A collaborator (formatter, search provider, ...) failed.
    #[error("Collaborator '{name}' failed: {message}")]
    Collaborator {
        /// The collaborator name.
        name: String,
        /// The failure message.
        message: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContextflowError {
    /// Creates a collaborator error.
    #[must_use]
    pub fn collaborator(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Collaborator {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Metadata about a contract error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "PIPELINE-EMPTY").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when pipeline validation fails.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the contract error code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }
}

/// Error raised when a stage fails unexpectedly during a run.
#[derive(Debug, Clone, Error)]
#[error("Stage [{stage}] execution failed: {message}")]
pub struct StageExecutionError {
    /// Stage that failed.
    pub stage: String,
    /// Original error message.
    pub message: String,
}

impl StageExecutionError {
    /// Creates a new stage execution error.
    #[must_use]
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

/// Errors produced while compiling or rendering a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// A tag was opened but never closed.
    #[error("Unterminated tag '{open}' at byte {position}")]
    Unterminated {
        /// The opening delimiter.
        open: String,
        /// Byte offset of the opening delimiter.
        position: usize,
    },

    /// A tag contains nothing.
    #[error("Empty tag at byte {position}")]
    EmptyTag {
        /// Byte offset of the tag.
        position: usize,
    },

    /// A tag names a token the template does not accept.
    #[error("Unknown template token '{token}'")]
    UnknownToken {
        /// The offending token.
        token: String,
    },

    /// An inline expression could not be parsed.
    #[error("Invalid expression '{expression}': {reason}")]
    InvalidExpression {
        /// The expression source.
        expression: String,
        /// Why parsing failed.
        reason: String,
    },

    /// An expression referenced a variable that has no value.
    #[error("Unknown variable '{name}'")]
    UnknownVariable {
        /// The variable name.
        name: String,
    },

    /// The message has no text to substitute.
    #[error("Message has no text content")]
    MissingText,
}
