//! Configuration types for the context engine.
//!
//! Everything serialisable lives here; collaborators that are code (the
//! capability checker, formatters, variable generators) are injected
//! through [`crate::stages::StagePorts`] instead.

use crate::errors::{ContextflowError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// System role override. Falls back to the request's system role.
    pub system_role: Option<String>,
    /// Summary of earlier conversation turns.
    pub history_summary: Option<String>,
    /// History truncation.
    pub history: HistoryConfig,
    /// Tool identifiers. Falls back to the request's tool list.
    pub tools: Option<Vec<String>>,
    /// Template applied to every user message.
    pub input_template: Option<String>,
    /// Static placeholder variables.
    pub variables: BTreeMap<String, String>,
    /// Retrieved-context injection.
    pub rag: RagConfig,
    /// Search prompt and results injection.
    pub search: SearchConfig,
    /// Inbox welcome guide.
    pub inbox: InboxConfig,
    /// Attached-file injection.
    pub files: FilesConfig,
    /// Logging setup.
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns `ContextflowError::Config` if the JSON is malformed.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| ContextflowError::Config(format!("invalid engine config: {e}")))
    }

    /// Loads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `ContextflowError::Config` if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ContextflowError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    /// Sets the system role.
    #[must_use]
    pub fn with_system_role(mut self, role: impl Into<String>) -> Self {
        self.system_role = Some(role.into());
        self
    }

    /// Sets the history summary.
    #[must_use]
    pub fn with_history_summary(mut self, summary: impl Into<String>) -> Self {
        self.history_summary = Some(summary.into());
        self
    }

    /// Sets the input template.
    #[must_use]
    pub fn with_input_template(mut self, template: impl Into<String>) -> Self {
        self.input_template = Some(template.into());
        self
    }

    /// Adds a static variable.
    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }
}

/// History truncation settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistoryConfig {
    /// Whether truncation is active.
    pub enable_history_count: bool,
    /// Number of trailing messages to keep.
    pub history_count: Option<usize>,
}

/// Retrieved-context settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagConfig {
    /// Chunks below this similarity are dropped.
    #[serde(default)]
    pub min_similarity: Option<f64>,
    /// Character budget for all chunks together.
    #[serde(default)]
    pub max_context_length: Option<usize>,
    /// Order chunks by similarity, highest first.
    #[serde(default = "default_sort_by_similarity")]
    pub sort_by_similarity: bool,
    /// Rewritten form of the user's query.
    #[serde(default)]
    pub rewrite_query: Option<String>,
}

fn default_sort_by_similarity() -> bool {
    true
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            min_similarity: None,
            max_context_length: None,
            sort_by_similarity: default_sort_by_similarity(),
            rewrite_query: None,
        }
    }
}

impl RagConfig {
    /// Sets the minimum similarity.
    #[must_use]
    pub fn with_min_similarity(mut self, min: f64) -> Self {
        self.min_similarity = Some(min);
        self
    }

    /// Sets the character budget.
    #[must_use]
    pub fn with_max_context_length(mut self, max: usize) -> Self {
        self.max_context_length = Some(max);
        self
    }

    /// Sets the rewritten query.
    #[must_use]
    pub fn with_rewrite_query(mut self, query: impl Into<String>) -> Self {
        self.rewrite_query = Some(query.into());
        self
    }
}

/// Which built-in search workflow prompt to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Web search.
    #[default]
    Web,
    /// Knowledge-base search.
    Knowledge,
    /// Both.
    Hybrid,
}

impl SearchMode {
    /// Returns the wire name of the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Knowledge => "knowledge",
            Self::Hybrid => "hybrid",
        }
    }
}

/// Search-context settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchConfig {
    /// Master switch.
    #[serde(default)]
    pub enabled: bool,
    /// Workflow prompt variant.
    #[serde(default)]
    pub mode: SearchMode,
    /// Overrides the built-in workflow prompt.
    #[serde(default)]
    pub workflow_prompt: Option<String>,
    /// Maximum number of results rendered.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// The query that produced the results.
    #[serde(default)]
    pub query: Option<String>,
}

fn default_max_results() -> usize {
    5
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: SearchMode::default(),
            workflow_prompt: None,
            max_results: default_max_results(),
            query: None,
        }
    }
}

impl SearchConfig {
    /// Creates an enabled configuration for `mode`.
    #[must_use]
    pub fn enabled(mode: SearchMode) -> Self {
        Self {
            enabled: true,
            mode,
            ..Self::default()
        }
    }

    /// Sets the query echo.
    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Sets the result cap.
    #[must_use]
    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }
}

/// Inbox welcome-guide settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InboxConfig {
    /// Current session id.
    pub session_id: Option<String>,
    /// Whether this turn is the welcome question.
    pub is_welcome_question: bool,
    /// Guide text.
    pub guide: Option<String>,
}

/// Attached-file settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesConfig {
    /// Whether files attached to messages are injected.
    #[serde(default = "default_files_enabled")]
    pub enabled: bool,
    /// Render each file's download location.
    #[serde(default)]
    pub include_file_url: bool,
}

fn default_files_enabled() -> bool {
    true
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            enabled: default_files_enabled(),
            include_file_url: false,
        }
    }
}

/// Logging setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of text.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
