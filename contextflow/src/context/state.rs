//! The request as originally submitted.

use crate::core::Message;
use serde::{Deserialize, Serialize};

/// Immutable snapshot of a chat request.
///
/// Stages consult it for decisions but never modify it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialState {
    /// Model id.
    pub model: String,
    /// Provider id.
    pub provider: String,
    /// System role configured for the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_role: Option<String>,
    /// Tool identifiers enabled for the request.
    #[serde(default)]
    pub tools: Vec<String>,
    /// Raw message history.
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl InitialState {
    /// Creates a new initial state.
    #[must_use]
    pub fn new(model: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            provider: provider.into(),
            ..Self::default()
        }
    }

    /// Sets the system role.
    #[must_use]
    pub fn with_system_role(mut self, system_role: impl Into<String>) -> Self {
        self.system_role = Some(system_role.into());
        self
    }

    /// Sets the tool list.
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools = tools;
        self
    }

    /// Sets the message history.
    #[must_use]
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    /// Returns true if a non-blank system role was configured.
    #[must_use]
    pub fn has_system_role(&self) -> bool {
        self.system_role
            .as_deref()
            .is_some_and(|role| !role.trim().is_empty())
    }
}
