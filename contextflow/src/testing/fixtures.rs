//! Test fixtures for pipeline testing.

use crate::context::{InitialState, PipelineContext};
use crate::core::Message;

/// Model id used by the fixtures.
pub const TEST_MODEL: &str = "gpt-4o";
/// Provider id used by the fixtures.
pub const TEST_PROVIDER: &str = "openai";

/// A short conversation: user, assistant, user.
#[must_use]
pub fn sample_messages() -> Vec<Message> {
    vec![
        Message::user("Hello").with_id("msg-1"),
        Message::assistant("Hi, how can I help?").with_id("msg-2"),
        Message::user("Summarise the attached report").with_id("msg-3"),
    ]
}

/// Builder for request snapshots.
#[derive(Debug, Clone)]
pub struct TestState {
    state: InitialState,
}

impl Default for TestState {
    fn default() -> Self {
        Self::new()
    }
}

impl TestState {
    /// Starts from the fixture model and provider with no messages.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: InitialState::new(TEST_MODEL, TEST_PROVIDER),
        }
    }

    /// Sets the system role.
    #[must_use]
    pub fn with_system_role(mut self, role: impl Into<String>) -> Self {
        self.state = self.state.with_system_role(role);
        self
    }

    /// Sets the enabled tools.
    #[must_use]
    pub fn with_tools(mut self, tools: &[&str]) -> Self {
        self.state = self
            .state
            .with_tools(tools.iter().map(|t| (*t).to_string()).collect());
        self
    }

    /// Sets the message history.
    #[must_use]
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.state = self.state.with_messages(messages);
        self
    }

    /// Returns the request snapshot.
    #[must_use]
    pub fn build(self) -> InitialState {
        self.state
    }

    /// Returns a fresh context over the request snapshot.
    #[must_use]
    pub fn context(self) -> PipelineContext {
        PipelineContext::new(self.state)
    }
}

/// A context over [`sample_messages`] with no system role.
#[must_use]
pub fn sample_context() -> PipelineContext {
    TestState::new().with_messages(sample_messages()).context()
}
