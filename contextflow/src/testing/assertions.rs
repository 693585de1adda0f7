//! Assertions over assembled message sequences.

use crate::context::PipelineContext;
use crate::core::{Message, Role};

/// Asserts the message roles, in order.
pub fn assert_roles(messages: &[Message], expected: &[Role]) {
    let actual: Vec<Role> = messages.iter().map(|m| m.role).collect();
    assert_eq!(actual, expected, "Unexpected role sequence");
}

/// Asserts that exactly one system message exists and it sits at index 0.
pub fn assert_single_leading_system(messages: &[Message]) {
    let positions: Vec<usize> = messages
        .iter()
        .enumerate()
        .filter(|(_, m)| m.role == Role::System)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(
        positions,
        vec![0],
        "Expected one system message at index 0, found system messages at {positions:?}"
    );
}

/// Asserts that the message at `index` contains `needle` in its text.
pub fn assert_text_contains(messages: &[Message], index: usize, needle: &str) {
    let message = messages
        .get(index)
        .unwrap_or_else(|| panic!("No message at index {index} (len {})", messages.len()));
    let text = message.content.text();
    assert!(
        text.contains(needle),
        "Expected message {index} to contain '{needle}', got: {text}"
    );
}

/// Asserts that the text of every message equals `expected`, in order.
pub fn assert_texts(messages: &[Message], expected: &[&str]) {
    let actual: Vec<String> = messages.iter().map(|m| m.content.text()).collect();
    assert_eq!(actual, expected, "Unexpected message texts");
}

/// Asserts a top-level metadata flag is true.
pub fn assert_flag(ctx: &PipelineContext, key: &str) {
    assert!(
        ctx.metadata.get_bool(key),
        "Expected metadata flag '{key}' to be true. Keys: {:?}",
        ctx.metadata.keys()
    );
}

/// Asserts a top-level metadata flag is absent or false.
pub fn assert_no_flag(ctx: &PipelineContext, key: &str) {
    assert!(
        !ctx.metadata.get_bool(key),
        "Expected metadata flag '{key}' to be unset"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assert_roles_and_texts() {
        let messages = vec![Message::system("sys"), Message::user("hi")];
        assert_roles(&messages, &[Role::System, Role::User]);
        assert_single_leading_system(&messages);
        assert_text_contains(&messages, 1, "hi");
        assert_texts(&messages, &["sys", "hi"]);
    }

    #[test]
    #[should_panic(expected = "Expected one system message at index 0")]
    fn test_assert_single_leading_system_panics() {
        let messages = vec![Message::user("hi"), Message::system("late")];
        assert_single_leading_system(&messages);
    }
}
