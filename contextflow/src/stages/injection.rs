//! Shared message-insertion rules.
//!
//! Three insertion points exist: the leading system message (merge or
//! create), just before the first genuine user message, and the end of
//! the last user message. No helper reorders existing messages.

use crate::core::{Message, Role, SYSTEM_INJECTION_KEY};
use crate::utils::{now_millis, prefixed_id};
use serde_json::Value;

/// Separator placed between merged blocks of text.
pub const BLOCK_SEPARATOR: &str = "\n\n";

/// Id prefix of synthetic user-turn messages.
pub const SYSTEM_INJECTION_ID_PREFIX: &str = "system-injection";

/// What a system-message injection did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemInjection {
    /// Appended to the system message at this index.
    Merged(usize),
    /// Inserted a new system message at index 0.
    Created,
}

/// What a first-user injection did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserInjection {
    /// Appended to the synthetic message at this index.
    Appended(usize),
    /// Inserted a synthetic message at this index.
    Inserted(usize),
}

/// Merges `content` into the first system message, or prepends a new one.
///
/// A created message gets the id `<stage>-<uuid>`.
pub fn merge_or_create_system_message(
    messages: &mut Vec<Message>,
    content: &str,
    stage: &str,
) -> SystemInjection {
    if let Some(index) = messages.iter().position(|m| m.role == Role::System) {
        let target = &mut messages[index];
        target.content.append_text(content, BLOCK_SEPARATOR);
        if target.updated_at.is_some() {
            target.updated_at = Some(now_millis());
        }
        return SystemInjection::Merged(index);
    }

    messages.insert(0, new_system_message(content, stage));
    SystemInjection::Created
}

/// Builds a leading system message created by `stage`.
#[must_use]
pub fn new_system_message(content: &str, stage: &str) -> Message {
    let now = now_millis();
    Message::system(content)
        .with_id(prefixed_id(stage))
        .with_timestamps(now, now)
}

/// Index of the first user message that is not a synthetic injection.
#[must_use]
pub fn find_first_user_index(messages: &[Message]) -> Option<usize> {
    messages
        .iter()
        .position(|m| m.role == Role::User && !m.is_system_injection())
}

/// Index of the last user message.
#[must_use]
pub fn find_last_user_index(messages: &[Message]) -> Option<usize> {
    messages.iter().rposition(|m| m.role == Role::User)
}

/// Injects user-turn content right before the first genuine user message.
///
/// When a synthetic injection already sits in that slot, the content is
/// appended to it instead of stacking a second synthetic message. Returns
/// `None` when there is no user message to anchor on.
pub fn inject_before_first_user(messages: &mut Vec<Message>, content: &str) -> Option<UserInjection> {
    let index = find_first_user_index(messages)?;

    if index > 0 && messages[index - 1].is_system_injection() {
        let existing = &mut messages[index - 1];
        existing.content.append_text(content, BLOCK_SEPARATOR);
        existing.updated_at = Some(now_millis());
        return Some(UserInjection::Appended(index - 1));
    }

    messages.insert(index, synthetic_user_message(content));
    Some(UserInjection::Inserted(index))
}

/// Builds a user-role message marked as a system-level injection.
#[must_use]
pub fn synthetic_user_message(content: &str) -> Message {
    let now = now_millis();
    Message::user(content)
        .with_id(prefixed_id(SYSTEM_INJECTION_ID_PREFIX))
        .with_timestamps(now, now)
        .with_meta(SYSTEM_INJECTION_KEY, Value::Bool(true))
}

/// Appends `block` to the last user message. Returns the index written.
pub fn append_to_last_user(messages: &mut [Message], block: &str) -> Option<usize> {
    let index = find_last_user_index(messages)?;
    messages[index].content.append_text(block, BLOCK_SEPARATOR);
    Some(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ContentPart, MessageContent};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_merge_into_existing_system_message() {
        let mut messages = vec![Message::system("base"), Message::user("q")];
        let outcome = merge_or_create_system_message(&mut messages, "extra", "toolSystemRole");

        assert_eq!(outcome, SystemInjection::Merged(0));
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content.as_text(), Some("base\n\nextra"));
    }

    #[test]
    fn test_merge_targets_first_system_message_anywhere() {
        let mut messages = vec![
            Message::user("q"),
            Message::system("one"),
            Message::system("two"),
        ];
        let outcome = merge_or_create_system_message(&mut messages, "x", "s");

        assert_eq!(outcome, SystemInjection::Merged(1));
        assert_eq!(messages[1].content.as_text(), Some("one\n\nx"));
        assert_eq!(messages[2].content.as_text(), Some("two"));
    }

    #[test]
    fn test_create_system_message_when_absent() {
        let mut messages = vec![Message::user("q")];
        let outcome = merge_or_create_system_message(&mut messages, "extra", "historySummary");

        assert_eq!(outcome, SystemInjection::Created);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].id.as_deref().unwrap().starts_with("historySummary-"));
    }

    #[test]
    fn test_inject_before_first_user() {
        let mut messages = vec![
            Message::system("s"),
            Message::assistant("hello"),
            Message::user("q1"),
            Message::user("q2"),
        ];
        let outcome = inject_before_first_user(&mut messages, "files");

        assert_eq!(outcome, Some(UserInjection::Inserted(2)));
        assert_eq!(messages.len(), 5);
        assert!(messages[2].is_system_injection());
        assert!(messages[2].id.as_deref().unwrap().starts_with("system-injection-"));
        assert!(messages[2].created_at.is_some());
        assert_eq!(messages[3].content.as_text(), Some("q1"));
    }

    #[test]
    fn test_inject_appends_to_existing_injection() {
        let mut messages = vec![Message::user("q")];
        inject_before_first_user(&mut messages, "knowledge");
        let outcome = inject_before_first_user(&mut messages, "files");

        assert_eq!(outcome, Some(UserInjection::Appended(0)));
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content.as_text(), Some("knowledge\n\nfiles"));
    }

    #[test]
    fn test_inject_without_user_is_noop() {
        let mut messages = vec![Message::system("s"), Message::assistant("a")];
        assert_eq!(inject_before_first_user(&mut messages, "x"), None);
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn test_inject_into_multimodal_injection_uses_last_text_part() {
        let mut messages = vec![
            Message::user(vec![ContentPart::image("u"), ContentPart::text("a")])
                .with_meta(SYSTEM_INJECTION_KEY, Value::Bool(true)),
            Message::user("q"),
        ];
        inject_before_first_user(&mut messages, "b");
        assert_eq!(
            messages[0].content,
            MessageContent::Parts(vec![ContentPart::image("u"), ContentPart::text("a\n\nb")])
        );
    }

    #[test]
    fn test_append_to_last_user() {
        let mut messages = vec![
            Message::user("first"),
            Message::assistant("a"),
            Message::user("last"),
            Message::assistant("b"),
        ];
        assert_eq!(append_to_last_user(&mut messages, "ctx"), Some(2));
        assert_eq!(messages[2].content.as_text(), Some("last\n\nctx"));
        assert_eq!(messages[0].content.as_text(), Some("first"));
    }
}
