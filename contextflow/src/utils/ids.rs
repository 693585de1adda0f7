//! Identifier helpers for pipeline-created messages.

use uuid::Uuid;

/// Generates a new UUID v4.
#[must_use]
pub fn generate_uuid() -> Uuid {
    Uuid::new_v4()
}

/// Builds an id of the form `<prefix>-<uuid>`.
///
/// Used for messages the pipeline inserts so they can be told apart
/// from messages that came with the request.
#[must_use]
pub fn prefixed_id(prefix: &str) -> String {
    format!("{prefix}-{}", generate_uuid())
}
