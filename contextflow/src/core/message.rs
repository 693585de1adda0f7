//! Chat message records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Key in [`Message::meta`] marking a pipeline-inserted user-turn message.
pub const SYSTEM_INJECTION_KEY: &str = "systemInjection";

/// The author role of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// End-user input.
    User,
    /// Model output.
    Assistant,
    /// Tool call result.
    Tool,
    /// Legacy function call result.
    Function,
}

impl Role {
    /// Returns the wire name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
            Self::Function => "function",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Image reference inside a multimodal part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl {
    /// Image location (http(s) or data URL).
    pub url: String,
    /// Optional detail hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// One part of a multimodal message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// A text segment.
    Text {
        /// The text.
        text: String,
    },
    /// An image.
    ImageUrl {
        /// The image reference.
        image_url: ImageUrl,
    },
}

impl ContentPart {
    /// Creates a text part.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Creates an image part.
    #[must_use]
    pub fn image(url: impl Into<String>) -> Self {
        Self::ImageUrl {
            image_url: ImageUrl {
                url: url.into(),
                detail: None,
            },
        }
    }
}

/// Message content: plain text or an ordered list of parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text.
    Text(String),
    /// Multimodal parts.
    Parts(Vec<ContentPart>),
}

impl Default for MessageContent {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl MessageContent {
    /// Returns the text when the content is plain text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Parts(_) => None,
        }
    }

    /// Returns all text segments joined by newlines.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(_) => self.texts().join("\n"),
        }
    }

    /// Returns true if there is at least one text segment.
    #[must_use]
    pub fn has_text(&self) -> bool {
        match self {
            Self::Text(_) => true,
            Self::Parts(parts) => parts.iter().any(|p| matches!(p, ContentPart::Text { .. })),
        }
    }

    /// Returns true if every text segment is empty or whitespace.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.text().trim().is_empty()
    }

    /// Every text segment, in order.
    #[must_use]
    pub fn texts(&self) -> Vec<&str> {
        match self {
            Self::Text(text) => vec![text.as_str()],
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect(),
        }
    }

    /// Mutable references to every text segment, in order.
    pub fn texts_mut(&mut self) -> Vec<&mut String> {
        match self {
            Self::Text(text) => vec![text],
            Self::Parts(parts) => parts
                .iter_mut()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect(),
        }
    }

    /// Mutable reference to the first text segment.
    pub fn first_text_mut(&mut self) -> Option<&mut String> {
        self.texts_mut().into_iter().next()
    }

    /// Appends `text` after `separator`.
    ///
    /// Multimodal content appends to its last text part, or gains a new
    /// text part when it has none. Appending to empty text skips the
    /// separator.
    pub fn append_text(&mut self, text: &str, separator: &str) {
        match self {
            Self::Text(existing) => push_with_separator(existing, text, separator),
            Self::Parts(parts) => {
                let last_text = parts.iter_mut().rev().find_map(|part| match part {
                    ContentPart::Text { text } => Some(text),
                    ContentPart::ImageUrl { .. } => None,
                });
                match last_text {
                    Some(existing) => push_with_separator(existing, text, separator),
                    None => parts.push(ContentPart::text(text)),
                }
            }
        }
    }
}

fn push_with_separator(existing: &mut String, text: &str, separator: &str) {
    if !existing.is_empty() {
        existing.push_str(separator);
    }
    existing.push_str(text);
}

impl From<&str> for MessageContent {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<ContentPart>> for MessageContent {
    fn from(value: Vec<ContentPart>) -> Self {
        Self::Parts(value)
    }
}

/// A file attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FileItem {
    /// File id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Download location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// MIME type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    /// Size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Extracted text content, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl FileItem {
    /// Creates a file item with extracted content.
    #[must_use]
    pub fn with_content(
        id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            content: Some(content.into()),
            ..Self::default()
        }
    }
}

/// An image attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ImageItem {
    /// Image id.
    pub id: String,
    /// Image location.
    pub url: String,
    /// Alt text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

/// A chat message as it flows through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Optional message id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Author role.
    pub role: Role,
    /// Message content.
    pub content: MessageContent,
    /// Creation time in epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    /// Update time in epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    /// Free-form message metadata.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub meta: serde_json::Map<String, serde_json::Value>,
    /// Attached files.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_list: Vec<FileItem>,
    /// Attached images.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_list: Vec<ImageItem>,
}

impl Message {
    /// Creates a new message.
    #[must_use]
    pub fn new(role: Role, content: impl Into<MessageContent>) -> Self {
        Self {
            id: None,
            role,
            content: content.into(),
            created_at: None,
            updated_at: None,
            meta: serde_json::Map::new(),
            file_list: Vec::new(),
            image_list: Vec::new(),
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<MessageContent>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<MessageContent>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<MessageContent>) -> Self {
        Self::new(Role::System, content)
    }

    /// Sets the id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets both timestamps.
    #[must_use]
    pub fn with_timestamps(mut self, created_at: i64, updated_at: i64) -> Self {
        self.created_at = Some(created_at);
        self.updated_at = Some(updated_at);
        self
    }

    /// Adds a meta entry.
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    /// Sets the attached files.
    #[must_use]
    pub fn with_files(mut self, files: Vec<FileItem>) -> Self {
        self.file_list = files;
        self
    }

    /// Sets the attached images.
    #[must_use]
    pub fn with_images(mut self, images: Vec<ImageItem>) -> Self {
        self.image_list = images;
        self
    }

    /// Returns true for user-turn messages inserted by the pipeline.
    #[must_use]
    pub fn is_system_injection(&self) -> bool {
        self.meta
            .get(SYSTEM_INJECTION_KEY)
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }

    /// Returns the role/content pair sent to the model.
    #[must_use]
    pub fn to_model_message(&self) -> ModelMessage {
        ModelMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// A message stripped down to what the model-invocation layer consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMessage {
    /// Author role.
    pub role: Role,
    /// Message content.
    pub content: MessageContent,
}
