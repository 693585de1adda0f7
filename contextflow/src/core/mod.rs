//! Core domain model types for contextflow.
//!
//! This module contains the message records that flow through the pipeline:
//! - Message roles and content (plain text or multimodal parts)
//! - File and image attachments
//! - The cleaned record handed to the model-invocation layer

mod message;

pub use message::{
    ContentPart, FileItem, ImageItem, ImageUrl, Message, MessageContent, ModelMessage, Role,
    SYSTEM_INJECTION_KEY,
};
