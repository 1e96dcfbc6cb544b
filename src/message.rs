//! Outbound message payloads and helpers for building command responses.

use serde::Serialize;
use serde_json::Value;

use crate::bot::{CommandResponse, OutputContent, UserContext};

/// A message the Messaging API accepts in a reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum SendingMessage {
    Text {
        text: String,
    },
    Sticker {
        package_id: String,
        sticker_id: String,
    },
    Image {
        original_content_url: String,
        preview_image_url: String,
    },
    Video {
        original_content_url: String,
        preview_image_url: String,
    },
    Audio {
        original_content_url: String,
        #[serde(rename = "duration")]
        duration_ms: u64,
    },
    Location {
        title: String,
        address: String,
        latitude: f64,
        longitude: f64,
    },
    /// Template, flex, imagemap or any other payload, sent verbatim.
    #[serde(untagged)]
    Raw(Value),
}

impl SendingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        SendingMessage::Text { text: text.into() }
    }

    pub fn sticker(package_id: impl Into<String>, sticker_id: impl Into<String>) -> Self {
        SendingMessage::Sticker {
            package_id: package_id.into(),
            sticker_id: sticker_id.into(),
        }
    }

    pub fn image(original_content_url: impl Into<String>, preview_image_url: impl Into<String>) -> Self {
        SendingMessage::Image {
            original_content_url: original_content_url.into(),
            preview_image_url: preview_image_url.into(),
        }
    }

    pub fn raw(payload: Value) -> Self {
        SendingMessage::Raw(payload)
    }
}

/// Respond with a single text message.
pub fn new_string_response(content: impl Into<String>) -> CommandResponse {
    new_customized_response(SendingMessage::text(content))
}

/// Respond with a single text message and keep the sender in `next`.
pub fn new_string_response_with_next(content: impl Into<String>, next: UserContext) -> CommandResponse {
    new_customized_response_with_next(SendingMessage::text(content), next)
}

pub fn new_customized_response(message: SendingMessage) -> CommandResponse {
    CommandResponse {
        content: OutputContent::Message(message),
        user_context: None,
    }
}

pub fn new_customized_response_with_next(message: SendingMessage, next: UserContext) -> CommandResponse {
    CommandResponse {
        content: OutputContent::Message(message),
        user_context: Some(next),
    }
}

pub fn new_multiple_customized_responses(messages: Vec<SendingMessage>) -> CommandResponse {
    CommandResponse {
        content: OutputContent::Messages(messages),
        user_context: None,
    }
}

pub fn new_multiple_customized_responses_with_next(
    messages: Vec<SendingMessage>,
    next: UserContext,
) -> CommandResponse {
    CommandResponse {
        content: OutputContent::Messages(messages),
        user_context: Some(next),
    }
}
