use chrono::{DateTime, Utc};

use crate::bot::Input;
use crate::error::{Error, Result};
use crate::webhook::{EventSource, PostbackParams, SourceType};

/// Build the key that names the sender of an event: `user|<id>`, `room|<id>` or `group|<id>`.
pub fn source_to_sender_key(source: &EventSource) -> Result<String> {
    let id = match source.source_type {
        SourceType::User => &source.user_id,
        SourceType::Room => &source.room_id,
        SourceType::Group => &source.group_id,
        SourceType::Other(_) => return Err(Error::UnrecognizedEventSource),
    };
    Ok(format!(
        "{}|{}",
        source.source_type,
        id.as_deref().unwrap_or_default()
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Image,
    Video,
    Audio,
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaType::Image => write!(f, "image"),
            MediaType::Video => write!(f, "video"),
            MediaType::Audio => write!(f, "audio"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub title: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputKind {
    Text {
        text: String,
    },
    File {
        media: MediaType,
    },
    Location(Location),
    Sticker {
        package_id: String,
        sticker_id: String,
    },
    Postback {
        data: String,
        /// Present only when the user picked a value with a datetime picker.
        params: Option<PostbackParams>,
    },
}

/// One inbound user action, normalized from a webhook event.
#[derive(Debug, Clone, PartialEq)]
pub struct LineInput {
    /// Platform message id. Postbacks have none.
    pub id: Option<String>,
    pub source_type: SourceType,
    pub sender_key: String,
    pub reply_token: String,
    pub timestamp: DateTime<Utc>,
    pub kind: InputKind,
}

impl LineInput {
    pub fn source_type(&self) -> &SourceType {
        &self.source_type
    }

    pub fn is_source_user(&self) -> bool {
        self.source_type == SourceType::User
    }

    pub fn is_source_room(&self) -> bool {
        self.source_type == SourceType::Room
    }

    pub fn is_source_group(&self) -> bool {
        self.source_type == SourceType::Group
    }
}

impl Input for LineInput {
    fn sender_key(&self) -> &str {
        &self.sender_key
    }

    /// Text for text messages, data for postbacks, title for locations, empty otherwise.
    fn message(&self) -> &str {
        match &self.kind {
            InputKind::Text { text } => text,
            InputKind::Postback { data, .. } => data,
            InputKind::Location(location) => &location.title,
            InputKind::File { .. } | InputKind::Sticker { .. } => "",
        }
    }

    fn sent_at(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn reply_to(&self) -> &str {
        &self.reply_token
    }
}

/// What gets enqueued to the host framework.
#[derive(Debug, Clone, PartialEq)]
pub enum UserInput {
    Plain(LineInput),
    /// The sender asked for the command listing.
    Help(LineInput),
    /// The sender wants out of the current conversational context.
    Abort(LineInput),
}

impl UserInput {
    pub fn inner(&self) -> &LineInput {
        match self {
            UserInput::Plain(input) | UserInput::Help(input) | UserInput::Abort(input) => input,
        }
    }

    pub fn into_inner(self) -> LineInput {
        match self {
            UserInput::Plain(input) | UserInput::Help(input) | UserInput::Abort(input) => input,
        }
    }

    pub fn is_help(&self) -> bool {
        matches!(self, UserInput::Help(_))
    }

    pub fn is_abort(&self) -> bool {
        matches!(self, UserInput::Abort(_))
    }

    pub fn source_type(&self) -> &SourceType {
        self.inner().source_type()
    }

    pub fn is_source_user(&self) -> bool {
        self.inner().is_source_user()
    }

    pub fn is_source_room(&self) -> bool {
        self.inner().is_source_room()
    }

    pub fn is_source_group(&self) -> bool {
        self.inner().is_source_group()
    }
}

impl Input for UserInput {
    fn sender_key(&self) -> &str {
        self.inner().sender_key()
    }

    fn message(&self) -> &str {
        self.inner().message()
    }

    fn sent_at(&self) -> DateTime<Utc> {
        self.inner().sent_at()
    }

    fn reply_to(&self) -> &str {
        self.inner().reply_to()
    }
}
