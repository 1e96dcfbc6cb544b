//! Webhook payload models and request signature verification.
//!
//! The platform signs every callback body with HMAC-SHA256 keyed by the
//! channel secret and sends the base64 digest in `X-Line-Signature`.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::warn;

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-line-signature";

/// Body of a webhook callback.
///
/// Events are kept raw until [`CallbackRequest::into_events`] so a single
/// malformed event does not reject the whole delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackRequest {
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub events: Vec<serde_json::Value>,
}

impl CallbackRequest {
    /// Decode every event, logging and dropping the ones that do not parse.
    pub fn into_events(self) -> Vec<Event> {
        self.events
            .into_iter()
            .enumerate()
            .filter_map(|(index, raw)| match serde_json::from_value::<Event>(raw) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!("Skipping malformed webhook event #{}: {}", index, e);
                    None
                }
            })
            .collect()
    }
}

/// A single webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    #[serde(rename = "replyToken", default)]
    pub reply_token: String,
    #[serde(default)]
    pub source: Option<EventSource>,
    #[serde(with = "chrono::serde::ts_milliseconds", default)]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "webhookEventId", default)]
    pub webhook_event_id: Option<String>,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EventKind {
    Message { message: Message },
    Postback { postback: Postback },
    Follow,
    Unfollow,
    Join,
    Leave,
    MemberJoined,
    MemberLeft,
    Beacon { beacon: Beacon },
    AccountLink,
    Things,
    Unsend { unsend: Unsend },
    VideoPlayComplete,
    #[serde(other)]
    Unknown,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Message { .. } => "message",
            EventKind::Postback { .. } => "postback",
            EventKind::Follow => "follow",
            EventKind::Unfollow => "unfollow",
            EventKind::Join => "join",
            EventKind::Leave => "leave",
            EventKind::MemberJoined => "memberJoined",
            EventKind::MemberLeft => "memberLeft",
            EventKind::Beacon { .. } => "beacon",
            EventKind::AccountLink => "accountLink",
            EventKind::Things => "things",
            EventKind::Unsend { .. } => "unsend",
            EventKind::VideoPlayComplete => "videoPlayComplete",
            EventKind::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    Text {
        #[serde(default)]
        id: String,
        #[serde(default)]
        text: String,
    },
    Image {
        #[serde(default)]
        id: String,
    },
    Video {
        #[serde(default)]
        id: String,
    },
    Audio {
        #[serde(default)]
        id: String,
    },
    File {
        #[serde(default)]
        id: String,
        #[serde(rename = "fileName", default)]
        file_name: String,
        #[serde(rename = "fileSize", default)]
        file_size: u64,
    },
    Location {
        #[serde(default)]
        id: String,
        #[serde(default)]
        title: String,
        #[serde(default)]
        address: String,
        #[serde(default)]
        latitude: f64,
        #[serde(default)]
        longitude: f64,
    },
    Sticker {
        #[serde(default)]
        id: String,
        #[serde(rename = "packageId", default)]
        package_id: String,
        #[serde(rename = "stickerId", default)]
        sticker_id: String,
    },
    #[serde(other)]
    Unknown,
}

impl Message {
    pub fn type_name(&self) -> &'static str {
        match self {
            Message::Text { .. } => "text",
            Message::Image { .. } => "image",
            Message::Video { .. } => "video",
            Message::Audio { .. } => "audio",
            Message::File { .. } => "file",
            Message::Location { .. } => "location",
            Message::Sticker { .. } => "sticker",
            Message::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postback {
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub params: Option<PostbackParams>,
}

/// Values picked through a datetime picker action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PostbackParams {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub datetime: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Beacon {
    #[serde(default)]
    pub hwid: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub dm: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Unsend {
    #[serde(rename = "messageId", default)]
    pub message_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventSource {
    #[serde(rename = "type")]
    pub source_type: SourceType,
    #[serde(rename = "userId", default)]
    pub user_id: Option<String>,
    #[serde(rename = "groupId", default)]
    pub group_id: Option<String>,
    #[serde(rename = "roomId", default)]
    pub room_id: Option<String>,
}

/// Where an event came from. Types the platform may add later land in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum SourceType {
    User,
    Room,
    Group,
    Other(String),
}

impl From<String> for SourceType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "user" => SourceType::User,
            "room" => SourceType::Room,
            "group" => SourceType::Group,
            _ => SourceType::Other(value),
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::User => write!(f, "user"),
            SourceType::Room => write!(f, "room"),
            SourceType::Group => write!(f, "group"),
            SourceType::Other(other) => write!(f, "{}", other),
        }
    }
}

/// Sign a payload with HMAC-SHA256 and return the base64-encoded digest.
pub fn sign_payload(secret: &str, payload: &[u8]) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(payload);
    STANDARD.encode(mac.finalize().into_bytes())
}

/// Verify a base64 HMAC-SHA256 signature against a payload in constant time.
pub fn verify_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    let Ok(expected) = STANDARD.decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

/// Check the signature and parse the body into its event batch.
pub fn parse_request(secret: &str, payload: &[u8], signature: Option<&str>) -> Result<Vec<Event>> {
    match signature {
        Some(signature) if verify_signature(secret, payload, signature) => {}
        _ => return Err(Error::InvalidSignature),
    }

    let request: CallbackRequest = serde_json::from_slice(payload)?;
    Ok(request.into_events())
}
