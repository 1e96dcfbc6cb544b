use thiserror::Error;

/// Errors produced by the LINE adapter.
#[derive(Debug, Error)]
pub enum Error {
    #[error("missing channel secret")]
    MissingChannelSecret,

    #[error("missing channel access token")]
    MissingChannelToken,

    #[error("invalid API endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("invalid callback path {path:?}: {reason}")]
    InvalidCallbackPath { path: String, reason: &'static str },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("unrecognized event source type is given")]
    UnrecognizedEventSource,

    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    #[error("{0} event can not be treated as user input")]
    NotUserInput(String),

    #[error("failed to enqueue input: {0}")]
    Enqueue(#[from] crate::bot::EnqueueError),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("failed to parse webhook body: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LINE API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("request to LINE API failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("reply timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("reply cancelled")]
    Cancelled,

    #[error("failed to load TLS material: {0}")]
    Tls(#[source] std::io::Error),

    #[error("listener error: {0}")]
    Listen(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
