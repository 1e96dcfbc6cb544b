//! Sends host framework outputs back through the reply endpoint.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::bot::{Output, OutputContent};
use crate::client::LineClient;
use crate::error::{Error, Result};
use crate::message::SendingMessage;

/// Deadline for a single reply call, measured from dispatch start.
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Flatten output content into the messages to send.
///
/// Help listings become one text message per command. Returns `None` for
/// content this adapter can not send.
pub fn resolve_messages(content: OutputContent) -> Option<Vec<SendingMessage>> {
    match content {
        OutputContent::Message(message) => Some(vec![message]),
        OutputContent::Messages(messages) => Some(messages),
        OutputContent::CommandHelps(helps) => Some(
            helps
                .into_iter()
                .map(|help| SendingMessage::text(help.instruction))
                .collect(),
        ),
        OutputContent::Other(_) => None,
    }
}

/// Resolve and send `output`, logging instead of returning any failure.
pub async fn dispatch(client: &LineClient, cancel: &CancellationToken, output: Output) {
    let Output {
        destination,
        content,
    } = output;

    let messages = match resolve_messages(content) {
        Some(messages) if !messages.is_empty() => messages,
        Some(_) => {
            warn!("Nothing to send for reply token {}", destination);
            return;
        }
        None => {
            warn!("Unexpected output content for reply token {}", destination);
            return;
        }
    };

    if let Err(e) = reply(client, cancel, &destination, &messages, REPLY_TIMEOUT).await {
        error!("Error on message reply: {}", e);
    }
}

/// Send one reply, giving up when `deadline` passes or `cancel` fires.
pub async fn reply(
    client: &LineClient,
    cancel: &CancellationToken,
    reply_token: &str,
    messages: &[SendingMessage],
    deadline: Duration,
) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = tokio::time::timeout(deadline, client.reply_message(reply_token, messages)) => {
            match result {
                Ok(sent) => {
                    sent?;
                    info!("Replied with {} message(s)", messages.len());
                    Ok(())
                }
                Err(_) => Err(Error::Timeout(deadline)),
            }
        }
    }
}
