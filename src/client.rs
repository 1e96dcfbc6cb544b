use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ClientOptions;
use crate::error::{Error, Result};
use crate::message::SendingMessage;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: &'a [SendingMessage],
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: String,
}

/// Messaging API client used to answer webhook events.
#[derive(Debug, Clone)]
pub struct LineClient {
    client: reqwest::Client,
    endpoint: String,
    channel_token: String,
}

impl LineClient {
    pub fn new(channel_secret: &str, channel_token: &str, options: &ClientOptions) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(user_agent) = &options.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let client = builder.build().map_err(Error::HttpClient)?;
        Self::with_http_client(channel_secret, channel_token, options, client)
    }

    /// Build a client on top of a caller-configured `reqwest::Client`.
    pub fn with_http_client(
        channel_secret: &str,
        channel_token: &str,
        options: &ClientOptions,
        client: reqwest::Client,
    ) -> Result<Self> {
        if channel_secret.is_empty() {
            return Err(Error::MissingChannelSecret);
        }
        if channel_token.is_empty() {
            return Err(Error::MissingChannelToken);
        }

        let url = reqwest::Url::parse(&options.endpoint).map_err(|e| Error::InvalidEndpoint {
            endpoint: options.endpoint.clone(),
            reason: e.to_string(),
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(Error::InvalidEndpoint {
                endpoint: options.endpoint.clone(),
                reason: format!("unsupported scheme {}", url.scheme()),
            });
        }

        Ok(Self {
            client,
            endpoint: options.endpoint.trim_end_matches('/').to_string(),
            channel_token: channel_token.to_string(),
        })
    }

    pub async fn reply_message(&self, reply_token: &str, messages: &[SendingMessage]) -> Result<()> {
        let url = format!("{}/v2/bot/message/reply", self.endpoint);
        let request = ReplyRequest {
            reply_token,
            messages,
        };

        debug!("Sending {} message(s) to {}", messages.len(), url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.channel_token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.message)
                .ok()
                .filter(|m| !m.is_empty())
                .unwrap_or(body);
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}
