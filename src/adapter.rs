use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::bot::{Adapter, BotType, Enqueue, ErrorNotifier, Output};
use crate::client::LineClient;
use crate::config::Config;
use crate::dispatcher;
use crate::error::Result;
use crate::normalizer::{DefaultEventHandler, EventHandler};
use crate::server::{self, ListenerState};

/// Bot type tag for LINE.
pub const LINE: BotType = BotType::new("line");

/// Receives webhook calls from LINE and replies through the Messaging API.
pub struct LineAdapter {
    client: Arc<LineClient>,
    event_handler: Arc<dyn EventHandler>,
    config: Arc<Config>,
}

pub struct LineAdapterBuilder {
    config: Config,
    client: Option<LineClient>,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl LineAdapterBuilder {
    /// Use an already configured client instead of building one from the config.
    pub fn with_client(mut self, client: LineClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Replace the default event handling with `handler`.
    pub fn with_event_handler(mut self, handler: impl EventHandler + 'static) -> Self {
        self.event_handler = Some(Arc::new(handler));
        self
    }

    pub fn build(self) -> Result<LineAdapter> {
        server::validate_callback_path(&self.config.endpoint)?;

        let client = match self.client {
            Some(client) => client,
            None => LineClient::new(
                &self.config.channel_secret,
                &self.config.channel_token,
                &self.config.client,
            )?,
        };

        Ok(LineAdapter {
            client: Arc::new(client),
            event_handler: self
                .event_handler
                .unwrap_or_else(|| Arc::new(DefaultEventHandler::new())),
            config: Arc::new(self.config),
        })
    }
}

impl LineAdapter {
    pub fn builder(config: Config) -> LineAdapterBuilder {
        LineAdapterBuilder {
            config,
            client: None,
            event_handler: None,
        }
    }

    /// Build an adapter with the default client and event handler.
    pub fn new(config: Config) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[async_trait]
impl Adapter for LineAdapter {
    fn bot_type(&self) -> BotType {
        LINE
    }

    async fn run(&self, cancel: CancellationToken, enqueue: Arc<dyn Enqueue>, notify_err: ErrorNotifier) {
        let state = ListenerState {
            config: Arc::clone(&self.config),
            handler: Arc::clone(&self.event_handler),
            enqueue,
            cancel,
        };

        match server::listen(state).await {
            Ok(()) => info!("LINE adapter stopped"),
            Err(e) => {
                error!("LINE adapter failed: {}", e);
                notify_err(e);
            }
        }
    }

    async fn send_message(&self, cancel: CancellationToken, output: Output) {
        dispatcher::dispatch(&self.client, &cancel, output).await;
    }
}
