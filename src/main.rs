use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use line_adapter::bot::{Adapter, CommandHelp, Input, Output, OutputContent};
use line_adapter::input::UserInput;
use line_adapter::message::{new_string_response, SendingMessage};
use line_adapter::{Config, LineAdapter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,line_adapter=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Endpoint: {}", config.endpoint);
    info!("  Port: {}", config.port);
    info!("  TLS: {}", config.tls.is_some());

    let help_command = config.help_command.clone();
    let adapter = Arc::new(LineAdapter::new(config).context("Failed to build LINE adapter")?);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutting down...");
                cancel.cancel();
            }
        });
    }

    info!("Bot is starting...");
    serve(adapter, help_command, cancel).await
}

/// Run the adapter and answer inputs until `cancel` fires or the listener fails.
///
/// A listener failure is returned so the process exits non-zero.
async fn serve(adapter: Arc<LineAdapter>, help_command: String, cancel: CancellationToken) -> Result<()> {
    let (tx, mut rx) = mpsc::channel::<UserInput>(100);
    let fatal: Arc<Mutex<Option<line_adapter::Error>>> = Arc::new(Mutex::new(None));

    let running = {
        let adapter = Arc::clone(&adapter);
        let cancel = cancel.clone();
        let stop = cancel.clone();
        let fatal = Arc::clone(&fatal);
        tokio::spawn(async move {
            adapter
                .run(
                    cancel,
                    Arc::new(tx),
                    Arc::new(move |e: line_adapter::Error| {
                        error!("Adapter stopped with error: {}", e);
                        if let Ok(mut slot) = fatal.lock() {
                            slot.get_or_insert(e);
                        }
                        stop.cancel();
                    }),
                )
                .await;
        })
    };

    loop {
        let input = tokio::select! {
            _ = cancel.cancelled() => break,
            input = rx.recv() => match input {
                Some(input) => input,
                None => break,
            },
        };

        let adapter = Arc::clone(&adapter);
        let cancel = cancel.clone();
        let help_command = help_command.clone();
        tokio::spawn(async move {
            let content = respond(&input, &help_command);
            adapter
                .send_message(cancel, Output::new(input.reply_to(), content))
                .await;
        });
    }

    if let Err(e) = running.await {
        warn!("Adapter task ended abnormally: {}", e);
    }

    let failure = fatal.lock().ok().and_then(|mut slot| slot.take());
    match failure {
        Some(e) => Err(anyhow!(e).context("LINE adapter stopped")),
        None => Ok(()),
    }
}

/// Echo host: repeats text back, lists commands on help, acknowledges abort.
fn respond(input: &UserInput, help_command: &str) -> OutputContent {
    match input {
        UserInput::Help(_) => OutputContent::CommandHelps(vec![
            CommandHelp {
                identifier: "echo".to_string(),
                instruction: "Send any text and it is sent back to you.".to_string(),
            },
            CommandHelp {
                identifier: "help".to_string(),
                instruction: format!("Send \"{}\" to see this list.", help_command),
            },
        ]),
        UserInput::Abort(_) => new_string_response("Aborted.").content,
        UserInput::Plain(inner) if inner.message().is_empty() => {
            OutputContent::Message(SendingMessage::sticker("446", "1988"))
        }
        UserInput::Plain(inner) => new_string_response(inner.message()).content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(port: u16) -> Config {
        Config {
            channel_token: "token".to_string(),
            channel_secret: "secret".to_string(),
            port,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_serve_fails_when_listener_fails() {
        let occupied = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
        let port = occupied.local_addr().unwrap().port();
        let adapter = Arc::new(LineAdapter::new(config(port)).unwrap());

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            serve(adapter, ".help".to_string(), CancellationToken::new()),
        )
        .await
        .unwrap();

        let err = result.unwrap_err();
        assert!(format!("{:#}", err).contains("listener error"));
    }

    #[tokio::test]
    async fn test_serve_returns_ok_on_shutdown() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let adapter = Arc::new(LineAdapter::new(config(port)).unwrap());
        let cancel = CancellationToken::new();

        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            stopper.cancel();
        });

        let result = tokio::time::timeout(Duration::from_secs(5), serve(adapter, ".help".to_string(), cancel))
            .await
            .unwrap();
        assert!(result.is_ok());
    }

    #[test]
    fn test_respond_to_help_and_abort() {
        use line_adapter::input::{InputKind, LineInput};
        use line_adapter::webhook::SourceType;

        let inner = LineInput {
            id: Some("1".to_string()),
            source_type: SourceType::User,
            sender_key: "user|U1".to_string(),
            reply_token: "rt".to_string(),
            timestamp: chrono::Utc::now(),
            kind: InputKind::Text {
                text: ".help".to_string(),
            },
        };

        match respond(&UserInput::Help(inner.clone()), ".help") {
            OutputContent::CommandHelps(helps) => assert_eq!(helps.len(), 2),
            other => panic!("unexpected content: {:?}", other),
        }
        assert!(matches!(
            respond(&UserInput::Abort(inner), ".help"),
            OutputContent::Message(SendingMessage::Text { ref text }) if text == "Aborted."
        ));
    }
}
