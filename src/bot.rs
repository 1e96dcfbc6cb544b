//! The contract between this adapter and the host bot framework.
//!
//! The host owns the input queue, command dispatch and conversational
//! context storage. The adapter only pushes normalized inputs in and sends
//! outputs back out.

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::input::UserInput;
use crate::message::SendingMessage;

/// Identifies which chat platform a bot talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BotType(&'static str);

impl BotType {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for BotType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// Shared accessors for anything the host framework treats as user input.
pub trait Input: Send + Sync {
    /// Stable key naming the user, room or group the input came from.
    fn sender_key(&self) -> &str;
    fn message(&self) -> &str;
    fn sent_at(&self) -> DateTime<Utc>;
    /// Destination to hand back in the [`Output`] answering this input.
    fn reply_to(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EnqueueError {
    #[error("input queue is full")]
    Full,
    #[error("input queue is closed")]
    Closed,
}

/// Sink the host framework supplies for normalized inputs.
///
/// Called concurrently from every in-flight webhook delivery.
pub trait Enqueue: Send + Sync {
    fn enqueue(&self, input: UserInput) -> Result<(), EnqueueError>;
}

impl Enqueue for mpsc::Sender<UserInput> {
    fn enqueue(&self, input: UserInput) -> Result<(), EnqueueError> {
        self.try_send(input).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EnqueueError::Full,
            mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }
}

impl Enqueue for mpsc::UnboundedSender<UserInput> {
    fn enqueue(&self, input: UserInput) -> Result<(), EnqueueError> {
        self.send(input).map_err(|_| EnqueueError::Closed)
    }
}

impl<F> Enqueue for F
where
    F: Fn(UserInput) -> Result<(), EnqueueError> + Send + Sync,
{
    fn enqueue(&self, input: UserInput) -> Result<(), EnqueueError> {
        self(input)
    }
}

/// Receives errors that stop an adapter from running.
pub type ErrorNotifier = Arc<dyn Fn(Error) + Send + Sync>;

/// One registered command as shown in a help listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandHelp {
    pub identifier: String,
    pub instruction: String,
}

pub type CommandHelps = Vec<CommandHelp>;

/// What the host framework asks an adapter to send.
pub enum OutputContent {
    Message(SendingMessage),
    Messages(Vec<SendingMessage>),
    CommandHelps(CommandHelps),
    /// Content built for some other platform.
    Other(Box<dyn Any + Send + Sync>),
}

impl std::fmt::Debug for OutputContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputContent::Message(m) => f.debug_tuple("Message").field(m).finish(),
            OutputContent::Messages(m) => f.debug_tuple("Messages").field(m).finish(),
            OutputContent::CommandHelps(h) => f.debug_tuple("CommandHelps").field(h).finish(),
            OutputContent::Other(_) => f.write_str("Other(..)"),
        }
    }
}

#[derive(Debug)]
pub struct Output {
    /// Reply token of the input being answered.
    pub destination: String,
    pub content: OutputContent,
}

impl Output {
    pub fn new(destination: impl Into<String>, content: OutputContent) -> Self {
        Self {
            destination: destination.into(),
            content,
        }
    }
}

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Continuation run on the sender's next input while a multi-turn command is in progress.
pub type ContextualFn =
    Arc<dyn Fn(CancellationToken, UserInput) -> BoxFuture<anyhow::Result<CommandResponse>> + Send + Sync>;

#[derive(Clone)]
pub struct UserContext {
    pub next: ContextualFn,
}

impl UserContext {
    pub fn new<F, Fut>(next: F) -> Self
    where
        F: Fn(CancellationToken, UserInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<CommandResponse>> + Send + 'static,
    {
        Self {
            next: Arc::new(move |cancel, input| Box::pin(next(cancel, input))),
        }
    }
}

/// A command's answer plus, optionally, where the conversation goes next.
pub struct CommandResponse {
    pub content: OutputContent,
    pub user_context: Option<UserContext>,
}

impl std::fmt::Debug for CommandResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandResponse")
            .field("content", &self.content)
            .field("has_user_context", &self.user_context.is_some())
            .finish()
    }
}

/// A chat platform integration driven by the host framework.
#[async_trait]
pub trait Adapter: Send + Sync {
    fn bot_type(&self) -> BotType;

    /// Receive platform events until `cancel` fires. Fatal errors go to `notify_err`.
    async fn run(&self, cancel: CancellationToken, enqueue: Arc<dyn Enqueue>, notify_err: ErrorNotifier);

    /// Deliver `output`. Failures are logged, never returned.
    async fn send_message(&self, cancel: CancellationToken, output: Output);
}
