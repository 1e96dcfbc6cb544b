//! LINE Messaging API adapter for a host bot framework.
//!
//! Webhook events are verified, normalized into [`input::UserInput`] values
//! and pushed onto the host's queue. Outputs the host routes back are sent
//! through the reply endpoint.

pub mod adapter;
pub mod bot;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod input;
pub mod message;
pub mod normalizer;
pub mod server;
pub mod webhook;

pub use adapter::{LineAdapter, LineAdapterBuilder, LINE};
pub use config::Config;
pub use error::{Error, Result};
