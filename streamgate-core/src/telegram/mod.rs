//! Telegram storage channel integration
//!
//! Files sent to the bot are forwarded into a private storage channel; the
//! forwarded copy's file id is the backend locator. Reads go through the
//! Bot API `getFile` call followed by a streamed download.

pub mod backend;
pub mod client;
pub mod poller;
pub mod types;

pub use backend::TelegramBackend;
pub use client::{BotApiClient, BotApiError};
pub use poller::UpdatePoller;
pub use types::{InboundMedia, MediaKind, Message, TgFile, Update};
