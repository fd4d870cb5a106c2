//! Telegram integration module.
//!
//! Provides the Bot API gateway used for media downloads and archive
//! uploads, send-rate limiting, and the update dispatch schema.

mod dispatch;
mod gateway;
mod rate_limiter;

pub use dispatch::{MediaPayload, schema};
pub use gateway::{MediaGateway, RemoteFile, TelegramError};
pub use rate_limiter::RateLimiter;
