//! Command handling module.
//!
//! Processes user commands sent to the bot via Telegram messages.
//! Commands control the pending batch: status, immediate archiving,
//! or discarding.

mod handler;
mod types;

pub use handler::CommandHandler;
pub use types::{BotCommand, CommandResult};
