//! Command handler implementation.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::types::{BotCommand, CommandResult};
use crate::session::SessionRegistry;

/// Handles bot commands against the session registry.
pub struct CommandHandler {
    /// Shared session registry.
    registry: Arc<SessionRegistry>,

    /// Configured quiet period, for status reporting.
    archive_delay: Duration,
}

impl CommandHandler {
    /// Creates a new command handler.
    #[must_use]
    pub fn new(registry: Arc<SessionRegistry>, archive_delay: Duration) -> Self {
        Self {
            registry,
            archive_delay,
        }
    }

    /// Executes a parsed command for a user.
    pub async fn execute(&self, user_id: u64, command: BotCommand) -> CommandResult {
        debug!("Handling command '{}' from user {}", command, user_id);
        let result = match command {
            BotCommand::Start => Self::handle_start(),
            BotCommand::Help => Self::handle_help(),
            BotCommand::Status => self.handle_status(user_id).await,
            BotCommand::Flush => self.handle_flush(user_id).await,
            BotCommand::Cancel => self.handle_cancel(user_id).await,
        };
        info!(
            "Command '{}' from user {}: success={}, trigger_flush={}",
            command, user_id, result.success, result.trigger_flush
        );
        result
    }

    fn handle_start() -> CommandResult {
        CommandResult::success(
            "Send me videos or documents and I will pack them into a zip \
             archive once you stop sending. A caption becomes the filename \
             inside the archive. Use /help for the full command list.",
        )
    }

    fn handle_help() -> CommandResult {
        let mut lines = vec!["Archive bot commands:".to_owned(), String::new()];
        for (cmd, aliases, desc) in BotCommand::all_commands() {
            let alias_str = if aliases.is_empty() {
                String::new()
            } else {
                format!(" {aliases}")
            };
            lines.push(format!("  {cmd}{alias_str} - {desc}"));
        }
        CommandResult::success(lines.join("\n"))
    }

    async fn handle_status(&self, user_id: u64) -> CommandResult {
        let Some(status) = self.registry.status(user_id, self.archive_delay).await else {
            return CommandResult::success(
                "No pending media. Send videos or documents to start a batch.",
            );
        };

        let timing = if status.flush_requested {
            "archiving as soon as downloads settle".to_owned()
        } else if status.in_flight > 0 {
            format!("{} download(s) in flight", status.in_flight)
        } else {
            format!("archiving in {}s", status.time_remaining.as_secs())
        };

        CommandResult::success(format!(
            "Queued: {} file(s)\nIn flight: {}\nNext: {}",
            status.saved, status.in_flight, timing
        ))
    }

    async fn handle_flush(&self, user_id: u64) -> CommandResult {
        if self.registry.request_flush(user_id).await {
            CommandResult::success_with_flush("Archiving your batch now...")
        } else {
            CommandResult::error("Nothing to archive yet. Send some media first.")
        }
    }

    async fn handle_cancel(&self, user_id: u64) -> CommandResult {
        match self.registry.discard(user_id).await {
            Some(dropped) => {
                CommandResult::success(format!("Discarded {dropped} queued file(s)."))
            }
            None => CommandResult::error("Nothing to cancel."),
        }
    }
}

impl std::fmt::Debug for CommandHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandler")
            .field("archive_delay", &self.archive_delay)
            .finish_non_exhaustive()
    }
}
