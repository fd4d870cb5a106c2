//! Command types and definitions.

use std::fmt;

/// Available bot commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    /// Greet the user and explain what the bot does.
    Start,

    /// Show help information.
    Help,

    /// Show the pending batch (queued files, time until archiving).
    Status,

    /// Archive the pending batch immediately.
    Flush,

    /// Discard the pending batch.
    Cancel,
}

impl BotCommand {
    /// Parses a command from a message text.
    ///
    /// Accepts the `/command` form with an optional `@botname` suffix,
    /// case-insensitively. Returns `None` for anything else.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let after_slash = text.strip_prefix('/')?;

        // Commands take no arguments; anything after whitespace is ignored
        let word = after_slash.split_whitespace().next()?;
        let name = word.split('@').next().unwrap_or(word).to_lowercase();

        match name.as_str() {
            "start" => Some(Self::Start),
            "help" | "h" => Some(Self::Help),
            "status" | "s" => Some(Self::Status),
            "flush" | "archive" | "zip" => Some(Self::Flush),
            "cancel" | "clear" | "drop" => Some(Self::Cancel),
            _ => None,
        }
    }

    /// Returns the command name as it appears in help.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Help => "help",
            Self::Status => "status",
            Self::Flush => "flush",
            Self::Cancel => "cancel",
        }
    }

    /// Returns all available commands with aliases and descriptions.
    #[must_use]
    pub fn all_commands() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("/status", "(/s)", "Show queued files and time until archiving"),
            ("/flush", "(/archive, /zip)", "Archive the queued files now"),
            ("/cancel", "(/clear, /drop)", "Discard the queued files"),
            ("/help", "(/h)", "Show this help message"),
        ]
    }
}

impl fmt::Display for BotCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Result of command execution.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Whether the command was successful.
    pub success: bool,

    /// Response message to show the user.
    pub message: String,

    /// Whether to wake the scheduler for an immediate archive.
    pub trigger_flush: bool,
}

impl CommandResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            trigger_flush: false,
        }
    }

    /// Creates a successful result that triggers an immediate archive.
    #[must_use]
    pub fn success_with_flush(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            trigger_flush: true,
        }
    }

    /// Creates an error result.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            trigger_flush: false,
        }
    }
}
