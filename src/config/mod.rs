//! Configuration module for the archive bot.
//!
//! Handles loading and validation of bot configuration from the
//! environment: credentials, the allow-list, scratch-directory layout,
//! and archive timing/size limits.

mod settings;

pub use settings::{ConfigError, Settings};

/// Largest file the Bot API will serve through `getFile`, in megabytes.
/// Larger media is skipped and the sender is told to fetch it manually.
pub const BOT_API_DOWNLOAD_LIMIT_MB: u64 = 20;

/// How long a session may block finalization on an in-flight download
/// past its deadline before it is finalized with whatever was saved.
pub const FINALIZE_STALL_GRACE_SECS: u64 = 30;
