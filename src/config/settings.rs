//! Application settings loaded from the environment.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for the archive bot.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Bot API token (obtain from `@BotFather`).
    pub bot_token: String,

    /// Telegram user ids allowed to use the bot.
    ///
    /// An empty set allows every user.
    pub allowed_users: HashSet<u64>,

    /// Root directory for per-session scratch directories.
    ///
    /// Relative paths resolve against the working directory.
    pub tmp_root: PathBuf,

    /// Filename of the generated archive (must end in `.zip`).
    pub archive_name: String,

    /// Maximum size of a single archive volume in bytes.
    pub archive_size_limit_bytes: u64,

    /// Quiet period after the last received media before archiving.
    pub archive_delay: Duration,

    /// Per-file download timeout.
    pub download_timeout: Duration,
}

fn default_tmp_root() -> PathBuf {
    PathBuf::from("telegram_bot_media")
}

fn default_archive_name() -> String {
    "Monitor.zip".to_owned()
}

const DEFAULT_ARCHIVE_SIZE_LIMIT_MB: f64 = 48.0;
const DEFAULT_ARCHIVE_DELAY_SECS: f64 = 5.0;
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: f64 = 120.0;

impl Settings {
    /// Creates configuration from environment variables.
    ///
    /// Expects `BOT_TOKEN` to be set. `ALLOWED_USERS`, `TMP_ROOT`,
    /// `ZIP_NAME`, `ARCHIVE_SIZE_LIMIT_MB`, `ARCHIVE_DELAY` (legacy alias
    /// `DEBOUNCE_SECONDS`) and `DOWNLOAD_TIMEOUT` are optional.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or any value is
    /// invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bot_token = std::env::var("BOT_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingEnvVar("BOT_TOKEN"))?;

        let allowed_users =
            parse_allowed_users(&std::env::var("ALLOWED_USERS").unwrap_or_default())?;

        let tmp_root = std::env::var("TMP_ROOT")
            .map_or_else(|_| default_tmp_root(), PathBuf::from);

        let archive_name = std::env::var("ZIP_NAME")
            .unwrap_or_else(|_| default_archive_name());
        validate_archive_name(&archive_name)?;

        let size_limit_mb = parse_float_var(
            "ARCHIVE_SIZE_LIMIT_MB",
            std::env::var("ARCHIVE_SIZE_LIMIT_MB").ok().as_deref(),
            DEFAULT_ARCHIVE_SIZE_LIMIT_MB,
        )?;
        if size_limit_mb <= 0.0 {
            return Err(ConfigError::NonPositiveSizeLimit);
        }

        // ARCHIVE_DELAY wins over the legacy DEBOUNCE_SECONDS name
        let delay_raw = std::env::var("ARCHIVE_DELAY")
            .or_else(|_| std::env::var("DEBOUNCE_SECONDS"))
            .ok();
        let archive_delay_secs = parse_float_var(
            "ARCHIVE_DELAY",
            delay_raw.as_deref(),
            DEFAULT_ARCHIVE_DELAY_SECS,
        )?;

        let download_timeout_secs = parse_float_var(
            "DOWNLOAD_TIMEOUT",
            std::env::var("DOWNLOAD_TIMEOUT").ok().as_deref(),
            DEFAULT_DOWNLOAD_TIMEOUT_SECS,
        )?;
        if download_timeout_secs <= 0.0 {
            return Err(ConfigError::InvalidNumber {
                var: "DOWNLOAD_TIMEOUT",
                value: format!("{download_timeout_secs}"),
            });
        }

        Ok(Self {
            bot_token,
            allowed_users,
            tmp_root,
            archive_name,
            archive_size_limit_bytes: mb_to_bytes(size_limit_mb),
            archive_delay: Duration::from_secs_f64(archive_delay_secs),
            download_timeout: Duration::from_secs_f64(download_timeout_secs),
        })
    }

    /// Checks whether a user may interact with the bot.
    ///
    /// An empty allow-list admits everyone.
    #[must_use]
    pub fn is_allowed(&self, user_id: u64) -> bool {
        self.allowed_users.is_empty() || self.allowed_users.contains(&user_id)
    }
}

/// Parses the comma-separated `ALLOWED_USERS` value.
///
/// An empty value yields an empty set (allow everyone). Any non-numeric
/// entry is an error rather than being skipped.
///
/// # Errors
///
/// Returns an error if an entry is not a valid user id.
pub fn parse_allowed_users(raw: &str) -> Result<HashSet<u64>, ConfigError> {
    let mut users = HashSet::new();
    for chunk in raw.split(',') {
        let token = chunk.trim();
        if token.is_empty() {
            continue;
        }
        let id = token
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidUserId(token.to_owned()))?;
        users.insert(id);
    }
    Ok(users)
}

/// Checks that the archive filename is usable.
///
/// # Errors
///
/// Returns an error unless the name ends in `.zip` (case-insensitive).
pub fn validate_archive_name(name: &str) -> Result<(), ConfigError> {
    if name.to_lowercase().ends_with(".zip") && name.len() > ".zip".len() {
        Ok(())
    } else {
        Err(ConfigError::InvalidArchiveName(name.to_owned()))
    }
}

/// Parses an optional non-negative float variable, falling back to a default.
fn parse_float_var(
    var: &'static str,
    raw: Option<&str>,
    default: f64,
) -> Result<f64, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber {
            var,
            value: raw.to_owned(),
        })?;
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidNumber {
            var,
            value: raw.to_owned(),
        })
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn mb_to_bytes(mb: f64) -> u64 {
    (mb * 1024.0 * 1024.0) as u64
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid Telegram user id in ALLOWED_USERS: {0}")]
    InvalidUserId(String),

    #[error("Invalid value for {var}: {value}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("ARCHIVE_SIZE_LIMIT_MB must be greater than zero")]
    NonPositiveSizeLimit,

    #[error("ZIP_NAME must end with .zip, got: {0}")]
    InvalidArchiveName(String),
}
