//! Bot API gateway for media transfer.

use std::path::Path;
use std::time::Duration;

use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::InputFile;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::RateLimiter;

/// Minimum gap between outgoing sends (Telegram allows roughly one
/// message per second per chat).
const SEND_MIN_INTERVAL: Duration = Duration::from_secs(1);

/// How many times a rate-limited send is attempted before giving up.
const MAX_SEND_ATTEMPTS: u32 = 3;

/// Errors that can occur during Telegram operations.
#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("File exceeds the Bot API download limit")]
    FileTooBig,

    #[error("Rate limited by Telegram: retry after {0} seconds")]
    RetryAfter(u32),

    #[error("Download timed out after {0:?}")]
    Timeout(Duration),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("API request failed: {0}")]
    Request(String),
}

impl From<teloxide::RequestError> for TelegramError {
    fn from(err: teloxide::RequestError) -> Self {
        if let teloxide::RequestError::RetryAfter(seconds) = &err {
            return Self::RetryAfter(seconds.seconds());
        }

        let err_str = err.to_string();
        if is_file_too_big(&err_str) {
            Self::FileTooBig
        } else {
            Self::Request(err_str)
        }
    }
}

/// Detects Telegram's "file is too big" refusal from an error message.
fn is_file_too_big(err_msg: &str) -> bool {
    err_msg.to_lowercase().contains("too big")
}

/// Metadata of a file the Bot API agreed to serve.
#[derive(Debug, Clone)]
pub struct RemoteFile {
    /// Path on Telegram's file server; also an extension hint.
    pub path: String,

    /// File size reported by the API, in bytes.
    pub size: u32,
}

/// High-level Bot API wrapper for downloads and uploads.
pub struct MediaGateway {
    /// The underlying teloxide bot.
    bot: Bot,

    /// Rate limiter for outgoing sends.
    rate_limiter: RateLimiter,

    /// Per-file download timeout.
    download_timeout: Duration,
}

impl MediaGateway {
    /// Creates a gateway around an authenticated bot.
    #[must_use]
    pub fn new(bot: Bot, download_timeout: Duration) -> Self {
        Self {
            bot,
            rate_limiter: RateLimiter::new(SEND_MIN_INTERVAL),
            download_timeout,
        }
    }

    /// Resolves a `file_id` into a downloadable remote file.
    ///
    /// # Errors
    ///
    /// Returns [`TelegramError::FileTooBig`] when the file exceeds the
    /// Bot API download limit, or another error if the call fails.
    pub async fn fetch_remote(&self, file_id: &str) -> Result<RemoteFile, TelegramError> {
        let file = self
            .bot
            .get_file(file_id.to_owned())
            .await
            .map_err(TelegramError::from)?;

        debug!("Resolved file {} -> {} ({} bytes)", file_id, file.path, file.meta.size);
        Ok(RemoteFile {
            path: file.path,
            size: file.meta.size,
        })
    }

    /// Streams a remote file to `dest`, bounded by the download timeout.
    ///
    /// A failed or timed-out download removes the partial file.
    ///
    /// # Errors
    ///
    /// Returns an error if the transfer fails or exceeds the timeout.
    pub async fn download_to(&self, remote: &RemoteFile, dest: &Path) -> Result<(), TelegramError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut out = tokio::fs::File::create(dest).await?;

        let transfer = self.bot.download_file(&remote.path, &mut out);
        match tokio::time::timeout(self.download_timeout, transfer).await {
            Ok(Ok(())) => {
                debug!("Downloaded {} to {}", remote.path, dest.display());
                Ok(())
            }
            Ok(Err(e)) => {
                drop(out);
                remove_partial(dest).await;
                Err(TelegramError::Download(e.to_string()))
            }
            Err(_) => {
                drop(out);
                remove_partial(dest).await;
                Err(TelegramError::Timeout(self.download_timeout))
            }
        }
    }

    /// Uploads a document with a caption, respecting the rate limiter.
    ///
    /// Retry-after responses feed the limiter back and the send is
    /// retried a bounded number of times.
    ///
    /// # Errors
    ///
    /// Returns an error if every attempt fails.
    pub async fn send_document(
        &self,
        chat: ChatId,
        path: &Path,
        caption: &str,
    ) -> Result<(), TelegramError> {
        let mut attempt = 1;
        loop {
            let waited = self.rate_limiter.wait_and_acquire().await;
            if !waited.is_zero() {
                debug!("Waited {:?} for send slot", waited);
            }

            let send = self
                .bot
                .send_document(chat, InputFile::file(path.to_path_buf()))
                .caption(caption.to_owned())
                .await;

            match send {
                Ok(_) => {
                    info!("Sent document {} to chat {}", path.display(), chat);
                    return Ok(());
                }
                Err(e) => {
                    let err: TelegramError = e.into();
                    if let TelegramError::RetryAfter(seconds) = err
                        && attempt < MAX_SEND_ATTEMPTS
                    {
                        warn!(
                            "Rate limited while sending (attempt {}/{}), backing off {} seconds",
                            attempt, MAX_SEND_ATTEMPTS, seconds
                        );
                        self.rate_limiter
                            .apply_penalty(Duration::from_secs(u64::from(seconds)))
                            .await;
                        attempt += 1;
                        continue;
                    }
                    return Err(err);
                }
            }
        }
    }

    /// Sends a plain text message.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn send_text(&self, chat: ChatId, text: &str) -> Result<(), TelegramError> {
        self.bot
            .send_message(chat, text.to_owned())
            .await
            .map(|_| ())
            .map_err(TelegramError::from)
    }
}

impl std::fmt::Debug for MediaGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaGateway")
            .field("rate_limiter", &self.rate_limiter)
            .field("download_timeout", &self.download_timeout)
            .finish_non_exhaustive()
    }
}

/// Best-effort removal of a partial download.
async fn remove_partial(dest: &Path) {
    if let Err(e) = tokio::fs::remove_file(dest).await {
        debug!("Could not remove partial download {}: {}", dest.display(), e);
    }
}
