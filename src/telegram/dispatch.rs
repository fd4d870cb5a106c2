//! Update dispatch: authorization, media intake, command routing.
//!
//! The handler tree is built here so the binary only wires dependencies,
//! mirroring how the rest of the crate keeps teloxide types at the edge.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use teloxide::dispatching::UpdateHandler;
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::types::{Document, Video};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::{MediaGateway, TelegramError};
use crate::commands::{BotCommand, CommandHandler};
use crate::config::{BOT_API_DOWNLOAD_LIMIT_MB, Settings};
use crate::naming::{
    FALLBACK_BASE_NAME, ensure_extension, resolve_extension, sanitize_name, unique_path,
};
use crate::scheduler::SchedulerMessage;
use crate::session::SessionRegistry;

/// A media attachment extracted from an incoming message.
#[derive(Debug, Clone)]
pub struct MediaPayload {
    /// Bot API file id used to fetch the content.
    pub file_id: String,

    /// Original filename, if the sender's client provided one.
    pub file_name: Option<String>,

    /// MIME type reported by Telegram.
    pub mime_type: Option<String>,

    /// Message caption; preferred source for the stored filename.
    pub caption: Option<String>,
}

impl MediaPayload {
    /// Extracts the downloadable attachment of a message, if any.
    ///
    /// Videos and documents are accepted; everything else is ignored.
    #[must_use]
    pub fn from_message(msg: &Message) -> Option<Self> {
        let caption = msg.caption().map(ToOwned::to_owned);
        if let Some(video) = msg.video() {
            return Some(Self::from_video(video, caption));
        }
        if let Some(document) = msg.document() {
            return Some(Self::from_document(document, caption));
        }
        None
    }

    fn from_video(video: &Video, caption: Option<String>) -> Self {
        Self {
            file_id: video.file.id.clone(),
            file_name: video.file_name.clone(),
            mime_type: video.mime_type.as_ref().map(ToString::to_string),
            caption,
        }
    }

    fn from_document(document: &Document, caption: Option<String>) -> Self {
        Self {
            file_id: document.file.id.clone(),
            file_name: document.file_name.clone(),
            mime_type: document.mime_type.as_ref().map(ToString::to_string),
            caption,
        }
    }

    /// Name to show the user when referring to this attachment.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.caption
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .or(self.file_name.as_deref())
            .unwrap_or(FALLBACK_BASE_NAME)
    }

    /// Sanitized base filename, before extension handling.
    #[must_use]
    pub fn base_name(&self) -> String {
        let raw = self
            .caption
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .or(self.file_name.as_deref());
        raw.map_or_else(|| FALLBACK_BASE_NAME.to_owned(), sanitize_name)
    }
}

/// Builds the update handler tree.
///
/// Unauthorized traffic is logged and dropped before any endpoint runs.
#[must_use]
pub fn schema() -> UpdateHandler<anyhow::Error> {
    Update::filter_message().branch(
        dptree::filter(|msg: Message, settings: Arc<Settings>| {
            let Some(user) = msg.from() else {
                return false;
            };
            if settings.is_allowed(user.id.0) {
                true
            } else {
                info!("Ignoring message from unauthorized user {}", user.id.0);
                false
            }
        })
        .branch(
            dptree::filter(|msg: Message| msg.video().is_some() || msg.document().is_some())
                .endpoint(handle_media),
        )
        .branch(
            dptree::filter_map(|msg: Message| msg.text().and_then(BotCommand::parse))
                .endpoint(handle_command),
        ),
    )
}

/// Downloads the attachment of a media message into the user's session.
async fn handle_media(
    msg: Message,
    gateway: Arc<MediaGateway>,
    registry: Arc<SessionRegistry>,
    scheduler_tx: mpsc::Sender<SchedulerMessage>,
) -> anyhow::Result<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let Some(payload) = MediaPayload::from_message(&msg) else {
        return Ok(());
    };
    let user_id = user.id.0;
    let chat_id = msg.chat.id;

    let dir = registry.begin_download(user_id, chat_id.0).await?;

    match download_media(&gateway, &dir, &payload).await {
        Ok(path) => {
            info!("Saved file for user {}: {}", user_id, path.display());
            registry.finish_download(user_id, Some(path)).await;
        }
        Err(TelegramError::FileTooBig) => {
            registry.finish_download(user_id, None).await;
            warn!("Skipping oversized media from user {}", user_id);
            let notice = format!(
                "Skipped {}: it exceeds the {} MB download limit, fetch it manually.",
                payload.display_name(),
                BOT_API_DOWNLOAD_LIMIT_MB
            );
            if let Err(e) = gateway.send_text(chat_id, &notice).await {
                warn!("Failed to notify user {} about skipped media: {}", user_id, e);
            }
        }
        Err(e) => {
            registry.finish_download(user_id, None).await;
            warn!("Failed to download media from user {}: {}", user_id, e);
        }
    }

    let _ = scheduler_tx.send(SchedulerMessage::Activity(user_id)).await;
    Ok(())
}

/// Resolves the target filename and streams one attachment to disk.
async fn download_media(
    gateway: &MediaGateway,
    dir: &Path,
    payload: &MediaPayload,
) -> Result<PathBuf, TelegramError> {
    let remote = gateway.fetch_remote(&payload.file_id).await?;

    let ext = resolve_extension(
        payload.file_name.as_deref(),
        Some(&remote.path),
        payload.mime_type.as_deref(),
    );
    let name = ensure_extension(&payload.base_name(), &ext);
    let dest = unique_path(dir, &name);

    gateway.download_to(&remote, &dest).await?;
    Ok(dest)
}

/// Executes a chat command and replies with the result.
async fn handle_command(
    command: BotCommand,
    msg: Message,
    gateway: Arc<MediaGateway>,
    handler: Arc<CommandHandler>,
    scheduler_tx: mpsc::Sender<SchedulerMessage>,
) -> anyhow::Result<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };

    let result = handler.execute(user.id.0, command).await;
    if result.trigger_flush {
        let _ = scheduler_tx.send(SchedulerMessage::Flush(user.id.0)).await;
    }
    gateway.send_text(msg.chat.id, &result.message).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(caption: Option<&str>, file_name: Option<&str>) -> MediaPayload {
        MediaPayload {
            file_id: "abc".to_owned(),
            file_name: file_name.map(ToOwned::to_owned),
            mime_type: None,
            caption: caption.map(ToOwned::to_owned),
        }
    }

    #[test]
    fn test_base_name_prefers_caption() {
        let p = payload(Some("Holiday <b>clip</b>"), Some("VID_1234.mp4"));
        assert_eq!(p.base_name(), "Holiday clip");
    }

    #[test]
    fn test_base_name_falls_back_to_file_name() {
        let p = payload(None, Some("VID_1234.mp4"));
        assert_eq!(p.base_name(), "VID_1234.mp4");

        let blank = payload(Some("   "), Some("VID_1234.mp4"));
        assert_eq!(blank.base_name(), "VID_1234.mp4");
    }

    #[test]
    fn test_base_name_fallback_constant() {
        let p = payload(None, None);
        assert_eq!(p.base_name(), FALLBACK_BASE_NAME);
    }

    #[test]
    fn test_display_name_prefers_caption() {
        let p = payload(Some("My clip"), Some("VID_1234.mp4"));
        assert_eq!(p.display_name(), "My clip");

        let p = payload(None, Some("VID_1234.mp4"));
        assert_eq!(p.display_name(), "VID_1234.mp4");

        let p = payload(None, None);
        assert_eq!(p.display_name(), FALLBACK_BASE_NAME);
    }
}
