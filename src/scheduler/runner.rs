//! Archive scheduler runner.
//!
//! The scheduler loop is deliberately simple:
//! 1. Tick on an interval (and on control messages).
//! 2. Drain every session that is ready: quiet period elapsed or flush
//!    requested, with no download in flight (stalled downloads are
//!    force-drained after a grace period).
//! 3. Finalize each drained batch in its own task: build the zip, split
//!    it into volumes if oversized, send the volume(s), remove the
//!    scratch directory.
//!
//! Empty batches (quiet but nothing saved) are removed silently.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use teloxide::types::ChatId;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::archive::{ArchiveError, build_archive, split_into_volumes};
use crate::config::{FINALIZE_STALL_GRACE_SECS, Settings};
use crate::session::{FinalizeJob, SessionRegistry};
use crate::telegram::MediaGateway;

/// Messages that can be sent to the scheduler.
#[derive(Debug, Clone)]
pub enum SchedulerMessage {
    /// Media activity for a user; wakes the loop early.
    Activity(u64),
    /// The user asked for an immediate archive.
    Flush(u64),
    /// Stop the scheduler.
    Shutdown,
}

/// Batch finalization scheduler.
pub struct ArchiveScheduler {
    /// Session registry to drain.
    registry: Arc<SessionRegistry>,

    /// Gateway used to send archives.
    gateway: Arc<MediaGateway>,

    /// Filename of the archive inside each scratch directory.
    archive_name: String,

    /// Maximum bytes per archive volume.
    size_limit_bytes: u64,

    /// Quiet period before a batch is finalized.
    delay: Duration,

    /// Grace period before a stalled batch is force-finalized.
    grace: Duration,

    /// Interval between readiness checks.
    check_interval: Duration,
}

impl ArchiveScheduler {
    /// Creates a new scheduler from the bot settings.
    #[must_use]
    pub fn new(
        registry: Arc<SessionRegistry>,
        gateway: Arc<MediaGateway>,
        settings: &Settings,
    ) -> Self {
        Self {
            registry,
            gateway,
            archive_name: settings.archive_name.clone(),
            size_limit_bytes: settings.archive_size_limit_bytes,
            delay: settings.archive_delay,
            grace: Duration::from_secs(FINALIZE_STALL_GRACE_SECS),
            check_interval: Duration::from_millis(500),
        }
    }

    /// Sets the interval between readiness checks.
    #[must_use]
    pub const fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// Runs the scheduler loop.
    pub async fn run(&self, mut rx: mpsc::Receiver<SchedulerMessage>) {
        info!("Archive scheduler started");

        let mut check_timer = interval(self.check_interval);

        loop {
            tokio::select! {
                _ = check_timer.tick() => {
                    self.tick().await;
                }
                msg = rx.recv() => {
                    match msg {
                        Some(SchedulerMessage::Activity(user_id)) => {
                            debug!("Media activity for user {}", user_id);
                            self.tick().await;
                        }
                        Some(SchedulerMessage::Flush(user_id)) => {
                            debug!("Flush requested for user {}", user_id);
                            self.tick().await;
                        }
                        Some(SchedulerMessage::Shutdown) | None => {
                            info!("Scheduler shutting down");
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Single tick: drain ready batches and finalize each concurrently.
    async fn tick(&self) {
        let jobs = self.registry.take_ready(self.delay, self.grace).await;
        for job in jobs {
            let gateway = Arc::clone(&self.gateway);
            let archive_name = self.archive_name.clone();
            let size_limit = self.size_limit_bytes;
            tokio::spawn(async move {
                finalize(job, &gateway, &archive_name, size_limit).await;
            });
        }
    }
}

impl std::fmt::Debug for ArchiveScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveScheduler")
            .field("archive_name", &self.archive_name)
            .field("size_limit_bytes", &self.size_limit_bytes)
            .field("delay", &self.delay)
            .field("check_interval", &self.check_interval)
            .finish_non_exhaustive()
    }
}

/// Finalizes one drained batch and removes its scratch directory.
async fn finalize(job: FinalizeJob, gateway: &MediaGateway, archive_name: &str, size_limit: u64) {
    let FinalizeJob {
        user_id,
        chat_id,
        dir,
        files,
    } = job;

    if files.is_empty() {
        debug!("Discarding empty batch for user {}", user_id);
        remove_scratch_dir(&dir).await;
        return;
    }

    let chat = ChatId(chat_id);
    match build_volumes(&dir, files, archive_name, size_limit).await {
        Ok(volumes) => {
            let total = volumes.len();
            if total > 1 {
                info!(
                    "Archive for user {} exceeds {} bytes, split into {} volumes",
                    user_id, size_limit, total
                );
            }
            for (index, volume) in volumes.iter().enumerate() {
                let caption = if total > 1 {
                    format!(
                        "Archive volume {}/{}. Download every volume before unpacking.",
                        index + 1,
                        total
                    )
                } else {
                    "Archive ready.".to_owned()
                };

                match gateway.send_document(chat, volume, &caption).await {
                    Ok(()) => {
                        info!("Sent archive volume {}/{} for user {}", index + 1, total, user_id);
                    }
                    Err(e) => {
                        error!(
                            "Failed to send archive volume {}/{} for user {}: {}",
                            index + 1,
                            total,
                            user_id,
                            e
                        );
                        break;
                    }
                }
            }
        }
        Err(ArchiveError::NoEntries) => {
            warn!("No files left to archive for user {}", user_id);
        }
        Err(e) => {
            error!("Failed to build archive for user {}: {}", user_id, e);
            let notice = "Failed to build your archive, please resend the files.";
            if let Err(e) = gateway.send_text(chat, notice).await {
                warn!("Failed to notify user {} about archive failure: {}", user_id, e);
            }
        }
    }

    remove_scratch_dir(&dir).await;
}

/// Builds the archive and splits it into volumes on a blocking thread.
async fn build_volumes(
    dir: &std::path::Path,
    files: Vec<PathBuf>,
    archive_name: &str,
    size_limit: u64,
) -> Result<Vec<PathBuf>, ArchiveError> {
    let dest = dir.join(archive_name);
    tokio::task::spawn_blocking(move || {
        build_archive(&files, &dest)?;
        Ok(split_into_volumes(&dest, size_limit)?)
    })
    .await
    .map_err(|e| ArchiveError::Io(io::Error::other(e)))?
}

/// Best-effort removal of a finished batch's scratch directory.
async fn remove_scratch_dir(dir: &std::path::Path) {
    if let Err(e) = tokio::fs::remove_dir_all(dir).await {
        warn!("Failed to remove scratch directory {}: {}", dir.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionManifest;

    fn test_settings(root: &std::path::Path) -> Settings {
        Settings {
            bot_token: "token".to_owned(),
            allowed_users: std::collections::HashSet::new(),
            tmp_root: root.to_path_buf(),
            archive_name: "Monitor.zip".to_owned(),
            archive_size_limit_bytes: 1024,
            archive_delay: Duration::from_secs(5),
            download_timeout: Duration::from_secs(120),
        }
    }

    #[tokio::test]
    async fn test_build_volumes_small_batch() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("clip.mp4");
        std::fs::write(&file, b"tiny").unwrap();

        let volumes = build_volumes(dir.path(), vec![file], "Monitor.zip", 1024 * 1024)
            .await
            .unwrap();
        assert_eq!(volumes, vec![dir.path().join("Monitor.zip")]);
        assert!(volumes[0].exists());
    }

    #[tokio::test]
    async fn test_build_volumes_splits_oversized_batch() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("blob.bin");
        std::fs::write(&file, vec![1u8; 4096]).unwrap();

        let volumes = build_volumes(dir.path(), vec![file], "Monitor.zip", 1024)
            .await
            .unwrap();
        assert!(volumes.len() > 1);
        assert!(volumes[0].to_string_lossy().ends_with(".001"));
        assert!(!dir.path().join("Monitor.zip").exists());
    }

    #[tokio::test]
    async fn test_build_volumes_empty_batch() {
        let dir = tempfile::tempdir().unwrap();
        let result =
            build_volumes(dir.path(), vec![dir.path().join("gone.mp4")], "Monitor.zip", 1024)
                .await;
        assert!(matches!(result, Err(ArchiveError::NoEntries)));
    }

    #[tokio::test]
    async fn test_scheduler_builder() {
        let root = tempfile::tempdir().unwrap();
        let settings = test_settings(root.path());
        let registry = Arc::new(SessionRegistry::new(settings.tmp_root.clone()));
        let gateway = Arc::new(MediaGateway::new(
            teloxide::Bot::new("0:TEST"),
            settings.download_timeout,
        ));

        let scheduler = ArchiveScheduler::new(registry, gateway, &settings)
            .with_check_interval(Duration::from_millis(50));
        assert_eq!(scheduler.check_interval, Duration::from_millis(50));
        assert_eq!(scheduler.archive_name, "Monitor.zip");
    }

    #[tokio::test]
    async fn test_manifest_survives_for_recovery() {
        // The scratch layout the scheduler consumes matches what the
        // registry recovers after a crash.
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("user_3-0");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("clip.mp4"), b"data").unwrap();
        SessionManifest {
            user_id: 3,
            chat_id: 30,
            files: vec!["clip.mp4".to_owned()],
        }
        .save(&dir)
        .unwrap();

        let registry = SessionRegistry::new(root.path().to_path_buf());
        let (recovered, _) = registry.restore_from_disk().await.unwrap();
        assert_eq!(recovered, 1);

        let jobs = registry
            .take_ready(Duration::from_secs(3600), Duration::from_secs(30))
            .await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].files, vec![dir.join("clip.mp4")]);
    }
}
