//! Session tracking for per-user media batches.
//!
//! Each batch owns a unique scratch directory under the configured temp
//! root. The registry hands directories to the download path, tracks
//! batch progress, and drains sessions that are ready to be archived.

mod state;

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, warn};

pub use state::{MANIFEST_FILE_NAME, SessionManifest, UserSession};

/// A batch removed from the registry, ready for archiving.
#[derive(Debug)]
pub struct FinalizeJob {
    /// Telegram id of the user the batch belongs to.
    pub user_id: u64,
    /// Chat the archive should be sent to.
    pub chat_id: i64,
    /// Scratch directory to archive and then remove.
    pub dir: PathBuf,
    /// Saved files, in arrival order.
    pub files: Vec<PathBuf>,
}

/// Snapshot of a pending batch for the `/status` command.
#[derive(Debug, Clone)]
pub struct SessionStatus {
    /// Files saved so far.
    pub saved: usize,
    /// Downloads currently in flight.
    pub in_flight: usize,
    /// Time left until the quiet-period deadline.
    pub time_remaining: Duration,
    /// Whether an immediate archive was requested.
    pub flush_requested: bool,
}

/// Registry of active sessions plus batches recovered from disk.
#[derive(Debug)]
pub struct SessionRegistry {
    tmp_root: PathBuf,
    sessions: Mutex<HashMap<u64, UserSession>>,
    recovered: Mutex<Vec<FinalizeJob>>,
}

impl SessionRegistry {
    /// Creates a registry rooted at `tmp_root`.
    #[must_use]
    pub fn new(tmp_root: PathBuf) -> Self {
        Self {
            tmp_root,
            sessions: Mutex::new(HashMap::new()),
            recovered: Mutex::new(Vec::new()),
        }
    }

    /// Registers the start of a download and returns the directory the
    /// file should be saved into, creating the session if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if a scratch directory cannot be created.
    pub async fn begin_download(&self, user_id: u64, chat_id: i64) -> io::Result<PathBuf> {
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.get_mut(&user_id) {
            session.chat_id = chat_id;
            session.begin_download();
            return Ok(session.dir.clone());
        }

        let dir = claim_session_dir(&self.tmp_root, user_id)?;
        debug!("Created session directory {} for user {}", dir.display(), user_id);
        let mut session = UserSession::new(user_id, chat_id, dir.clone());
        session.begin_download();
        sessions.insert(user_id, session);
        Ok(dir)
    }

    /// Registers the end of a download, recording the saved file if any,
    /// and persists the session manifest.
    pub async fn finish_download(&self, user_id: u64, saved: Option<PathBuf>) {
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.get_mut(&user_id) {
            session.finish_download(saved);
            if let Err(e) = session.manifest().save(&session.dir) {
                warn!("Failed to save session manifest for user {}: {}", user_id, e);
            }
        }
    }

    /// Asks for the user's batch to be archived as soon as possible.
    ///
    /// Returns `false` if the user has no pending batch.
    pub async fn request_flush(&self, user_id: u64) -> bool {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(&user_id) {
            Some(session) => {
                session.request_flush();
                true
            }
            None => false,
        }
    }

    /// Discards the user's pending batch and its scratch directory.
    ///
    /// Returns the number of files dropped, or `None` if there was no
    /// batch.
    pub async fn discard(&self, user_id: u64) -> Option<usize> {
        let session = {
            let mut sessions = self.sessions.lock().await;
            sessions.remove(&user_id)?
        };
        let dropped = session.saved_count();
        if let Err(e) = tokio::fs::remove_dir_all(&session.dir).await {
            warn!(
                "Failed to remove session directory {}: {}",
                session.dir.display(),
                e
            );
        }
        Some(dropped)
    }

    /// Snapshot of the user's pending batch for status reporting.
    pub async fn status(&self, user_id: u64, delay: Duration) -> Option<SessionStatus> {
        let sessions = self.sessions.lock().await;
        sessions.get(&user_id).map(|session| SessionStatus {
            saved: session.saved_count(),
            in_flight: session.in_flight_count(),
            time_remaining: session.time_until_deadline(delay),
            flush_requested: session.flush_pending(),
        })
    }

    /// Removes and returns every batch that is ready to be archived,
    /// including batches recovered from a previous run.
    pub async fn take_ready(&self, delay: Duration, grace: Duration) -> Vec<FinalizeJob> {
        let mut jobs: Vec<FinalizeJob> = self.recovered.lock().await.drain(..).collect();

        let mut sessions = self.sessions.lock().await;
        let ready: Vec<u64> = sessions
            .iter()
            .filter(|(_, s)| s.is_ready(delay, grace))
            .map(|(&uid, _)| uid)
            .collect();

        for user_id in ready {
            if let Some(session) = sessions.remove(&user_id) {
                jobs.push(FinalizeJob {
                    user_id,
                    chat_id: session.chat_id,
                    dir: session.dir.clone(),
                    files: session.saved_files().to_vec(),
                });
            }
        }
        jobs
    }

    /// Scans the temp root for leftovers of a previous run.
    ///
    /// Directories with a valid manifest become recovered jobs delivered
    /// on the next scheduler tick; directories without one are removed.
    /// Returns `(recovered, removed)` counts.
    ///
    /// # Errors
    ///
    /// Returns an error if the temp root cannot be read.
    pub async fn restore_from_disk(&self) -> io::Result<(usize, usize)> {
        let mut recovered = 0;
        let mut removed = 0;

        let mut jobs = self.recovered.lock().await;
        for entry in std::fs::read_dir(&self.tmp_root)? {
            let entry = entry?;
            let path = entry.path();
            let is_session_dir = path.is_dir()
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|n| n.starts_with("user_"));
            if !is_session_dir {
                continue;
            }

            let job = SessionManifest::load(&path).and_then(|manifest| {
                let files: Vec<PathBuf> = manifest
                    .files
                    .iter()
                    .map(|name| path.join(name))
                    .filter(|p| p.is_file())
                    .collect();
                if files.is_empty() {
                    None
                } else {
                    Some(FinalizeJob {
                        user_id: manifest.user_id,
                        chat_id: manifest.chat_id,
                        dir: path.clone(),
                        files,
                    })
                }
            });

            match job {
                Some(job) => {
                    debug!(
                        "Recovered pending batch for user {} ({} files)",
                        job.user_id,
                        job.files.len()
                    );
                    jobs.push(job);
                    recovered += 1;
                }
                None => {
                    if let Err(e) = std::fs::remove_dir_all(&path) {
                        warn!("Failed to remove stale directory {}: {}", path.display(), e);
                    } else {
                        removed += 1;
                    }
                }
            }
        }
        Ok((recovered, removed))
    }
}

/// Claims a fresh `user_<uid>-<seq>` directory under the temp root.
///
/// Each session gets its own directory so a batch being finalized can
/// never delete files of a batch that just started.
fn claim_session_dir(tmp_root: &std::path::Path, user_id: u64) -> io::Result<PathBuf> {
    for seq in 0..u32::MAX {
        let dir = tmp_root.join(format!("user_{user_id}-{seq}"));
        match std::fs::create_dir(&dir) {
            Ok(()) => return Ok(dir),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::other("exhausted session directory names"))
}
