//! Per-user batch state.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Manifest filename written into every session directory.
pub const MANIFEST_FILE_NAME: &str = "session.json";

/// On-disk record of a session, updated after every saved download.
///
/// Lets a restart deliver batches that were pending when the process
/// died instead of leaking their scratch directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionManifest {
    /// Telegram id of the user the batch belongs to.
    pub user_id: u64,
    /// Chat the archive should be sent to.
    pub chat_id: i64,
    /// Saved file names, relative to the session directory.
    pub files: Vec<String>,
}

impl SessionManifest {
    /// Loads a manifest from a session directory, if present and valid.
    #[must_use]
    pub fn load(dir: &Path) -> Option<Self> {
        std::fs::read_to_string(dir.join(MANIFEST_FILE_NAME))
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
    }

    /// Writes the manifest into a session directory.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, dir: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(dir.join(MANIFEST_FILE_NAME), json)
    }
}

/// In-memory state of one user's pending media batch.
#[derive(Debug)]
pub struct UserSession {
    /// Telegram id of the user.
    pub user_id: u64,

    /// Chat the archive will be sent to.
    pub chat_id: i64,

    /// Scratch directory owned exclusively by this session.
    pub dir: PathBuf,

    /// Files saved so far.
    saved: Vec<PathBuf>,

    /// Downloads currently in flight.
    in_flight: usize,

    /// Last time media arrived or a download finished.
    ///
    /// `None` means the deadline has already passed (restored sessions).
    last_activity: Option<Instant>,

    /// Whether the user asked for an immediate archive.
    flush_requested: bool,
}

impl UserSession {
    /// Creates a fresh session rooted at `dir`.
    #[must_use]
    pub fn new(user_id: u64, chat_id: i64, dir: PathBuf) -> Self {
        Self {
            user_id,
            chat_id,
            dir,
            saved: Vec::new(),
            in_flight: 0,
            last_activity: Some(Instant::now()),
            flush_requested: false,
        }
    }

    /// Marks the start of a download.
    pub fn begin_download(&mut self) {
        self.in_flight += 1;
        self.touch();
    }

    /// Marks the end of a download, recording the file if it was saved.
    pub fn finish_download(&mut self, saved: Option<PathBuf>) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if let Some(path) = saved {
            self.saved.push(path);
        }
        self.touch();
    }

    /// Resets the quiet-period clock.
    pub fn touch(&mut self) {
        self.last_activity = Some(Instant::now());
    }

    /// Asks for finalization as soon as no download is in flight.
    pub fn request_flush(&mut self) {
        self.flush_requested = true;
    }

    /// Files saved so far.
    #[must_use]
    pub fn saved_files(&self) -> &[PathBuf] {
        &self.saved
    }

    /// Number of files saved so far.
    #[must_use]
    pub fn saved_count(&self) -> usize {
        self.saved.len()
    }

    /// Number of downloads currently in flight.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight
    }

    /// How long the session has been quiet.
    #[must_use]
    pub fn quiet_for(&self) -> Duration {
        self.last_activity.map_or(Duration::MAX, |t| t.elapsed())
    }

    /// Time left until the quiet-period deadline.
    #[must_use]
    pub fn time_until_deadline(&self, delay: Duration) -> Duration {
        delay.saturating_sub(self.quiet_for())
    }

    /// Whether the batch should be finalized now.
    ///
    /// Ready when nothing is in flight and either the quiet period has
    /// elapsed or a flush was requested. A session whose deadline passed
    /// but whose download never finishes is force-ready after `grace`.
    #[must_use]
    pub fn is_ready(&self, delay: Duration, grace: Duration) -> bool {
        let quiet = self.quiet_for();
        if self.in_flight == 0 {
            self.flush_requested || quiet >= delay
        } else {
            quiet >= delay.saturating_add(grace)
        }
    }

    /// Whether an immediate archive was requested.
    #[must_use]
    pub fn flush_pending(&self) -> bool {
        self.flush_requested
    }

    /// Whether nothing has been saved yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.saved.is_empty()
    }

    /// Builds the on-disk manifest for this session.
    #[must_use]
    pub fn manifest(&self) -> SessionManifest {
        SessionManifest {
            user_id: self.user_id,
            chat_id: self.chat_id,
            files: self
                .saved
                .iter()
                .filter_map(|p| p.file_name())
                .filter_map(|n| n.to_str())
                .map(ToOwned::to_owned)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> UserSession {
        UserSession::new(7, 7, PathBuf::from("/tmp/user_7-0"))
    }

    #[test]
    fn test_new_session_not_ready_before_delay() {
        let s = session();
        assert!(!s.is_ready(Duration::from_secs(60), Duration::from_secs(30)));
    }

    #[test]
    fn test_ready_after_quiet_period() {
        let s = session();
        assert!(s.is_ready(Duration::ZERO, Duration::from_secs(30)));
    }

    #[test]
    fn test_in_flight_blocks_readiness() {
        let mut s = session();
        s.begin_download();
        assert!(!s.is_ready(Duration::ZERO, Duration::from_secs(30)));
    }

    #[test]
    fn test_stalled_download_forced_after_grace() {
        let mut s = session();
        s.begin_download();
        assert!(s.is_ready(Duration::ZERO, Duration::ZERO));
    }

    #[test]
    fn test_flush_makes_ready_immediately() {
        let mut s = session();
        s.request_flush();
        assert!(s.is_ready(Duration::from_secs(3600), Duration::from_secs(30)));
    }

    #[test]
    fn test_download_bookkeeping() {
        let mut s = session();
        s.begin_download();
        assert_eq!(s.in_flight_count(), 1);

        s.finish_download(Some(PathBuf::from("/tmp/user_7-0/clip.mp4")));
        assert_eq!(s.in_flight_count(), 0);
        assert_eq!(s.saved_count(), 1);
        assert!(!s.is_empty());
    }

    #[test]
    fn test_failed_download_saves_nothing() {
        let mut s = session();
        s.begin_download();
        s.finish_download(None);
        assert_eq!(s.saved_count(), 0);
        assert!(s.is_empty());
    }

    #[test]
    fn test_manifest_uses_relative_names() {
        let mut s = session();
        s.begin_download();
        s.finish_download(Some(PathBuf::from("/tmp/user_7-0/clip.mp4")));

        let manifest = s.manifest();
        assert_eq!(manifest.user_id, 7);
        assert_eq!(manifest.files, vec!["clip.mp4".to_owned()]);
    }

    #[test]
    fn test_manifest_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = SessionManifest {
            user_id: 9,
            chat_id: -100,
            files: vec!["a.mp4".to_owned(), "b.pdf".to_owned()],
        };
        manifest.save(dir.path()).unwrap();

        let loaded = SessionManifest::load(dir.path()).unwrap();
        assert_eq!(loaded.user_id, 9);
        assert_eq!(loaded.chat_id, -100);
        assert_eq!(loaded.files, manifest.files);
    }

    #[test]
    fn test_manifest_load_missing_dir() {
        assert!(SessionManifest::load(Path::new("/nonexistent/dir")).is_none());
    }
}
