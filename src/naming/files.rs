//! Extension resolution and collision-free target paths.

use std::path::{Path, PathBuf};

/// Maps a MIME type to a filename extension for the media the bot accepts.
#[must_use]
pub fn mime_to_extension(mime: &str) -> Option<&'static str> {
    let mime = mime.to_lowercase();
    if mime.contains("mp4") {
        Some(".mp4")
    } else if mime.contains("webm") {
        Some(".webm")
    } else if mime.contains("ogg") {
        Some(".ogg")
    } else if mime.contains("mpeg") || mime.contains("mp3") {
        Some(".mp3")
    } else if mime.contains("jpeg") || mime.contains("jpg") {
        Some(".jpg")
    } else if mime.contains("png") {
        Some(".png")
    } else {
        None
    }
}

/// Picks an extension for a download.
///
/// Preference order: the original filename's suffix, then the suffix of
/// the file path reported by the Bot API, then the MIME type. Returns an
/// empty string when none of them help.
#[must_use]
pub fn resolve_extension(
    file_name: Option<&str>,
    remote_path: Option<&str>,
    mime: Option<&str>,
) -> String {
    if let Some(ext) = file_name.and_then(path_suffix) {
        return ext;
    }
    if let Some(ext) = remote_path.and_then(path_suffix) {
        return ext;
    }
    mime.and_then(mime_to_extension).unwrap_or("").to_owned()
}

/// Returns the `.ext` suffix of a path-like string, if any.
fn path_suffix(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
}

/// Appends `ext` to `base` unless the base already ends with it.
///
/// The comparison is case-insensitive so `clip.MP4` keeps its suffix.
#[must_use]
pub fn ensure_extension(base: &str, ext: &str) -> String {
    if ext.is_empty() || base.to_lowercase().ends_with(&ext.to_lowercase()) {
        base.to_owned()
    } else {
        format!("{base}{ext}")
    }
}

/// Finds a path in `dir` that does not collide with an existing file.
///
/// Tries `name.ext`, then `name (1).ext`, `name (2).ext` and so on.
#[must_use]
pub fn unique_path(dir: &Path, desired_name: &str) -> PathBuf {
    let desired = Path::new(desired_name);
    let base = desired
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(desired_name);
    let ext = desired
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();

    let mut candidate = dir.join(format!("{base}{ext}"));
    let mut i = 1;
    while candidate.exists() {
        candidate = dir.join(format!("{base} ({i}){ext}"));
        i += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_to_extension() {
        assert_eq!(mime_to_extension("video/mp4"), Some(".mp4"));
        assert_eq!(mime_to_extension("video/WEBM"), Some(".webm"));
        assert_eq!(mime_to_extension("audio/mpeg"), Some(".mp3"));
        assert_eq!(mime_to_extension("image/jpeg"), Some(".jpg"));
        assert_eq!(mime_to_extension("application/octet-stream"), None);
    }

    #[test]
    fn test_resolve_extension_prefers_file_name() {
        let ext = resolve_extension(Some("clip.mkv"), Some("videos/file_42.mp4"), Some("video/mp4"));
        assert_eq!(ext, ".mkv");
    }

    #[test]
    fn test_resolve_extension_falls_back_to_remote_path() {
        let ext = resolve_extension(None, Some("videos/file_42.mp4"), None);
        assert_eq!(ext, ".mp4");
    }

    #[test]
    fn test_resolve_extension_falls_back_to_mime() {
        let ext = resolve_extension(Some("noext"), None, Some("video/webm"));
        assert_eq!(ext, ".webm");
    }

    #[test]
    fn test_resolve_extension_empty_when_unknown() {
        assert_eq!(resolve_extension(None, None, None), "");
        assert_eq!(resolve_extension(Some("noext"), Some("noext"), None), "");
    }

    #[test]
    fn test_ensure_extension() {
        assert_eq!(ensure_extension("clip", ".mp4"), "clip.mp4");
        assert_eq!(ensure_extension("clip.mp4", ".mp4"), "clip.mp4");
        assert_eq!(ensure_extension("clip.MP4", ".mp4"), "clip.MP4");
        assert_eq!(ensure_extension("clip", ""), "clip");
    }

    #[test]
    fn test_unique_path_no_collision() {
        let dir = tempfile::tempdir().unwrap();
        let path = unique_path(dir.path(), "clip.mp4");
        assert_eq!(path, dir.path().join("clip.mp4"));
    }

    #[test]
    fn test_unique_path_numbers_collisions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clip.mp4"), b"x").unwrap();
        std::fs::write(dir.path().join("clip (1).mp4"), b"x").unwrap();

        let path = unique_path(dir.path(), "clip.mp4");
        assert_eq!(path, dir.path().join("clip (2).mp4"));
    }

    #[test]
    fn test_unique_path_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("file"), b"x").unwrap();

        let path = unique_path(dir.path(), "file");
        assert_eq!(path, dir.path().join("file (1)"));
    }
}
