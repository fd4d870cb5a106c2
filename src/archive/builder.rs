//! Zip archive building.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;
use zip::CompressionMethod;
use zip::write::{FileOptions, ZipWriter};

/// Errors that can occur while building an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("I/O error while building archive: {0}")]
    Io(#[from] io::Error),

    #[error("Zip error while building archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("No files left to archive")]
    NoEntries,
}

/// Packs `files` into a zip archive at `dest` and returns its size.
///
/// Entries use stored compression since the media is already compressed.
/// Files that vanished between download and finalization are skipped
/// with a warning; if nothing could be added the (empty) archive is
/// removed and [`ArchiveError::NoEntries`] is returned.
///
/// # Errors
///
/// Returns an error on I/O or zip failures, or when no entry was added.
pub fn build_archive(files: &[PathBuf], dest: &Path) -> Result<u64, ArchiveError> {
    let out = File::create(dest)?;
    let mut writer = ZipWriter::new(out);
    let mut added = 0usize;

    for path in files {
        if !path.is_file() {
            warn!("Skipping vanished file: {}", path.display());
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            warn!("Skipping file with unusable name: {}", path.display());
            continue;
        };

        writer.start_file::<_, ()>(
            name,
            FileOptions::default().compression_method(CompressionMethod::Stored),
        )?;
        let mut src = File::open(path)?;
        io::copy(&mut src, &mut writer)?;
        added += 1;
    }

    let out = writer.finish()?;
    if added == 0 {
        drop(out);
        std::fs::remove_file(dest)?;
        return Err(ArchiveError::NoEntries);
    }

    Ok(out.metadata()?.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_archive_packs_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mp4");
        let b = dir.path().join("b.pdf");
        std::fs::write(&a, b"video-bytes").unwrap();
        std::fs::write(&b, b"document-bytes").unwrap();

        let dest = dir.path().join("batch.zip");
        let size = build_archive(&[a, b], &dest).unwrap();
        assert!(size > 0);

        let file = File::open(&dest).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        assert_eq!(archive.len(), 2);

        let mut names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.mp4".to_owned(), "b.pdf".to_owned()]);
    }

    #[test]
    fn test_build_archive_skips_vanished_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mp4");
        std::fs::write(&a, b"video-bytes").unwrap();
        let gone = dir.path().join("gone.mp4");

        let dest = dir.path().join("batch.zip");
        build_archive(&[gone, a], &dest).unwrap();

        let file = File::open(&dest).unwrap();
        let archive = zip::ZipArchive::new(file).unwrap();
        assert_eq!(archive.len(), 1);
    }

    #[test]
    fn test_build_archive_no_entries() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("batch.zip");

        let result = build_archive(&[dir.path().join("missing.mp4")], &dest);
        assert!(matches!(result, Err(ArchiveError::NoEntries)));
        assert!(!dest.exists());
    }

    #[test]
    fn test_stored_entries_keep_payload() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let payload = vec![7u8; 4096];
        std::fs::write(&a, &payload).unwrap();

        let dest = dir.path().join("batch.zip");
        build_archive(&[a], &dest).unwrap();

        let file = File::open(&dest).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        let mut entry = archive.by_index(0).unwrap();
        let mut read_back = Vec::new();
        io::Read::read_to_end(&mut entry, &mut read_back).unwrap();
        assert_eq!(read_back, payload);
    }
}
