//! Archive volume splitting.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Splits an archive into sequential volumes of at most `max_bytes`.
///
/// An archive at or under the limit (or a limit of zero, which disables
/// splitting) is returned as-is. Otherwise the archive is rewritten as
/// `<name>.001`, `<name>.002`, … the original is deleted, and the volume
/// paths are returned in order. Volumes concatenate back into the
/// original archive.
///
/// # Errors
///
/// Returns an error if reading or writing a volume fails.
pub fn split_into_volumes(path: &Path, max_bytes: u64) -> io::Result<Vec<PathBuf>> {
    if max_bytes == 0 {
        return Ok(vec![path.to_path_buf()]);
    }
    if path.metadata()?.len() <= max_bytes {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut source = File::open(path)?;
    let mut parts = Vec::new();
    let mut index = 1u32;

    loop {
        let part_path = volume_path(path, index);
        let mut part = File::create(&part_path)?;
        let copied = io::copy(&mut (&mut source).take(max_bytes), &mut part)?;
        if copied == 0 {
            drop(part);
            std::fs::remove_file(&part_path)?;
            break;
        }
        parts.push(part_path);
        index += 1;
        if copied < max_bytes {
            break;
        }
    }

    std::fs::remove_file(path)?;
    Ok(parts)
}

fn volume_path(path: &Path, index: u32) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("archive.zip");
    path.with_file_name(format!("{name}.{index:03}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_archive_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.zip");
        std::fs::write(&path, b"1234").unwrap();

        let parts = split_into_volumes(&path, 10).unwrap();
        assert_eq!(parts, vec![path.clone()]);
        assert!(path.exists());
    }

    #[test]
    fn test_zero_limit_disables_splitting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.zip");
        std::fs::write(&path, b"123456").unwrap();

        let parts = split_into_volumes(&path, 0).unwrap();
        assert_eq!(parts, vec![path]);
    }

    #[test]
    fn test_split_produces_numbered_volumes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.zip");
        std::fs::write(&path, b"0123456789").unwrap();

        let parts = split_into_volumes(&path, 4).unwrap();
        assert_eq!(
            parts,
            vec![
                dir.path().join("batch.zip.001"),
                dir.path().join("batch.zip.002"),
                dir.path().join("batch.zip.003"),
            ]
        );
        assert!(!path.exists());
        assert_eq!(std::fs::read(&parts[0]).unwrap(), b"0123");
        assert_eq!(std::fs::read(&parts[2]).unwrap(), b"89");
    }

    #[test]
    fn test_split_exact_multiple() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.zip");
        std::fs::write(&path, b"01234567").unwrap();

        let parts = split_into_volumes(&path, 4).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(std::fs::read(&parts[1]).unwrap(), b"4567");
    }

    #[test]
    fn test_volumes_concatenate_to_original() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.zip");
        let payload: Vec<u8> = (0..=255).collect();
        std::fs::write(&path, &payload).unwrap();

        let parts = split_into_volumes(&path, 100).unwrap();
        let mut reassembled = Vec::new();
        for part in &parts {
            reassembled.extend(std::fs::read(part).unwrap());
        }
        assert_eq!(reassembled, payload);
    }
}
