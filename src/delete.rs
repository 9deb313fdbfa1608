//! Delete staging, spec §4.6. This module is interface-only: it stages a
//! file out of the way, it never schedules or performs the eventual
//! reclamation of disk space — that belongs to whatever external process
//! owns retention policy, same as the compression codec is an external
//! collaborator to `chunk.rs`.

use std::path::{Path, PathBuf};

use chrono::Utc;
use uuid::Uuid;

use crate::error::{FileError, Result};

/// Rename `path` in place to a sibling name carrying a deletion timestamp,
/// e.g. `data.couch` -> `data.couch.20260728.143210.deleted`. The file stays
/// fully readable at its new name; nothing about its contents changes.
pub fn rename_with_timestamp(path: &Path) -> Result<PathBuf> {
    let stamp = Utc::now().format("%Y%m%d.%H%M%S");
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| FileError::io(path, std::io::Error::new(std::io::ErrorKind::InvalidInput, "non-utf8 file name")))?;

    let target = path.with_file_name(format!("{file_name}.{stamp}.deleted"));
    std::fs::rename(path, &target).map_err(|e| FileError::io(path, e))?;
    Ok(target)
}

/// Directory name under which staged deletes live, relative to the data
/// root (sibling to the files it stages, never inside a content directory).
pub const STAGING_DIR_NAME: &str = ".delete";

/// Move `path` into `<root>/.delete/<uuid>`, returning the staged location.
/// `root` is expected to be an ancestor of `path`; the staging directory is
/// created if missing.
pub fn stage_for_delete(root: &Path, path: &Path) -> Result<PathBuf> {
    let staging_dir = root.join(STAGING_DIR_NAME);
    std::fs::create_dir_all(&staging_dir).map_err(|e| FileError::io(&staging_dir, e))?;

    let staged = staging_dir.join(Uuid::new_v4().to_string());
    std::fs::rename(path, &staged).map_err(|e| FileError::io(path, e))?;
    Ok(staged)
}

/// Remove every entry already sitting in `<root>/.delete` — run once at
/// startup to clean up staged deletes left behind by a prior process that
/// never finished reclaiming them.
pub fn clean_stale_staging(root: &Path) -> Result<usize> {
    let staging_dir = root.join(STAGING_DIR_NAME);
    let entries = match std::fs::read_dir(&staging_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(FileError::io(&staging_dir, e)),
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry.map_err(|e| FileError::io(&staging_dir, e))?;
        let path = entry.path();
        let result = if path.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        result.map_err(|e| FileError::io(&path, e))?;
        removed += 1;
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn rename_with_timestamp_preserves_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.couch");
        std::fs::write(&path, b"hello").unwrap();

        let staged = rename_with_timestamp(&path).unwrap();
        assert!(!path.exists());
        assert!(staged.file_name().unwrap().to_str().unwrap().contains(".deleted"));
        assert_eq!(std::fs::read(&staged).unwrap(), b"hello");
    }

    #[test]
    fn stage_for_delete_moves_into_staging_dir() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.couch");
        std::fs::write(&path, b"hello").unwrap();

        let staged = stage_for_delete(dir.path(), &path).unwrap();
        assert!(!path.exists());
        assert!(staged.starts_with(dir.path().join(STAGING_DIR_NAME)));
    }

    #[test]
    fn clean_stale_staging_removes_leftovers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.couch");
        std::fs::write(&path, b"hello").unwrap();
        stage_for_delete(dir.path(), &path).unwrap();

        let removed = clean_stale_staging(dir.path()).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(clean_stale_staging(dir.path()).unwrap(), 0);
    }

    #[test]
    fn clean_stale_staging_tolerates_missing_dir() {
        let dir = tempdir().unwrap();
        assert_eq!(clean_stale_staging(dir.path()).unwrap(), 0);
    }
}
