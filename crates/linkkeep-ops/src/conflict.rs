//! Destination conflict handling.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use linkkeep_core::ConflictStrategy;

use crate::error::MigrationError;
use crate::fsops::path_exists;

/// Free sibling path to park an existing destination under.
///
/// For `/data/app` at 2024-05-01 12:30:00 this tries
/// `/data/app~20240501-123000`, then `/data/app~20240501-123000-1`,
/// `-2`, and so on.
pub fn derive_backup_path(target: &Path, now: DateTime<Local>) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stamp = now.format("%Y%m%d-%H%M%S");

    let candidate = target.with_file_name(format!("{name}~{stamp}"));
    if !path_exists(&candidate) {
        return candidate;
    }

    let mut counter = 1u32;
    loop {
        let candidate = target.with_file_name(format!("{name}~{stamp}-{counter}"));
        if !path_exists(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Decide what happens to an existing `destination`.
///
/// Returns the backup path to use, `None` when the destination is free.
pub(crate) fn resolve_conflict(
    destination: &Path,
    strategy: ConflictStrategy,
    explicit_backup: Option<&Path>,
) -> Result<Option<PathBuf>, MigrationError> {
    if !path_exists(destination) {
        return Ok(None);
    }

    match strategy {
        ConflictStrategy::Abort => Err(MigrationError::DestinationExists {
            path: destination.to_path_buf(),
        }),
        ConflictStrategy::Backup => match explicit_backup {
            Some(backup) if path_exists(backup) => Err(MigrationError::BackupExists {
                path: backup.to_path_buf(),
            }),
            Some(backup) => Ok(Some(backup.to_path_buf())),
            None => Ok(Some(derive_backup_path(destination, Local::now()))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_backup_path_format() {
        let path = derive_backup_path(Path::new("/nonexistent/app"), fixed_time());
        assert_eq!(path, PathBuf::from("/nonexistent/app~20240501-123000"));
    }

    #[test]
    fn test_backup_path_counter() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("app");
        fs::create_dir(dir.path().join("app~20240501-123000")).unwrap();
        fs::create_dir(dir.path().join("app~20240501-123000-1")).unwrap();

        let path = derive_backup_path(&target, fixed_time());
        assert_eq!(path, dir.path().join("app~20240501-123000-2"));
    }

    #[test]
    fn test_resolve_conflict() {
        let dir = TempDir::new().unwrap();
        let taken = dir.path().join("taken");
        fs::create_dir(&taken).unwrap();
        let free = dir.path().join("free");

        assert!(resolve_conflict(&free, ConflictStrategy::Abort, None).unwrap().is_none());
        assert!(matches!(
            resolve_conflict(&taken, ConflictStrategy::Abort, None),
            Err(MigrationError::DestinationExists { .. })
        ));
        assert!(matches!(
            resolve_conflict(&taken, ConflictStrategy::Backup, Some(&taken)),
            Err(MigrationError::BackupExists { .. })
        ));
        assert_eq!(
            resolve_conflict(&taken, ConflictStrategy::Backup, Some(&free)).unwrap(),
            Some(free.clone())
        );
        let derived = resolve_conflict(&taken, ConflictStrategy::Backup, None)
            .unwrap()
            .unwrap();
        assert!(derived.to_string_lossy().contains("taken~"));
    }
}
