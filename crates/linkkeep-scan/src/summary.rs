//! File counts and byte totals for directory trees.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Regular-file count and total size under a directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TreeSummary {
    pub files: u64,
    pub bytes: u64,
}

impl TreeSummary {
    /// One-line comparison of a current and a proposed location.
    pub fn pair_description(current: &TreeSummary, new: &TreeSummary) -> String {
        format!("summary(current={current}, new={new})")
    }
}

impl fmt::Display for TreeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "files:{} bytes:{}", self.files, self.bytes)
    }
}

/// Count regular files under `path` without following symlinks.
///
/// Unreadable entries are skipped. A missing path or a non-directory
/// yields an empty summary.
pub fn tree_summary(path: &Path) -> TreeSummary {
    let mut summary = TreeSummary::default();
    if !path.is_dir() {
        return summary;
    }

    let mut stack: Vec<PathBuf> = vec![path.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                stack.push(entry.path());
            } else if file_type.is_file() {
                summary.files += 1;
                if let Ok(metadata) = entry.metadata() {
                    summary.bytes += metadata.len();
                }
            }
        }
    }
    summary
}
