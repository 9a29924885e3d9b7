//! Pre-flight checks for a single proposed target change.

use std::path::{Path, PathBuf};

use serde::Serialize;

use linkkeep_core::LinkRecord;
use linkkeep_scan::absolutize;

use crate::fsops::path_exists;

/// System locations a migration must never write into.
pub const FORBIDDEN_PREFIXES: &[&str] = &["/usr", "/System", "/etc", "/bin", "/sbin", "/var"];

/// Outcome of [`validate_target_change`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Problems that make the change unsafe.
    pub errors: Vec<String>,
    /// Advisory notes.
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// Whether no errors were found.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check whether moving `record`'s target to `new_target` looks safe.
///
/// Never touches the filesystem beyond probing writability with a
/// throwaway temp file.
pub fn validate_target_change(
    record: &LinkRecord,
    new_target: &Path,
    scan_root: Option<&Path>,
) -> ValidationReport {
    let mut report = ValidationReport::default();

    if !new_target.is_absolute() {
        report
            .errors
            .push(format!("Target must be an absolute path: {}", new_target.display()));
        return report;
    }

    if let Some(prefix) = forbidden_prefix(new_target) {
        report
            .errors
            .push(format!("Destination is under protected system path {prefix}"));
    }

    if absolutize(&record.resolved_target) == absolutize(new_target) {
        report
            .errors
            .push(format!("New target is identical to current target: {}", new_target.display()));
    }

    match new_target.parent() {
        Some(parent) if !parent.is_dir() => {
            report
                .errors
                .push(format!("Parent directory does not exist: {}", parent.display()));
        }
        Some(parent) if !is_writable_dir(parent) => {
            report
                .errors
                .push(format!("Insufficient permissions to write into: {}", parent.display()));
        }
        _ => {}
    }

    if path_exists(new_target) && !same_file(new_target, &record.resolved_target) {
        report.errors.push(format!(
            "Destination already exists and differs from current target: {}",
            new_target.display()
        ));
    }

    if let Some(root) = scan_root {
        if !new_target.starts_with(root) {
            report.warnings.push(format!(
                "Destination is outside the scan root {}",
                root.display()
            ));
        }
    }

    let link_parent = record
        .source_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/"));
    if !is_writable_dir(&link_parent) {
        report.warnings.push(format!(
            "Link directory is not writable, updating the link may fail: {}",
            link_parent.display()
        ));
    }

    report
}

fn forbidden_prefix(path: &Path) -> Option<&'static str> {
    FORBIDDEN_PREFIXES
        .iter()
        .copied()
        .find(|prefix| path.starts_with(prefix))
}

/// Check by creating and dropping an anonymous temp file.
fn is_writable_dir(dir: &Path) -> bool {
    dir.is_dir()
        && tempfile::Builder::new()
            .prefix(".lk-writable")
            .tempfile_in(dir)
            .is_ok()
}

#[cfg(unix)]
fn same_file(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (std::fs::metadata(a), std::fs::metadata(b)) {
        (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
