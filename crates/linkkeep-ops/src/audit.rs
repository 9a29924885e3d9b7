//! JSON Lines audit log of planned and applied migration steps.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;
use strum::Display;
use thiserror::Error;

use linkkeep_core::LinkMode;
use linkkeep_core::pattern::expand_home;

use crate::action::{ActionKind, MigrationPlan};

/// Errors raised while writing the audit log.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Failed to write audit log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode audit record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// When the records were written relative to execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AuditPhase {
    Preview,
    Applied,
}

#[derive(Debug, Serialize)]
struct AuditRecord<'a> {
    phase: AuditPhase,
    #[serde(rename = "type")]
    kind: ActionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<&'a Path>,
    #[serde(skip_serializing_if = "Option::is_none")]
    link: Option<&'a Path>,
    to: &'a Path,
    link_mode: LinkMode,
    timestamp: DateTime<Local>,
}

/// Append one JSON object per plan step to the file at `path`.
///
/// Directory moves are written as `{from, to}` and link changes as
/// `{link, to}`. Parent directories are created as needed.
pub fn append_audit_log(
    path: &Path,
    phase: AuditPhase,
    plan: &MigrationPlan,
    link_mode: LinkMode,
) -> Result<(), AuditError> {
    let path = PathBuf::from(expand_home(&path.to_string_lossy()));
    let io_err = |source: std::io::Error| AuditError::Io {
        path: path.clone(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(io_err)?;
    let mut out = BufWriter::new(file);

    let timestamp = Local::now();
    for action in plan {
        let (from, link) = if action.kind.is_link_action() {
            (None, Some(action.path.as_path()))
        } else {
            (Some(action.path.as_path()), None)
        };
        let record = AuditRecord {
            phase,
            kind: action.kind,
            from,
            link,
            to: &action.target,
            link_mode,
            timestamp,
        };
        serde_json::to_writer(&mut out, &record)?;
        out.write_all(b"\n").map_err(io_err)?;
    }
    out.flush().map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::MigrationAction;
    use tempfile::TempDir;

    #[test]
    fn test_append_audit_log() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("logs/audit.jsonl");
        let plan: MigrationPlan = [
            MigrationAction::move_dir(Path::new("/d/old"), Path::new("/d/new")),
            MigrationAction::retarget(Path::new("/p/data"), Path::new("/d/new"), PathBuf::from("../d/new")),
        ]
        .into_iter()
        .collect();

        append_audit_log(&log, AuditPhase::Preview, &plan, LinkMode::Relative).unwrap();
        append_audit_log(&log, AuditPhase::Applied, &plan, LinkMode::Relative).unwrap();

        let text = fs::read_to_string(&log).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 4);

        assert_eq!(lines[0]["phase"], "preview");
        assert_eq!(lines[0]["type"], "move");
        assert_eq!(lines[0]["from"], "/d/old");
        assert_eq!(lines[0]["to"], "/d/new");
        assert!(lines[0].get("link").is_none());

        assert_eq!(lines[1]["type"], "retarget");
        assert_eq!(lines[1]["link"], "/p/data");
        assert_eq!(lines[1]["link_mode"], "relative");
        assert!(lines[1]["timestamp"].as_str().unwrap().contains('T'));

        assert_eq!(lines[3]["phase"], "applied");
    }
}
