//! Per-project data directory status and mode switching.
//!
//! A project keeps its data in a fixed subdirectory named
//! [`DATA_DIR_NAME`]. That entry is either a symlink (relative or
//! absolute) into a shared data area, a real directory, or absent.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use strum::Display;

use linkkeep_core::LinkMode;
use linkkeep_scan::absolutize;

use crate::action::{Execution, MigrationAction, MigrationPlan};
use crate::error::MigrationError;
use crate::fsops::{is_real_dir, is_symlink, link_text_for};
use crate::migrate::{execute_plan, materialize_links_in_place};

/// Name of the data entry inside a project root.
pub const DATA_DIR_NAME: &str = "data";

/// How a project's data entry is currently stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProjectDataMode {
    Relative,
    Absolute,
    Inline,
    /// No data entry, or a link whose target is gone.
    Missing,
}

impl From<LinkMode> for ProjectDataMode {
    fn from(mode: LinkMode) -> Self {
        match mode {
            LinkMode::Relative => Self::Relative,
            LinkMode::Absolute => Self::Absolute,
            LinkMode::Inline => Self::Inline,
        }
    }
}

/// Snapshot of a project's data entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectDataStatus {
    pub project_root: PathBuf,
    /// `project_root/data`, whether or not it exists.
    pub data_path: PathBuf,
    pub mode: ProjectDataMode,
    /// Raw link text when the entry is a symlink.
    pub link_text: Option<PathBuf>,
    /// Where the data actually lives, if anywhere.
    pub target_path: Option<PathBuf>,
    /// Other projects whose data link resolves to the same target.
    pub shared_with: Vec<PathBuf>,
}

/// Result of [`set_project_data_mode`].
#[derive(Debug, Clone)]
pub struct ModeChange {
    /// Steps taken, or that would be taken.
    pub plan: MigrationPlan,
    /// State after the change. Projected when previewing.
    pub status: ProjectDataStatus,
}

/// Inspect `project_root/data`.
///
/// `other_roots` are checked for data links that share this project's
/// target.
pub fn project_data_status(project_root: &Path, other_roots: &[PathBuf]) -> ProjectDataStatus {
    let project_root = absolutize(project_root);
    let data_path = project_root.join(DATA_DIR_NAME);

    let mut status = ProjectDataStatus {
        project_root: project_root.clone(),
        data_path: data_path.clone(),
        mode: ProjectDataMode::Missing,
        link_text: None,
        target_path: None,
        shared_with: Vec::new(),
    };

    if is_symlink(&data_path) {
        let text = fs::read_link(&data_path).ok();
        let target = data_path.canonicalize().ok();
        status.link_text = text.clone();

        if let (Some(text), Some(target)) = (text, target) {
            status.mode = if text.is_absolute() {
                ProjectDataMode::Absolute
            } else {
                ProjectDataMode::Relative
            };
            status.shared_with = shared_projects(&target, &project_root, other_roots);
            status.target_path = Some(target);
        }
    } else if is_real_dir(&data_path) {
        status.mode = ProjectDataMode::Inline;
        status.target_path = Some(data_path);
    }

    status
}

fn shared_projects(target: &Path, project_root: &Path, others: &[PathBuf]) -> Vec<PathBuf> {
    others
        .iter()
        .map(|root| absolutize(root))
        .filter(|root| root != project_root)
        .filter(|root| {
            let data = root.join(DATA_DIR_NAME);
            is_symlink(&data) && data.canonicalize().is_ok_and(|t| t == target)
        })
        .collect()
}

/// Switch a project's data entry to `mode`.
///
/// Relative and absolute links are converted into each other in place; a
/// link becomes inline by materializing its target. Converting an inline
/// directory back to a link is refused because there is no target to
/// point at. Requesting the current mode is a no-op.
pub fn set_project_data_mode(
    project_root: &Path,
    mode: LinkMode,
    execution: Execution,
) -> Result<ModeChange, MigrationError> {
    let current = project_data_status(project_root, &[]);
    let wanted = ProjectDataMode::from(mode);

    let target = match (current.mode, &current.target_path) {
        (ProjectDataMode::Missing, _) | (_, None) => {
            return Err(MigrationError::MissingData {
                path: current.data_path.clone(),
            });
        }
        (_, Some(target)) => target.clone(),
    };

    if current.mode == wanted {
        return Ok(ModeChange {
            plan: MigrationPlan::new(),
            status: current,
        });
    }

    if current.mode == ProjectDataMode::Inline {
        return Err(MigrationError::UnsupportedModeChange {
            path: current.data_path,
            from: current.mode.to_string(),
            to: wanted.to_string(),
        });
    }

    let data_path = current.data_path.clone();
    let plan = match mode {
        LinkMode::Inline => {
            materialize_links_in_place(&target, std::slice::from_ref(&data_path), execution)?
        }
        LinkMode::Relative | LinkMode::Absolute => {
            let text = link_text_for(&data_path, &target, mode == LinkMode::Relative);
            let plan: MigrationPlan = [MigrationAction::retarget(&data_path, &target, text)]
                .into_iter()
                .collect();
            if execution.is_apply() {
                execute_plan(&plan)?;
            }
            plan
        }
    };

    let status = if execution.is_apply() {
        let status = project_data_status(project_root, &[]);
        if status.mode != wanted {
            return Err(MigrationError::verification(
                &data_path,
                format!("mode is {} instead of {wanted}", status.mode),
            ));
        }
        status
    } else {
        ProjectDataStatus {
            mode: wanted,
            ..current
        }
    };

    Ok(ModeChange { plan, status })
}
