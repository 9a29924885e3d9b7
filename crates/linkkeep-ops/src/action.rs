//! Planned migration steps.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use strum::Display;

/// Whether a plan is only described or also carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Execution {
    /// Build and return the plan without touching the filesystem.
    #[default]
    Preview,
    /// Build the plan, execute it and verify the result.
    Apply,
}

impl Execution {
    /// Create from an "apply" flag.
    pub fn from_apply(apply: bool) -> Self {
        if apply { Self::Apply } else { Self::Preview }
    }

    pub fn is_apply(&self) -> bool {
        matches!(self, Self::Apply)
    }
}

/// Kind of a single migration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ActionKind {
    /// Rename an existing destination out of the way.
    Backup,
    /// Move the real directory.
    Move,
    /// Rewrite a symlink's text.
    Retarget,
    /// Replace a symlink with a copy of its target, leaving the target in place.
    Materialize,
    /// Delete a symlink.
    Unlink,
    /// Replace a symlink with a copy of the moved data.
    InlineCopy,
}

impl ActionKind {
    /// Whether the step acts on a link rather than on a data directory.
    pub fn is_link_action(&self) -> bool {
        !matches!(self, Self::Backup | Self::Move)
    }
}

/// One concrete step of a [`MigrationPlan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationAction {
    pub kind: ActionKind,
    /// The directory being moved, or the link being changed.
    pub path: PathBuf,
    /// Backup or move destination, or the directory the link ends up at.
    pub target: PathBuf,
    /// Text written into the link for retargets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_text: Option<PathBuf>,
}

impl MigrationAction {
    fn new(kind: ActionKind, path: &Path, target: &Path) -> Self {
        Self {
            kind,
            path: path.to_path_buf(),
            target: target.to_path_buf(),
            link_text: None,
        }
    }

    pub fn backup(existing: &Path, backup: &Path) -> Self {
        Self::new(ActionKind::Backup, existing, backup)
    }

    pub fn move_dir(from: &Path, to: &Path) -> Self {
        Self::new(ActionKind::Move, from, to)
    }

    pub fn retarget(link: &Path, target: &Path, link_text: PathBuf) -> Self {
        Self {
            link_text: Some(link_text),
            ..Self::new(ActionKind::Retarget, link, target)
        }
    }

    pub fn materialize(link: &Path, source: &Path) -> Self {
        Self::new(ActionKind::Materialize, link, source)
    }

    pub fn unlink(link: &Path, data: &Path) -> Self {
        Self::new(ActionKind::Unlink, link, data)
    }

    pub fn inline_copy(link: &Path, source: &Path) -> Self {
        Self::new(ActionKind::InlineCopy, link, source)
    }
}

impl fmt::Display for MigrationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self.path.display();
        let target = self.target.display();
        match self.kind {
            ActionKind::Backup => write!(f, "Backup: {path} -> {target}"),
            ActionKind::Move => write!(f, "Move: {path} -> {target}"),
            ActionKind::Retarget => {
                let text = self.link_text.as_deref().unwrap_or(&self.target);
                let style = if text.is_absolute() { "absolute" } else { "relative" };
                write!(f, "Link: {path} -> {} ({style}, target={target})", text.display())
            }
            ActionKind::Materialize => write!(f, "Materialize: {path} <= {target}"),
            ActionKind::Unlink => write!(f, "Unlink: {path}"),
            ActionKind::InlineCopy => write!(f, "Inline: {path} <= {target}"),
        }
    }
}

/// Ordered list of steps. Execution stops at the first failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MigrationPlan {
    actions: Vec<MigrationAction>,
}

impl MigrationPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: MigrationAction) {
        self.actions.push(action);
    }

    pub fn actions(&self) -> &[MigrationAction] {
        &self.actions
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MigrationAction> {
        self.actions.iter()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Human-readable description of every step.
    pub fn descriptions(&self) -> Vec<String> {
        self.actions.iter().map(ToString::to_string).collect()
    }
}

impl<'a> IntoIterator for &'a MigrationPlan {
    type Item = &'a MigrationAction;
    type IntoIter = std::slice::Iter<'a, MigrationAction>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}

impl FromIterator<MigrationAction> for MigrationPlan {
    fn from_iter<I: IntoIterator<Item = MigrationAction>>(iter: I) -> Self {
        Self {
            actions: iter.into_iter().collect(),
        }
    }
}
