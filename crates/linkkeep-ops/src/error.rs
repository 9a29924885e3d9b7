//! Migration error taxonomy.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the migration engine.
///
/// Precondition failures are reported before anything on disk changes.
/// [`Execution`](Self::Execution) and [`Verification`](Self::Verification)
/// mean some steps may already have been applied; completed steps are not
/// rolled back.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Old and new target are the same path.
    #[error("New target equals current target: {path}")]
    SameTarget { path: PathBuf },

    /// The new target lies inside the current target.
    #[error("New target {new_target} cannot be inside current target {current_target}")]
    NestedTarget {
        current_target: PathBuf,
        new_target: PathBuf,
    },

    /// The new target is an ancestor of the current target.
    #[error("New target {new_target} cannot contain current target {current_target}")]
    EnclosingTarget {
        current_target: PathBuf,
        new_target: PathBuf,
    },

    /// The destination exists and the conflict strategy is abort.
    #[error("Destination exists: {path}")]
    DestinationExists { path: PathBuf },

    /// The backup location is already taken.
    #[error("Backup destination exists: {path}")]
    BackupExists { path: PathBuf },

    /// Unknown link-mode string.
    #[error("Invalid link mode: {value} (expected relative, absolute or inline)")]
    InvalidLinkMode { value: String },

    /// A path expected to be a symlink is not one.
    #[error("Not a symlink: {path}")]
    NotASymlink { path: PathBuf },

    /// The requested project mode change cannot be performed.
    #[error("Cannot change {path} from {from} to {to}")]
    UnsupportedModeChange {
        path: PathBuf,
        from: String,
        to: String,
    },

    /// The data to move or copy does not exist.
    #[error("Data directory missing: {path}")]
    MissingData { path: PathBuf },

    /// A filesystem step failed part-way through a plan.
    #[error("Failed to {step} {path}: {source}")]
    Execution {
        step: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A step failed after earlier steps of the plan had been applied.
    #[error("Stopped after {completed} of {total} steps: {source}")]
    Interrupted {
        completed: usize,
        total: usize,
        #[source]
        source: Box<MigrationError>,
    },

    /// Every step ran but the result is not what was planned.
    #[error("Verification failed for {path}: {reason}")]
    Verification { path: PathBuf, reason: String },
}

impl MigrationError {
    pub(crate) fn execution(step: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Execution {
            step,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn verification(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Verification {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error was raised before any change was made.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::SameTarget { .. }
                | Self::NestedTarget { .. }
                | Self::EnclosingTarget { .. }
                | Self::DestinationExists { .. }
                | Self::BackupExists { .. }
                | Self::InvalidLinkMode { .. }
                | Self::NotASymlink { .. }
                | Self::UnsupportedModeChange { .. }
                | Self::MissingData { .. }
        )
    }

    /// Whether some planned steps may already have been applied.
    pub fn is_partially_applied(&self) -> bool {
        !self.is_precondition()
    }

    /// Mark `self` as raised at step `completed` of a `total`-step plan.
    ///
    /// A failure in the first step keeps its own classification.
    pub(crate) fn at_step(self, completed: usize, total: usize) -> Self {
        if completed == 0 {
            return self;
        }
        Self::Interrupted {
            completed,
            total,
            source: Box::new(self),
        }
    }
}
