//! Link-handling modes and conflict strategies.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How links are rewritten once their data has moved.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LinkMode {
    /// Link text is a path relative to the link's parent directory.
    #[default]
    Relative,
    /// Link text is the absolute target path.
    Absolute,
    /// The link is replaced by a full copy of the data.
    Inline,
}

impl LinkMode {
    /// Whether this mode leaves a symlink in place.
    pub fn is_symlink(&self) -> bool {
        !matches!(self, Self::Inline)
    }
}

/// What to do when the migration destination already exists.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConflictStrategy {
    /// Refuse to touch anything.
    #[default]
    Abort,
    /// Rename the existing destination to a timestamped sibling first.
    Backup,
}
