//! Discovered link records.

use std::path::{Path, PathBuf};

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Category assigned to records no rule matched.
pub const UNCLASSIFIED: &str = "unclassified";

/// A symlink found by the scanner.
///
/// `resolved_target` is always populated: for broken or cyclic chains it
/// holds the last path visited before the failure was detected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    /// The symlink itself.
    pub source_path: PathBuf,
    /// File name of the symlink.
    pub name: CompactString,
    /// Best-effort absolute end of the link chain.
    pub resolved_target: PathBuf,
    /// Chain ends in a missing path or a cycle.
    pub is_broken: bool,
    /// Category from the first matching classification rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_category: Option<CompactString>,
    /// Second hierarchy level derived from the path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_category: Option<CompactString>,
    /// Project name derived from the path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<CompactString>,
}

impl LinkRecord {
    /// Create an unclassified record.
    pub fn new(source_path: impl Into<PathBuf>, resolved_target: impl Into<PathBuf>, is_broken: bool) -> Self {
        let source_path = source_path.into();
        let name = source_path
            .file_name()
            .map(|n| CompactString::new(n.to_string_lossy()))
            .unwrap_or_default();
        Self {
            source_path,
            name,
            resolved_target: resolved_target.into(),
            is_broken,
            primary_category: None,
            secondary_category: None,
            project_name: None,
        }
    }

    /// Copy of this record with classification attached.
    pub fn with_classification(
        &self,
        primary: impl Into<CompactString>,
        secondary: impl Into<CompactString>,
        project: impl Into<CompactString>,
    ) -> Self {
        Self {
            primary_category: Some(primary.into()),
            secondary_category: Some(secondary.into()),
            project_name: Some(project.into()),
            ..self.clone()
        }
    }

    /// Copy of this record with only the primary category set.
    pub fn with_primary(&self, primary: impl Into<CompactString>) -> Self {
        Self {
            primary_category: Some(primary.into()),
            ..self.clone()
        }
    }

    /// Whether the record has been classified.
    pub fn is_classified(&self) -> bool {
        self.primary_category.is_some()
    }

    /// Whether the resolved target lies inside `root`.
    pub fn targets_within(&self, root: &Path) -> bool {
        self.resolved_target.starts_with(root)
    }
}
