//! Migration engine for linkkeep.
//!
//! This crate relocates the real directories that symlinks point at and
//! keeps every referencing link consistent. All operations are
//! synchronous and follow the same plan, execute, verify sequence; pass
//! [`Execution::Preview`] to get the plan without changing anything.
//!
//! - [`migrate_and_relink`] moves a directory and retargets (or inlines)
//!   its links
//! - [`move_and_delete_links`] moves a directory and removes its links
//! - [`materialize_links_in_place`] swaps links for copies of their target
//! - [`rewrite_links_to_relative`] rewrites link text without moving data
//! - [`validate_target_change`] is a standalone pre-flight check
//!
//! ```rust,no_run
//! use linkkeep_ops::{Execution, MigrationRequest, migrate_and_relink};
//! use linkkeep_core::{ConflictStrategy, LinkMode};
//! use std::path::PathBuf;
//!
//! let request = MigrationRequest::builder()
//!     .current_target("/home/me/Data/app")
//!     .new_target("/home/me/Archive/app")
//!     .links(vec![PathBuf::from("/home/me/projects/app/data")])
//!     .link_mode(LinkMode::Relative)
//!     .conflict(ConflictStrategy::Backup)
//!     .build()
//!     .unwrap();
//!
//! for step in &migrate_and_relink(&request, Execution::Preview).unwrap() {
//!     println!("{step}");
//! }
//! ```

mod action;
mod audit;
mod conflict;
mod error;
mod fsops;
mod migrate;
mod project;
mod validate;

use std::str::FromStr;

pub use action::{ActionKind, Execution, MigrationAction, MigrationPlan};
pub use audit::{AuditError, AuditPhase, append_audit_log};
pub use conflict::derive_backup_path;
pub use error::MigrationError;
pub use fsops::relative_path;
pub use migrate::{
    MigrationRequest, MigrationRequestBuilder, materialize_links_in_place, migrate_and_relink,
    move_and_delete_links, rewrite_links_to_relative,
};
pub use project::{
    DATA_DIR_NAME, ModeChange, ProjectDataMode, ProjectDataStatus, project_data_status,
    set_project_data_mode,
};
pub use validate::{FORBIDDEN_PREFIXES, ValidationReport, validate_target_change};

// Re-export core types for convenience
pub use linkkeep_core::{ConflictStrategy, LinkMode, LinkRecord};

/// Parse a link mode name, reporting unknown names as a precondition failure.
pub fn parse_link_mode(value: &str) -> Result<LinkMode, MigrationError> {
    LinkMode::from_str(value).map_err(|_| MigrationError::InvalidLinkMode {
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_link_mode() {
        assert_eq!(parse_link_mode("absolute").unwrap(), LinkMode::Absolute);
        let err = parse_link_mode("hardlink").unwrap_err();
        assert!(matches!(err, MigrationError::InvalidLinkMode { .. }));
        assert!(err.is_precondition());
    }
}
