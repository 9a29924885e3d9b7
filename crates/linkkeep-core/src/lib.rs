//! Core types and configuration for linkkeep.
//!
//! This crate provides the value types shared by the scanner, classifier and
//! migration engine: discovered link records, scan and filter configuration,
//! link-handling modes, the scan error taxonomy, and the shell-glob helpers
//! used wherever user patterns are matched.

mod config;
mod error;
mod mode;
mod record;
mod scan;

pub mod pattern;

pub use config::{
    DEFAULT_EXCLUDE_PATTERNS, DEFAULT_HOP_LIMIT, DEFAULT_MAX_DEPTH, DEFAULT_SKIP_DIRS,
    FilterPolicy, HashHeuristic, ScanConfig, ScanConfigBuilder, default_filter_config_path,
};
pub use error::{ConfigError, ScanError, ScanWarning, WarningKind};
pub use mode::{ConflictStrategy, LinkMode};
pub use record::{LinkRecord, UNCLASSIFIED};
pub use scan::{LinkScan, ScanStats};
