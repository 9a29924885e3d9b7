//! Symlink discovery and resolution engine for linkkeep.
//!
//! # Overview
//!
//! `linkkeep-scan` walks a directory tree and turns every symlink it meets
//! into a [`LinkRecord`]. Key features:
//!
//! - **Chain resolution** hop by hop, with broken and circular chains
//!   reported as data rather than errors
//! - **Bounded traversal** with an explicit stack, a depth limit and a
//!   skip list; symlinked directories are never entered
//! - **Filtering** by name globs, garbled names, hash-like target names
//!   and target kind
//! - **Data-root grouping** of links that share a target
//!
//! # Example
//!
//! ```rust,no_run
//! use linkkeep_scan::{LinkScanner, ScanConfig};
//!
//! let config = ScanConfig::new("/path/to/scan");
//! let scan = LinkScanner::new().scan(&config).unwrap();
//!
//! for record in &scan.records {
//!     let state = if record.is_broken { "broken" } else { "ok" };
//!     println!("{} -> {} ({state})", record.source_path.display(), record.resolved_target.display());
//! }
//! ```

mod filter;
mod heuristics;
mod resolver;
mod scanner;
mod summary;
mod targets;

pub use filter::NameFilter;
pub use heuristics::{is_garbled_name, is_hash_like_name};
pub use resolver::{
    Resolution, absolutize, join_link_text, link_identity, normalize_lexically, resolve,
};
pub use scanner::LinkScanner;
pub use summary::{TreeSummary, tree_summary};
pub use targets::{group_by_target, links_into_data_root};

// Re-export core types for convenience
pub use linkkeep_core::{
    FilterPolicy, HashHeuristic, LinkRecord, LinkScan, ScanConfig, ScanError, ScanStats,
    ScanWarning, WarningKind,
};
