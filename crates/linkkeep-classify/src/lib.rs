//! Rule-based classification of discovered links.
//!
//! Rules are an ordered list of categories, each with shell-glob patterns.
//! A link belongs to the first category with a pattern matching its
//! absolute path, its path relative to the scan root, or its bare name.
//! Links no rule matches land in `unclassified`, which is always emitted
//! last.
//!
//! # Hierarchy
//!
//! For hierarchical output the secondary category and project name are
//! read off the link path after the matched pattern's literal prefix:
//!
//! ```rust,no_run
//! use linkkeep_classify::{ClassificationRules, Classifier};
//! use linkkeep_scan::{LinkScanner, ScanConfig};
//! use std::path::Path;
//!
//! let rules = ClassificationRules::load_markdown(Path::new("projects.md"));
//! let scan = LinkScanner::new().scan(&ScanConfig::new("/home/me")).unwrap();
//!
//! let classifier = Classifier::new(&rules, Some(&scan.root));
//! for (primary, secondaries) in classifier.classify_hierarchy(&scan.records) {
//!     for (secondary, records) in secondaries {
//!         println!("{primary}/{secondary}: {} links", records.len());
//!     }
//! }
//! ```

mod classifier;
mod hierarchy;
mod rules;

pub use classifier::{Classifier, FlatGroups, HierarchyGroups};
pub use hierarchy::{ROOT_SECONDARY, derive_hierarchy};
pub use rules::{ClassificationRules, RulesError, default_rules_path};

// Re-export core types
pub use linkkeep_core::{LinkRecord, UNCLASSIFIED};
