//! Scan result container and statistics.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::error::ScanWarning;
use crate::record::LinkRecord;

/// Counters collected while scanning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    /// Directories read.
    pub dirs_visited: u64,
    /// Symlinks encountered, before filtering.
    pub links_seen: u64,
    /// Emitted records whose chain is broken.
    pub broken: u64,
    /// Deepest level reached.
    pub max_depth: u32,
    /// Links dropped for a garbled name.
    pub filtered_garbled: u64,
    /// Links dropped by the include/exclude patterns.
    pub filtered_pattern: u64,
    /// Links dropped for a hash-like target name.
    pub filtered_hash_like: u64,
    /// Links dropped because the target is not a directory.
    pub filtered_not_dir: u64,
}

impl ScanStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a directory read.
    pub fn record_dir(&mut self, depth: u32) {
        self.dirs_visited += 1;
        self.max_depth = self.max_depth.max(depth);
    }

    /// Total links dropped by any filter.
    pub fn total_filtered(&self) -> u64 {
        self.filtered_garbled + self.filtered_pattern + self.filtered_hash_like + self.filtered_not_dir
    }
}

/// Outcome of one scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkScan {
    /// Root path that was scanned.
    pub root: PathBuf,

    /// Emitted records, sorted by source path.
    pub records: Vec<LinkRecord>,

    /// Recovered access errors.
    pub warnings: Vec<ScanWarning>,

    /// Summary statistics.
    pub stats: ScanStats,

    /// When this scan finished.
    pub scanned_at: SystemTime,

    /// Duration of the scan.
    pub scan_duration: Duration,
}

impl LinkScan {
    /// Create a scan result. Records are sorted by source path.
    pub fn new(
        root: PathBuf,
        mut records: Vec<LinkRecord>,
        warnings: Vec<ScanWarning>,
        stats: ScanStats,
        scan_duration: Duration,
    ) -> Self {
        records.sort_by(|a, b| a.source_path.cmp(&b.source_path));
        Self {
            root,
            records,
            warnings,
            stats,
            scanned_at: SystemTime::now(),
            scan_duration,
        }
    }

    /// Number of emitted records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no records were emitted.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Check if there were any warnings during scanning.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
