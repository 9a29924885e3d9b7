//! Depth-limited symlink scanner.

use std::fs::{self, DirEntry};
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, warn};

use linkkeep_core::{
    FilterPolicy, LinkRecord, LinkScan, ScanConfig, ScanError, ScanStats, ScanWarning,
};

use crate::filter::NameFilter;
use crate::heuristics::{is_garbled_name, is_hash_like_name};
use crate::resolver::resolve;

/// Single-threaded scanner that walks real directories and records the
/// symlinks it meets.
///
/// Symlinked directories are recorded but never entered, so the walk
/// cannot loop.
#[derive(Debug, Default)]
pub struct LinkScanner;

/// Mutable state for one walk.
struct Walk<'a> {
    config: &'a ScanConfig,
    policy: &'a FilterPolicy,
    names: NameFilter,
    records: Vec<LinkRecord>,
    warnings: Vec<ScanWarning>,
    stats: ScanStats,
}

impl LinkScanner {
    /// Create a new scanner.
    pub fn new() -> Self {
        Self
    }

    /// Scan `config.root` for symlinks.
    ///
    /// Only a missing or non-directory root fails; any error met while
    /// walking becomes a warning on the result.
    pub fn scan(&self, config: &ScanConfig) -> Result<LinkScan, ScanError> {
        let start = Instant::now();
        let root = config
            .root
            .canonicalize()
            .map_err(|e| ScanError::io(&config.root, e))?;

        if !root.is_dir() {
            return Err(ScanError::NotADirectory { path: root });
        }

        let mut walk = Walk {
            config,
            policy: &config.filter,
            names: NameFilter::new(&config.filter),
            records: Vec::new(),
            warnings: Vec::new(),
            stats: ScanStats::new(),
        };

        let mut stack: Vec<(PathBuf, u32)> = vec![(root.clone(), 0)];
        while let Some((dir, depth)) = stack.pop() {
            walk.visit_dir(&dir, depth, &mut stack);
        }

        debug!(
            "Scanned {} directories, {} links seen, {} kept",
            walk.stats.dirs_visited,
            walk.stats.links_seen,
            walk.records.len()
        );

        Ok(LinkScan::new(
            root,
            walk.records,
            walk.warnings,
            walk.stats,
            start.elapsed(),
        ))
    }
}

impl Walk<'_> {
    fn visit_dir(&mut self, dir: &Path, depth: u32, stack: &mut Vec<(PathBuf, u32)>) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                self.warn(ScanWarning::from_io(dir, &err));
                return;
            }
        };
        self.stats.record_dir(depth);

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    self.warn(ScanWarning::from_io(dir, &err));
                    continue;
                }
            };
            self.visit_entry(&entry, depth, stack);
        }
    }

    fn visit_entry(&mut self, entry: &DirEntry, depth: u32, stack: &mut Vec<(PathBuf, u32)>) {
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(err) => {
                self.warn(ScanWarning::from_io(&path, &err));
                return;
            }
        };

        if file_type.is_symlink() {
            let name = entry.file_name().to_string_lossy().into_owned();
            self.inspect_link(path, &name);
        } else if file_type.is_dir() && depth < self.config.max_depth {
            let name = entry.file_name();
            if self.config.should_skip_dir(&name.to_string_lossy()) {
                debug!("Skipping directory {}", path.display());
            } else {
                stack.push((path, depth + 1));
            }
        }
    }

    fn inspect_link(&mut self, path: PathBuf, name: &str) {
        self.stats.links_seen += 1;

        if self.policy.reject_garbled_names && is_garbled_name(name) {
            debug!("Dropping garbled link name {}", path.display());
            self.stats.filtered_garbled += 1;
            return;
        }

        if !self.names.admits(name) {
            debug!("Dropping {} by name pattern", path.display());
            self.stats.filtered_pattern += 1;
            return;
        }

        let resolution = resolve(&path, self.config.hop_limit);

        if !resolution.is_broken && self.policy.reject_hash_like_targets {
            let target_name = resolution
                .target
                .file_name()
                .map(|n| n.to_string_lossy())
                .unwrap_or_default();
            if is_hash_like_name(&target_name, &self.policy.hash_heuristic) {
                debug!(
                    "Dropping {} with hash-like target {}",
                    path.display(),
                    resolution.target.display()
                );
                self.stats.filtered_hash_like += 1;
                return;
            }
        }

        if !resolution.is_broken && self.policy.directories_only && !resolution.target.is_dir() {
            debug!("Dropping {} pointing at a non-directory", path.display());
            self.stats.filtered_not_dir += 1;
            return;
        }

        if resolution.is_broken {
            self.stats.broken += 1;
        }
        self.records
            .push(LinkRecord::new(path, resolution.target, resolution.is_broken));
    }

    fn warn(&mut self, warning: ScanWarning) {
        warn!("{}", warning.message);
        self.warnings.push(warning);
    }
}
