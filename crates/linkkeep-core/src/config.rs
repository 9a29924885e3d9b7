//! Scan and filter configuration types.

use std::path::{Path, PathBuf};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default traversal depth limit.
pub const DEFAULT_MAX_DEPTH: u32 = 20;

/// Default maximum number of hops followed when resolving a link chain.
pub const DEFAULT_HOP_LIMIT: usize = 100;

/// Directory names the scanner never descends into.
pub const DEFAULT_SKIP_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    ".cache",
    ".venv",
    "venv",
    "__pycache__",
    "Library",
];

/// Link names excluded when no filter config says otherwise.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    "python*",
    "pip*",
    "node*",
    "npm*",
    "ruby*",
    "gem*",
    ".git",
    "node_modules",
    "__pycache__",
    ".venv",
    "venv",
];

/// Thresholds for the hash-like target name heuristic.
///
/// The defaults were tuned against content-addressed cache directories
/// (21-character base64-ish object names); treat them as knobs rather than
/// a definition of what a hash looks like.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashHeuristic {
    /// Names shorter than this are never hash-like.
    pub min_len: usize,
    /// Rule (a): exact length of cache object names.
    pub exact_len: usize,
    /// Rule (a): diversity ratio that must be exceeded.
    pub exact_diversity: f64,
    /// Rule (b): shortest base64-like name.
    pub base64_min_len: usize,
    /// Rule (b): longest base64-like name.
    pub base64_max_len: usize,
    /// Rule (b): diversity ratio that must be exceeded.
    pub base64_diversity: f64,
    /// Rule (c): shortest mixed-class name.
    pub mixed_min_len: usize,
    /// Rule (c): longest mixed-class name.
    pub mixed_max_len: usize,
    /// Rule (c): diversity ratio that must be exceeded.
    pub mixed_diversity: f64,
    /// Rule (d): names at least this long are inspected for repeats.
    pub entropy_min_len: usize,
    /// Rule (d): names must also reach this length to be flagged.
    pub entropy_flag_len: usize,
    /// Rule (d): no character may occur more often than this.
    pub entropy_max_repeat: usize,
}

impl Default for HashHeuristic {
    fn default() -> Self {
        Self {
            min_len: 16,
            exact_len: 21,
            exact_diversity: 0.65,
            base64_min_len: 20,
            base64_max_len: 24,
            base64_diversity: 0.6,
            mixed_min_len: 16,
            mixed_max_len: 32,
            mixed_diversity: 0.7,
            entropy_min_len: 18,
            entropy_flag_len: 20,
            entropy_max_repeat: 2,
        }
    }
}

/// Which discovered links are allowed into the pipeline.
///
/// Applied by the scanner before a record is created, so filtered entries
/// never reach classification or migration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterPolicy {
    /// Name globs that always admit a link, even if it is also excluded.
    #[serde(default)]
    pub include_patterns: Vec<String>,

    /// Name globs that drop a link.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Match name globs case-insensitively.
    #[serde(default)]
    pub ignore_case: bool,

    /// Only keep links whose resolved target is a directory.
    #[serde(default = "default_true")]
    pub directories_only: bool,

    /// Drop links whose names look mis-decoded.
    #[serde(default = "default_true")]
    pub reject_garbled_names: bool,

    /// Drop links whose target name looks like a content hash.
    #[serde(default = "default_true")]
    pub reject_hash_like_targets: bool,

    /// Thresholds for the hash-like check.
    #[serde(default)]
    pub hash_heuristic: HashHeuristic,
}

fn default_true() -> bool {
    true
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            include_patterns: Vec::new(),
            exclude_patterns: DEFAULT_EXCLUDE_PATTERNS.iter().map(|p| p.to_string()).collect(),
            ignore_case: false,
            directories_only: true,
            reject_garbled_names: true,
            reject_hash_like_targets: true,
            hash_heuristic: HashHeuristic::default(),
        }
    }
}

/// On-disk shape of `filter.yml`.
#[derive(Debug, Default, Deserialize)]
struct FilterFile {
    #[serde(default)]
    include: Option<PatternSection>,
    #[serde(default)]
    exclude: Option<PatternSection>,
    #[serde(default)]
    ignore_case: Option<bool>,
    #[serde(default)]
    directories_only: Option<bool>,
    #[serde(default)]
    filter_garbled: Option<bool>,
    #[serde(default)]
    filter_hash_targets: Option<bool>,
    #[serde(default)]
    hash_heuristic: Option<HashHeuristic>,
}

/// A pattern list, written either as `key: [..]` or `key: {patterns: [..]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PatternSection {
    Table {
        #[serde(default)]
        patterns: Vec<String>,
    },
    List(Vec<String>),
}

impl PatternSection {
    fn into_patterns(self) -> Vec<String> {
        match self {
            Self::Table { patterns } => patterns,
            Self::List(patterns) => patterns,
        }
    }
}

/// Default location of the YAML filter configuration (`~/.config/lk/filter.yml`).
pub fn default_filter_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("lk").join("filter.yml"))
}

impl FilterPolicy {
    /// A policy that admits every link.
    pub fn permissive() -> Self {
        Self {
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            ignore_case: false,
            directories_only: false,
            reject_garbled_names: false,
            reject_hash_like_targets: false,
            hash_heuristic: HashHeuristic::default(),
        }
    }

    /// Load the filter policy from YAML.
    ///
    /// With no explicit path the default location is tried. A missing file
    /// yields the default policy; an empty exclude list falls back to the
    /// default excludes.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_filter_config_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;

        Self::from_yaml_str(&content).map_err(|source| ConfigError::Parse { path, source })
    }

    /// Parse a policy from YAML text.
    pub fn from_yaml_str(content: &str) -> Result<Self, serde_yaml::Error> {
        let file: FilterFile = if content.trim().is_empty() {
            FilterFile::default()
        } else {
            serde_yaml::from_str::<Option<FilterFile>>(content)?.unwrap_or_default()
        };

        let defaults = Self::default();
        let mut exclude_patterns = file
            .exclude
            .map(PatternSection::into_patterns)
            .unwrap_or_default();
        if exclude_patterns.is_empty() {
            exclude_patterns = defaults.exclude_patterns;
        }

        Ok(Self {
            include_patterns: file
                .include
                .map(PatternSection::into_patterns)
                .unwrap_or_default(),
            exclude_patterns,
            ignore_case: file.ignore_case.unwrap_or(false),
            directories_only: file.directories_only.unwrap_or(true),
            reject_garbled_names: file.filter_garbled.unwrap_or(true),
            reject_hash_like_targets: file.filter_hash_targets.unwrap_or(true),
            hash_heuristic: file.hash_heuristic.unwrap_or_default(),
        })
    }

    /// Append command-line patterns to the configured ones.
    pub fn merge_patterns(mut self, include: &[String], exclude: &[String]) -> Self {
        self.include_patterns.extend(include.iter().cloned());
        self.exclude_patterns.extend(exclude.iter().cloned());
        self
    }
}

/// Configuration for one scan invocation.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ScanConfig {
    /// Root path to scan.
    pub root: PathBuf,

    /// Maximum directory depth to traverse below the root.
    #[builder(default = "DEFAULT_MAX_DEPTH")]
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Directory names never traversed into.
    #[builder(default = "default_skip_dirs()")]
    #[serde(default = "default_skip_dirs")]
    pub skip_dirs: Vec<String>,

    /// Filtering applied to every discovered link.
    #[builder(default)]
    #[serde(default)]
    pub filter: FilterPolicy,

    /// Maximum hops followed when resolving a link chain.
    #[builder(default = "DEFAULT_HOP_LIMIT")]
    #[serde(default = "default_hop_limit")]
    pub hop_limit: usize,
}

fn default_max_depth() -> u32 {
    DEFAULT_MAX_DEPTH
}

fn default_hop_limit() -> usize {
    DEFAULT_HOP_LIMIT
}

fn default_skip_dirs() -> Vec<String> {
    DEFAULT_SKIP_DIRS.iter().map(|d| d.to_string()).collect()
}

impl ScanConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref root) = self.root {
            if root.as_os_str().is_empty() {
                return Err("Root path cannot be empty".to_string());
            }
        } else {
            return Err("Root path is required".to_string());
        }
        if self.hop_limit == Some(0) {
            return Err("Hop limit must be at least 1".to_string());
        }
        Ok(())
    }
}

impl ScanConfig {
    /// Create a new scan config builder.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Create a config for scanning a path with default settings.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_depth: DEFAULT_MAX_DEPTH,
            skip_dirs: default_skip_dirs(),
            filter: FilterPolicy::default(),
            hop_limit: DEFAULT_HOP_LIMIT,
        }
    }

    /// Check whether a directory name is on the skip list.
    pub fn should_skip_dir(&self, name: &str) -> bool {
        self.skip_dirs.iter().any(|d| d == name)
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new(".")
    }
}
