//! Name-based link filtering.

use globset::{GlobSet, GlobSetBuilder};
use linkkeep_core::FilterPolicy;
use linkkeep_core::pattern::build_glob;
use tracing::warn;

/// Compiled include/exclude globs from a [`FilterPolicy`].
///
/// A name matching any include pattern is always admitted. Otherwise a
/// name matching any exclude pattern is dropped, and everything else is
/// admitted.
#[derive(Debug, Clone)]
pub struct NameFilter {
    include: GlobSet,
    exclude: GlobSet,
}

impl NameFilter {
    /// Compile the policy's patterns. Invalid patterns are logged and skipped.
    pub fn new(policy: &FilterPolicy) -> Self {
        Self {
            include: compile(&policy.include_patterns, policy.ignore_case),
            exclude: compile(&policy.exclude_patterns, policy.ignore_case),
        }
    }

    /// Whether a link with this name passes the filter.
    pub fn admits(&self, name: &str) -> bool {
        if self.include.is_match(name) {
            return true;
        }
        !self.exclude.is_match(name)
    }
}

fn compile(patterns: &[String], case_insensitive: bool) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match build_glob(pattern, case_insensitive) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(err) => warn!("Skipping invalid filter pattern {pattern:?}: {err}"),
        }
    }
    builder.build().unwrap_or_else(|err| {
        warn!("Failed to compile filter patterns: {err}");
        GlobSet::empty()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(include: &[&str], exclude: &[&str], ignore_case: bool) -> FilterPolicy {
        FilterPolicy {
            include_patterns: include.iter().map(|s| s.to_string()).collect(),
            exclude_patterns: exclude.iter().map(|s| s.to_string()).collect(),
            ignore_case,
            ..FilterPolicy::default()
        }
    }

    #[test]
    fn test_default_excludes() {
        let filter = NameFilter::new(&FilterPolicy::default());
        assert!(!filter.admits("python3"));
        assert!(!filter.admits("node_modules"));
        assert!(!filter.admits("npm-cache"));
        assert!(filter.admits("data"));
    }

    #[test]
    fn test_include_overrides_exclude() {
        let filter = NameFilter::new(&policy(&["python-data"], &["python*"], false));
        assert!(filter.admits("python-data"));
        assert!(!filter.admits("python3"));
    }

    #[test]
    fn test_ignore_case() {
        let filter = NameFilter::new(&policy(&[], &["Cache*"], true));
        assert!(!filter.admits("cache-dir"));

        let filter = NameFilter::new(&policy(&[], &["Cache*"], false));
        assert!(filter.admits("cache-dir"));
    }

    #[test]
    fn test_invalid_pattern_is_skipped() {
        let filter = NameFilter::new(&policy(&[], &["[unclosed", "tmp*"], false));
        assert!(!filter.admits("tmp1"));
        assert!(filter.admits("[unclosed"));
    }

    #[test]
    fn test_permissive_admits_everything() {
        let filter = NameFilter::new(&FilterPolicy::permissive());
        assert!(filter.admits("python3"));
    }
}
