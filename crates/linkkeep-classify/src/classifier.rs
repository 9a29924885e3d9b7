//! First-match-wins classification of link records.

use std::path::{Path, PathBuf};

use globset::GlobMatcher;
use indexmap::IndexMap;
use tracing::{debug, warn};

use linkkeep_core::pattern::{expand_home, shell_glob};
use linkkeep_core::{LinkRecord, UNCLASSIFIED};

use crate::hierarchy::derive_hierarchy;
use crate::rules::ClassificationRules;

/// Flat grouping: category to records.
pub type FlatGroups = IndexMap<String, Vec<LinkRecord>>;

/// Hierarchical grouping: primary to secondary to records.
pub type HierarchyGroups = IndexMap<String, IndexMap<String, Vec<LinkRecord>>>;

struct CompiledPattern {
    /// Pattern text after `~` expansion.
    text: String,
    matcher: GlobMatcher,
}

struct CompiledRule {
    category: String,
    patterns: Vec<CompiledPattern>,
}

/// Compiled rules bound to a scan root.
pub struct Classifier {
    rules: Vec<CompiledRule>,
    scan_root: Option<PathBuf>,
}

impl Classifier {
    /// Compile `rules`. Invalid patterns are logged and skipped.
    pub fn new(rules: &ClassificationRules, scan_root: Option<&Path>) -> Self {
        let rules = rules
            .iter()
            .map(|(category, patterns)| CompiledRule {
                category: category.to_string(),
                patterns: patterns.iter().filter_map(|p| compile(p)).collect(),
            })
            .collect();

        Self {
            rules,
            scan_root: scan_root.map(Path::to_path_buf),
        }
    }

    /// Category and expanded pattern of the first rule matching `record`.
    pub fn match_record(&self, record: &LinkRecord) -> Option<(&str, &str)> {
        let candidates = self.candidates(&record.source_path);
        self.rules.iter().find_map(|rule| {
            rule.patterns
                .iter()
                .find(|p| candidates.iter().any(|c| p.matcher.is_match(c)))
                .map(|p| (rule.category.as_str(), p.text.as_str()))
        })
    }

    /// Copy of `record` with primary, secondary and project filled in.
    pub fn classify_record(&self, record: &LinkRecord) -> LinkRecord {
        match self.match_record(record) {
            Some((category, pattern)) => {
                let (secondary, project) = derive_hierarchy(&record.source_path, pattern);
                debug!(
                    "{} -> {category}/{secondary}/{project}",
                    record.source_path.display()
                );
                record.with_classification(category, secondary, project)
            }
            None => record.with_classification(UNCLASSIFIED, UNCLASSIFIED, UNCLASSIFIED),
        }
    }

    /// Group records by primary category.
    ///
    /// Every declared category is present, possibly empty, followed by
    /// `unclassified`.
    pub fn classify(&self, records: &[LinkRecord]) -> FlatGroups {
        let mut groups: FlatGroups = self
            .rules
            .iter()
            .map(|r| (r.category.clone(), Vec::new()))
            .collect();
        groups.shift_remove(UNCLASSIFIED);

        let mut unclassified = Vec::new();
        for record in records {
            let record = self.classify_record(record);
            match record.primary_category.as_deref() {
                Some(category) if category != UNCLASSIFIED => {
                    groups.entry(category.to_string()).or_default().push(record);
                }
                _ => unclassified.push(record),
            }
        }

        groups.insert(UNCLASSIFIED.to_string(), unclassified);
        groups
    }

    /// Group records by primary category, then secondary category.
    ///
    /// Primaries appear in declaration order and only when they received
    /// records; `unclassified` comes last.
    pub fn classify_hierarchy(&self, records: &[LinkRecord]) -> HierarchyGroups {
        let mut groups = HierarchyGroups::new();
        for (primary, records) in self.classify(records) {
            if records.is_empty() {
                continue;
            }
            let by_secondary = groups.entry(primary).or_default();
            for record in records {
                let secondary = record
                    .secondary_category
                    .as_deref()
                    .unwrap_or(UNCLASSIFIED)
                    .to_string();
                by_secondary.entry(secondary).or_default().push(record);
            }
        }
        groups
    }

    fn candidates(&self, path: &Path) -> Vec<String> {
        let mut out = vec![path.to_string_lossy().into_owned()];
        if let Some(relative) = self
            .scan_root
            .as_deref()
            .and_then(|root| path.strip_prefix(root).ok())
        {
            out.push(relative.to_string_lossy().into_owned());
        }
        if let Some(name) = path.file_name() {
            out.push(name.to_string_lossy().into_owned());
        }
        out
    }
}

fn compile(pattern: &str) -> Option<CompiledPattern> {
    let text = expand_home(pattern);
    match shell_glob(&text, false) {
        Ok(matcher) => Some(CompiledPattern { text, matcher }),
        Err(err) => {
            warn!("Skipping invalid classification pattern {pattern:?}: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str) -> LinkRecord {
        LinkRecord::new(path, "/data/x", false)
    }

    #[test]
    fn test_candidates() {
        let classifier = Classifier::new(&ClassificationRules::new(), Some(Path::new("/scan")));
        assert_eq!(
            classifier.candidates(Path::new("/scan/a/link")),
            vec!["/scan/a/link", "a/link", "link"]
        );
        assert_eq!(
            classifier.candidates(Path::new("/other/link")),
            vec!["/other/link", "link"]
        );
    }

    #[test]
    fn test_name_candidate_matches() {
        let rules = ClassificationRules::new().with_rule("Data", ["data"]);
        let classifier = Classifier::new(&rules, None);
        let out = classifier.classify_record(&record("/anywhere/deep/data"));
        assert_eq!(out.primary_category.as_deref(), Some("Data"));
    }

    #[test]
    fn test_unclassified_record() {
        let classifier = Classifier::new(&ClassificationRules::new(), None);
        let out = classifier.classify_record(&record("/x/y"));
        assert_eq!(out.primary_category.as_deref(), Some(UNCLASSIFIED));
        assert_eq!(out.secondary_category.as_deref(), Some(UNCLASSIFIED));
        assert_eq!(out.project_name.as_deref(), Some(UNCLASSIFIED));
    }

    #[test]
    fn test_declared_unclassified_stays_last() {
        let rules = ClassificationRules::new()
            .with_rule(UNCLASSIFIED, ["never"])
            .with_rule("A", ["a*"]);
        let groups = Classifier::new(&rules, None).classify(&[record("/p/zz")]);
        let keys: Vec<_> = groups.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["A", UNCLASSIFIED]);
    }
}
