//! Data-root discovery: which links point into a managed data directory.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use itertools::Itertools;

use linkkeep_core::LinkRecord;

use crate::resolver::absolutize;

/// Records whose resolved target is an existing directory under `data_root`.
///
/// Broken links are never returned.
pub fn links_into_data_root(records: &[LinkRecord], data_root: &Path) -> Vec<LinkRecord> {
    let data_root = absolutize(data_root);
    records
        .iter()
        .filter(|r| !r.is_broken && r.targets_within(&data_root) && r.resolved_target.is_dir())
        .cloned()
        .collect()
}

/// Group records by resolved target.
///
/// Groups are ordered by the lowercase target path relative to
/// `data_root`, falling back to the full path for targets outside it.
/// Records keep their input order within a group.
pub fn group_by_target(
    records: &[LinkRecord],
    data_root: &Path,
) -> IndexMap<PathBuf, Vec<LinkRecord>> {
    let data_root = absolutize(data_root);
    let mut groups: IndexMap<PathBuf, Vec<LinkRecord>> = IndexMap::new();
    for record in records {
        groups
            .entry(record.resolved_target.clone())
            .or_default()
            .push(record.clone());
    }

    groups
        .into_iter()
        .sorted_by_cached_key(|(target, _)| sort_key(target, &data_root))
        .collect()
}

fn sort_key(target: &Path, data_root: &Path) -> String {
    target
        .strip_prefix(data_root)
        .unwrap_or(target)
        .to_string_lossy()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_order_is_case_insensitive() {
        let records = vec![
            LinkRecord::new("/p/one", "/data/beta", false),
            LinkRecord::new("/p/two", "/data/Alpha", false),
            LinkRecord::new("/p/three", "/data/beta", false),
        ];
        let groups = group_by_target(&records, Path::new("/data"));

        let keys: Vec<_> = groups.keys().cloned().collect();
        assert_eq!(
            keys,
            vec![PathBuf::from("/data/Alpha"), PathBuf::from("/data/beta")]
        );
        let beta = &groups[&PathBuf::from("/data/beta")];
        assert_eq!(beta.len(), 2);
        assert_eq!(beta[0].name.as_str(), "one");
        assert_eq!(beta[1].name.as_str(), "three");
    }
}
