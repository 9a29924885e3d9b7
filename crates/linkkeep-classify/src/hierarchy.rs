//! Secondary category and project derivation from a link's path.

use std::path::{Component, Path};

use linkkeep_core::pattern::{has_glob_meta, shell_glob};

/// Secondary category used when the link sits directly under the matched prefix.
pub const ROOT_SECONDARY: &str = "root";

const WILDCARD_SUFFIXES: &[&str] = &["/**/*", "/**", "/*", "*"];

/// Derive `(secondary, project)` for a link matched by `pattern`.
///
/// The pattern's trailing wildcard is stripped and the remaining prefix is
/// located among the link path's components. The first two components
/// after it become the secondary category and the project. When the prefix
/// cannot be found the parent directory name and the link name are used.
pub fn derive_hierarchy(link_path: &Path, pattern: &str) -> (String, String) {
    let link_name = file_name(link_path);

    let prefix = strip_wildcard_suffix(pattern);
    let prefix_parts = components(Path::new(prefix));
    let path_parts = components(link_path);

    let Some(end) = locate(&path_parts, &prefix_parts) else {
        let parent = link_path.parent().map(file_name).unwrap_or_default();
        return (parent, link_name);
    };

    match &path_parts[end..] {
        [] => (ROOT_SECONDARY.to_string(), link_name),
        [only] => (ROOT_SECONDARY.to_string(), only.clone()),
        [secondary, project, ..] => (secondary.clone(), project.clone()),
    }
}

fn strip_wildcard_suffix(pattern: &str) -> &str {
    WILDCARD_SUFFIXES
        .iter()
        .find_map(|suffix| pattern.strip_suffix(suffix))
        .unwrap_or(pattern)
}

fn components(path: &Path) -> Vec<String> {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Index just past the first occurrence of `prefix` inside `path`.
fn locate(path: &[String], prefix: &[String]) -> Option<usize> {
    if prefix.is_empty() || prefix.len() > path.len() {
        return None;
    }
    (0..=path.len() - prefix.len())
        .find(|&start| {
            prefix
                .iter()
                .zip(&path[start..])
                .all(|(pat, seg)| segment_matches(pat, seg))
        })
        .map(|start| start + prefix.len())
}

fn segment_matches(pattern: &str, segment: &str) -> bool {
    if !has_glob_meta(pattern) {
        return pattern == segment;
    }
    shell_glob(pattern, false)
        .map(|m| m.is_match(segment))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn derive(path: &str, pattern: &str) -> (String, String) {
        derive_hierarchy(Path::new(path), pattern)
    }

    fn pair(a: &str, b: &str) -> (String, String) {
        (a.to_string(), b.to_string())
    }

    #[test]
    fn test_two_or_more_remaining() {
        assert_eq!(
            derive("/Users/me/Desktop/Projects/MyApp/data", "/Users/*/Desktop/**/*"),
            pair("Projects", "MyApp")
        );
    }

    #[test]
    fn test_one_remaining() {
        assert_eq!(
            derive("/Users/me/Desktop/data", "/Users/*/Desktop/**/*"),
            pair("root", "data")
        );
    }

    #[test]
    fn test_zero_remaining() {
        assert_eq!(derive("/srv/alpha", "/srv/alpha*"), pair("root", "alpha"));
    }

    #[test]
    fn test_relative_prefix_found_mid_path() {
        assert_eq!(
            derive("/scan/alpha/tools/x/link", "alpha/**"),
            pair("tools", "x")
        );
    }

    #[test]
    fn test_prefix_not_found_falls_back() {
        assert_eq!(
            derive("/scan/alpha/foo.ln", "alpha/foo*"),
            pair("alpha", "foo.ln")
        );
        assert_eq!(derive("/scan/misc/zzz.ln", "*"), pair("misc", "zzz.ln"));
    }

    #[test]
    fn test_strip_wildcard_suffix() {
        assert_eq!(strip_wildcard_suffix("/a/**/*"), "/a");
        assert_eq!(strip_wildcard_suffix("/a/**"), "/a");
        assert_eq!(strip_wildcard_suffix("/a/*"), "/a");
        assert_eq!(strip_wildcard_suffix("/a/b*"), "/a/b");
        assert_eq!(strip_wildcard_suffix("/a/b"), "/a/b");
    }
}
