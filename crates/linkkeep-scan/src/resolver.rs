//! Symlink chain resolution.
//!
//! Follows a link one hop at a time so that broken and circular chains are
//! reported as data instead of surfacing as I/O errors.

use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

/// Where a link chain ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Canonical target for a healthy chain, best-effort absolute path otherwise.
    pub target: PathBuf,
    /// The chain hits a missing path, a cycle or the hop limit.
    pub is_broken: bool,
}

impl Resolution {
    fn ok(target: PathBuf) -> Self {
        Self {
            target,
            is_broken: false,
        }
    }

    fn broken(target: PathBuf) -> Self {
        Self {
            target,
            is_broken: true,
        }
    }
}

/// Resolve the ultimate target of the symlink at `link_path`.
///
/// Relative link text is interpreted against the directory containing the
/// hop being read. At most `hop_limit` links are followed. Never fails: an
/// unreadable starting link resolves to itself, marked broken.
pub fn resolve(link_path: &Path, hop_limit: usize) -> Resolution {
    let text = match fs::read_link(link_path) {
        Ok(text) => text,
        Err(err) => {
            debug!("Cannot read link {}: {err}", link_path.display());
            return Resolution::broken(link_path.to_path_buf());
        }
    };

    let mut visited = HashSet::new();
    visited.insert(link_identity(link_path));

    let mut current = join_link_text(link_path, &text);
    let mut hops = 1usize;

    loop {
        let metadata = match fs::symlink_metadata(&current) {
            Ok(m) => m,
            Err(_) => return Resolution::broken(absolutize(&current)),
        };

        if !metadata.file_type().is_symlink() {
            let target = current.canonicalize().unwrap_or_else(|_| absolutize(&current));
            return Resolution::ok(target);
        }

        let identity = link_identity(&current);
        if !visited.insert(identity.clone()) {
            debug!("Cycle detected at {}", identity.display());
            return Resolution::broken(identity);
        }
        if hops >= hop_limit {
            debug!("Hop limit {hop_limit} reached at {}", identity.display());
            return Resolution::broken(identity);
        }

        let text = match fs::read_link(&current) {
            Ok(text) => text,
            Err(_) => return Resolution::broken(identity),
        };
        current = join_link_text(&current, &text);
        hops += 1;
    }
}

/// Interpret link text read from `link` as a path.
pub fn join_link_text(link: &Path, text: &Path) -> PathBuf {
    if text.is_absolute() {
        return text.to_path_buf();
    }
    match link.parent() {
        Some(parent) => parent.join(text),
        None => text.to_path_buf(),
    }
}

/// Absolute path naming the link itself, with its parent canonicalized
/// but the final component left unresolved.
pub fn link_identity(path: &Path) -> PathBuf {
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => {
            let parent = parent.canonicalize().unwrap_or_else(|_| absolutize(parent));
            parent.join(name)
        }
        _ => normalize_lexically(&std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())),
    }
}

/// Best-effort absolute form of a path that may not exist.
///
/// The deepest existing ancestor is canonicalized and the remaining
/// components are appended lexically.
pub fn absolutize(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }

    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let normalized = normalize_lexically(&absolute);

    let mut existing = normalized.as_path();
    let mut rest = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            let mut out = canonical;
            for name in rest.iter().rev() {
                out.push(name);
            }
            return out;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name.to_os_string());
                existing = parent;
            }
            _ => return normalized,
        }
    }
}

/// Drop `.` components and fold `..` into the preceding component.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    fn canonical(dir: &TempDir) -> PathBuf {
        dir.path().canonicalize().unwrap()
    }

    #[test]
    fn test_single_hop() {
        let dir = TempDir::new().unwrap();
        let root = canonical(&dir);
        fs::create_dir(root.join("real")).unwrap();
        symlink("real", root.join("link")).unwrap();

        let res = resolve(&root.join("link"), 100);
        assert_eq!(res, Resolution::ok(root.join("real")));
    }

    #[test]
    fn test_relative_text_is_relative_to_each_hop() {
        let dir = TempDir::new().unwrap();
        let root = canonical(&dir);
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::create_dir(root.join("target")).unwrap();
        // a/b/inner -> ../../target, top -> a/b/inner
        symlink("../../target", root.join("a/b/inner")).unwrap();
        symlink("a/b/inner", root.join("top")).unwrap();

        let res = resolve(&root.join("top"), 100);
        assert!(!res.is_broken);
        assert_eq!(res.target, root.join("target"));
    }

    #[test]
    fn test_chain_within_limit() {
        let dir = TempDir::new().unwrap();
        let root = canonical(&dir);
        fs::create_dir(root.join("end")).unwrap();
        // l0 -> l1 -> l2 -> end: three links.
        symlink("end", root.join("l2")).unwrap();
        symlink("l2", root.join("l1")).unwrap();
        symlink("l1", root.join("l0")).unwrap();

        assert!(!resolve(&root.join("l0"), 3).is_broken);
        assert!(resolve(&root.join("l0"), 2).is_broken);
    }

    #[test]
    fn test_missing_target_is_broken() {
        let dir = TempDir::new().unwrap();
        let root = canonical(&dir);
        symlink("gone/deeper", root.join("dangling")).unwrap();

        let res = resolve(&root.join("dangling"), 100);
        assert!(res.is_broken);
        assert_eq!(res.target, root.join("gone/deeper"));
    }

    #[test]
    fn test_mutual_cycle() {
        let dir = TempDir::new().unwrap();
        let root = canonical(&dir);
        symlink("b", root.join("a")).unwrap();
        symlink("a", root.join("b")).unwrap();

        let a = resolve(&root.join("a"), 100);
        let b = resolve(&root.join("b"), 100);
        assert!(a.is_broken);
        assert!(b.is_broken);
        assert_eq!(a.target, root.join("a"));
        assert_eq!(b.target, root.join("b"));
    }

    #[test]
    fn test_self_loop() {
        let dir = TempDir::new().unwrap();
        let root = canonical(&dir);
        symlink("me", root.join("me")).unwrap();

        assert!(resolve(&root.join("me"), 100).is_broken);
    }

    #[test]
    fn test_not_a_link() {
        let dir = TempDir::new().unwrap();
        let root = canonical(&dir);
        let res = resolve(&root.join("nothing"), 100);
        assert_eq!(res, Resolution::broken(root.join("nothing")));
    }

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(normalize_lexically(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize_lexically(Path::new("/../x")), PathBuf::from("/x"));
        assert_eq!(normalize_lexically(Path::new("../x")), PathBuf::from("../x"));
    }

    #[test]
    fn test_absolutize_canonicalizes_existing_prefix() {
        let dir = TempDir::new().unwrap();
        let root = canonical(&dir);
        fs::create_dir(root.join("real")).unwrap();
        symlink("real", root.join("alias")).unwrap();

        assert_eq!(
            absolutize(&root.join("alias/missing/../file")),
            root.join("real/file")
        );
    }
}
