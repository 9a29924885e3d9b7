//! Filesystem primitives used by the migration engine.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use linkkeep_scan::{absolutize, normalize_lexically};

use crate::error::MigrationError;

/// Whether anything, including a dangling symlink, exists at `path`.
pub(crate) fn path_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Whether `path` itself is a symlink.
pub(crate) fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

/// Whether `path` is a real directory, not a link to one.
pub(crate) fn is_real_dir(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_dir())
        .unwrap_or(false)
}

/// Canonical form of the directory that will hold `link`.
pub(crate) fn link_parent(link: &Path) -> PathBuf {
    let parent = link.parent().unwrap_or(Path::new("/"));
    absolutize(parent)
}

/// Path from `base` to `target`, both absolute.
pub fn relative_path(target: &Path, base: &Path) -> PathBuf {
    let target = normalize_lexically(target);
    let base = normalize_lexically(base);
    let target: Vec<Component<'_>> = target.components().collect();
    let base: Vec<Component<'_>> = base.components().collect();

    let common = target
        .iter()
        .zip(&base)
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in common..base.len() {
        out.push("..");
    }
    for component in &target[common..] {
        out.push(component.as_os_str());
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Link text that makes `link` point at `target`.
pub(crate) fn link_text_for(link: &Path, target: &Path, relative: bool) -> PathBuf {
    if relative {
        relative_path(target, &link_parent(link))
    } else {
        target.to_path_buf()
    }
}

#[cfg(unix)]
pub(crate) fn make_symlink(text: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(text, link)
}

#[cfg(not(unix))]
pub(crate) fn make_symlink(_text: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symlinks are only supported on unix",
    ))
}

/// Replace the symlink at `link` with one containing `text`.
///
/// The new link is created beside the old one and renamed over it, so the
/// path never disappears.
pub(crate) fn retarget_link(link: &Path, text: &Path) -> Result<(), MigrationError> {
    if !is_symlink(link) {
        return Err(MigrationError::NotASymlink {
            path: link.to_path_buf(),
        });
    }

    let name = link
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let staging = link.with_file_name(format!(".{name}.lk-{}", std::process::id()));
    if is_symlink(&staging) {
        fs::remove_file(&staging)
            .map_err(|e| MigrationError::execution("clear stale link", &staging, e))?;
    }

    make_symlink(text, &staging)
        .map_err(|e| MigrationError::execution("create link", &staging, e))?;
    if let Err(err) = fs::rename(&staging, link) {
        let _ = fs::remove_file(&staging);
        return Err(MigrationError::execution("replace link", link, err));
    }
    Ok(())
}

/// Delete the symlink at `link`.
pub(crate) fn remove_link(link: &Path) -> Result<(), MigrationError> {
    if !is_symlink(link) {
        return Err(MigrationError::NotASymlink {
            path: link.to_path_buf(),
        });
    }
    fs::remove_file(link).map_err(|e| MigrationError::execution("remove link", link, e))
}

fn is_cross_device(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::CrossesDevices || err.raw_os_error() == Some(18)
}

/// Move a directory, creating missing parents of `to`.
///
/// Falls back to copy and delete when `from` and `to` are on different
/// filesystems.
pub(crate) fn move_dir(from: &Path, to: &Path) -> Result<(), MigrationError> {
    if path_exists(to) {
        return Err(MigrationError::DestinationExists {
            path: to.to_path_buf(),
        });
    }
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| MigrationError::execution("create parent directory", parent, e))?;
    }

    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(err) if is_cross_device(&err) => {
            copy_tree(from, to)?;
            fs::remove_dir_all(from).map_err(|e| MigrationError::execution("remove source", from, e))
        }
        Err(err) => Err(MigrationError::execution("move", from, err)),
    }
}

/// Recursively copy `source` to `dest`.
///
/// Symlinks inside the tree are recreated with the same text, never
/// followed.
pub(crate) fn copy_tree(source: &Path, dest: &Path) -> Result<(), MigrationError> {
    fs::create_dir_all(dest).map_err(|e| MigrationError::execution("create directory", dest, e))?;

    let entries = fs::read_dir(source).map_err(|e| MigrationError::execution("read directory", source, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| MigrationError::execution("read directory", source, e))?;
        let path = entry.path();
        let dest_path = dest.join(entry.file_name());
        let file_type = entry
            .file_type()
            .map_err(|e| MigrationError::execution("inspect", &path, e))?;

        if file_type.is_symlink() {
            let text = fs::read_link(&path).map_err(|e| MigrationError::execution("read link", &path, e))?;
            make_symlink(&text, &dest_path)
                .map_err(|e| MigrationError::execution("create link", &dest_path, e))?;
        } else if file_type.is_dir() {
            copy_tree(&path, &dest_path)?;
        } else {
            fs::copy(&path, &dest_path).map_err(|e| MigrationError::execution("copy", &path, e))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_relative_path() {
        assert_eq!(
            relative_path(Path::new("/home/me/Data/app"), Path::new("/home/me/projects/app")),
            PathBuf::from("../../Data/app")
        );
        assert_eq!(
            relative_path(Path::new("/a/b/c"), Path::new("/a/b")),
            PathBuf::from("c")
        );
        assert_eq!(relative_path(Path::new("/a"), Path::new("/a")), PathBuf::from("."));
        assert_eq!(relative_path(Path::new("/x"), Path::new("/a/b")), PathBuf::from("../../x"));
    }

    #[test]
    fn test_move_dir_creates_parents() {
        let dir = TempDir::new().unwrap();
        let from = dir.path().join("old");
        fs::create_dir(&from).unwrap();
        fs::write(from.join("f.txt"), b"hello").unwrap();
        let to = dir.path().join("deep/er/new");

        move_dir(&from, &to).unwrap();

        assert!(!from.exists());
        assert_eq!(fs::read(to.join("f.txt")).unwrap(), b"hello");
    }

    #[test]
    fn test_move_dir_refuses_existing() {
        let dir = TempDir::new().unwrap();
        let from = dir.path().join("old");
        let to = dir.path().join("new");
        fs::create_dir(&from).unwrap();
        fs::create_dir(&to).unwrap();

        assert!(matches!(
            move_dir(&from, &to),
            Err(MigrationError::DestinationExists { .. })
        ));
        assert!(from.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_tree_keeps_inner_links() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("sub")).unwrap();
        fs::write(src.join("sub/file"), b"data").unwrap();
        std::os::unix::fs::symlink("sub/file", src.join("alias")).unwrap();

        let dest = dir.path().join("dest");
        copy_tree(&src, &dest).unwrap();

        assert_eq!(fs::read(dest.join("sub/file")).unwrap(), b"data");
        assert!(is_symlink(&dest.join("alias")));
        assert_eq!(fs::read_link(dest.join("alias")).unwrap(), PathBuf::from("sub/file"));
    }

    #[cfg(unix)]
    #[test]
    fn test_retarget_link() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();
        fs::create_dir(dir.path().join("b")).unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink("a", &link).unwrap();

        retarget_link(&link, Path::new("b")).unwrap();
        assert_eq!(fs::read_link(&link).unwrap(), PathBuf::from("b"));

        let plain = dir.path().join("a");
        assert!(matches!(
            retarget_link(&plain, Path::new("b")),
            Err(MigrationError::NotASymlink { .. })
        ));
    }
}
