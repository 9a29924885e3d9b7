#![cfg(unix)]

use linkkeep_scan::{
    FilterPolicy, LinkScanner, ScanConfig, ScanError, group_by_target, links_into_data_root,
};
use std::fs;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn root_of(dir: &TempDir) -> PathBuf {
    dir.path().canonicalize().unwrap()
}

fn names(scan: &linkkeep_scan::LinkScan) -> Vec<String> {
    scan.records.iter().map(|r| r.name.to_string()).collect()
}

fn permissive(root: &Path) -> ScanConfig {
    ScanConfig::builder()
        .root(root.to_path_buf())
        .filter(FilterPolicy::permissive())
        .build()
        .unwrap()
}

#[test]
fn test_scan_finds_links_and_sorts() {
    let dir = TempDir::new().unwrap();
    let root = root_of(&dir);
    fs::create_dir_all(root.join("data/app")).unwrap();
    fs::create_dir_all(root.join("projects/app")).unwrap();
    symlink(root.join("data/app"), root.join("projects/app/data")).unwrap();
    symlink("../data/app", root.join("projects/alias")).unwrap();

    let scan = LinkScanner::new().scan(&ScanConfig::new(&root)).unwrap();

    assert_eq!(scan.root, root);
    assert_eq!(names(&scan), vec!["alias", "data"]);
    for record in &scan.records {
        assert!(!record.is_broken);
        assert_eq!(record.resolved_target, root.join("data/app"));
        assert!(record.source_path.is_absolute());
    }
    assert_eq!(scan.stats.links_seen, 2);
}

#[test]
fn test_scan_does_not_descend_into_symlinked_dirs() {
    let dir = TempDir::new().unwrap();
    let root = root_of(&dir);
    fs::create_dir_all(root.join("real/inner")).unwrap();
    // Only reachable by walking through `walk/to-real`.
    symlink(root.join("real"), root.join("real/inner/back")).unwrap();
    fs::create_dir(root.join("walk")).unwrap();
    symlink(root.join("real"), root.join("walk/to-real")).unwrap();
    // A loop back to the root would never terminate if followed.
    symlink(&root, root.join("walk/loop")).unwrap();

    let scan = LinkScanner::new().scan(&permissive(&root.join("walk"))).unwrap();

    assert_eq!(names(&scan), vec!["loop", "to-real"]);
}

#[test]
fn test_scan_reports_broken_and_cyclic_links() {
    let dir = TempDir::new().unwrap();
    let root = root_of(&dir);
    symlink(root.join("missing"), root.join("dangling")).unwrap();
    symlink("b", root.join("a")).unwrap();
    symlink("a", root.join("b")).unwrap();

    let scan = LinkScanner::new().scan(&ScanConfig::new(&root)).unwrap();

    assert_eq!(names(&scan), vec!["a", "b", "dangling"]);
    assert!(scan.records.iter().all(|r| r.is_broken));
    assert_eq!(scan.stats.broken, 3);
    assert_eq!(scan.records[2].resolved_target, root.join("missing"));
}

#[test]
fn test_scan_respects_depth_and_skip_dirs() {
    let dir = TempDir::new().unwrap();
    let root = root_of(&dir);
    fs::create_dir(root.join("target")).unwrap();
    fs::create_dir_all(root.join("one/two")).unwrap();
    fs::create_dir_all(root.join("node_modules")).unwrap();
    symlink(root.join("target"), root.join("top")).unwrap();
    symlink(root.join("target"), root.join("one/mid")).unwrap();
    symlink(root.join("target"), root.join("one/two/deep")).unwrap();
    symlink(root.join("target"), root.join("node_modules/hidden")).unwrap();

    let config = ScanConfig::builder()
        .root(root.clone())
        .max_depth(1u32)
        .filter(FilterPolicy::permissive())
        .build()
        .unwrap();
    let scan = LinkScanner::new().scan(&config).unwrap();

    assert_eq!(names(&scan), vec!["mid", "top"]);
}

#[test]
fn test_default_filters() {
    let dir = TempDir::new().unwrap();
    let root = root_of(&dir);
    fs::create_dir(root.join("dir")).unwrap();
    fs::create_dir(root.join("1R3_9ZoEWvefI4rTylIiU")).unwrap();
    fs::write(root.join("file.txt"), b"x").unwrap();

    symlink(root.join("dir"), root.join("keep")).unwrap();
    symlink(root.join("dir"), root.join("python3")).unwrap();
    symlink(root.join("1R3_9ZoEWvefI4rTylIiU"), root.join("cache")).unwrap();
    symlink(root.join("file.txt"), root.join("file-link")).unwrap();
    symlink(root.join("dir"), root.join("bad\u{FFFD}name")).unwrap();
    // Broken links skip the target-based filters.
    symlink(root.join("gone"), root.join("dangling")).unwrap();

    let scan = LinkScanner::new().scan(&ScanConfig::new(&root)).unwrap();
    assert_eq!(names(&scan), vec!["dangling", "keep"]);
    assert_eq!(scan.stats.filtered_pattern, 1);
    assert_eq!(scan.stats.filtered_hash_like, 1);
    assert_eq!(scan.stats.filtered_not_dir, 1);
    assert_eq!(scan.stats.filtered_garbled, 1);

    let scan = LinkScanner::new().scan(&permissive(&root)).unwrap();
    assert_eq!(scan.len(), 6);
}

#[test]
fn test_scan_root_errors() {
    let dir = TempDir::new().unwrap();
    let root = root_of(&dir);
    fs::write(root.join("plain"), b"x").unwrap();

    let missing = LinkScanner::new().scan(&ScanConfig::new(root.join("nope")));
    assert!(matches!(missing, Err(ScanError::NotFound { .. })));

    let file = LinkScanner::new().scan(&ScanConfig::new(root.join("plain")));
    assert!(matches!(file, Err(ScanError::NotADirectory { .. })));
}

#[test]
fn test_unreadable_directory_becomes_warning() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let root = root_of(&dir);
    let locked = root.join("locked");
    fs::create_dir(&locked).unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // Root bypasses permission bits; nothing to observe then.
    let readable = fs::read_dir(&locked).is_ok();
    let scan = LinkScanner::new().scan(&ScanConfig::new(&root)).unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    if !readable {
        assert!(scan.has_warnings());
        assert_eq!(scan.warnings[0].path, locked);
    }
}

#[test]
fn test_data_root_grouping() {
    let dir = TempDir::new().unwrap();
    let root = root_of(&dir);
    let data = root.join("Data");
    fs::create_dir_all(data.join("zeta")).unwrap();
    fs::create_dir_all(data.join("Alpha")).unwrap();
    fs::create_dir_all(root.join("elsewhere")).unwrap();
    fs::create_dir_all(root.join("p1")).unwrap();
    fs::create_dir_all(root.join("p2")).unwrap();

    symlink(data.join("zeta"), root.join("p1/data")).unwrap();
    symlink(data.join("zeta"), root.join("p2/data")).unwrap();
    symlink(data.join("Alpha"), root.join("p2/alpha")).unwrap();
    symlink(root.join("elsewhere"), root.join("p1/other")).unwrap();
    symlink(data.join("gone"), root.join("p1/broken")).unwrap();

    let scan = LinkScanner::new().scan(&ScanConfig::new(&root)).unwrap();
    let into = links_into_data_root(&scan.records, &data);
    assert_eq!(into.len(), 3);

    let groups = group_by_target(&into, &data);
    let keys: Vec<_> = groups.keys().cloned().collect();
    assert_eq!(keys, vec![data.join("Alpha"), data.join("zeta")]);
    assert_eq!(groups[&data.join("zeta")].len(), 2);
}
