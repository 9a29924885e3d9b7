//! The migration engine.
//!
//! Every operation follows the same shape: check preconditions, build a
//! [`MigrationPlan`], and with [`Execution::Apply`] run it step by step
//! and verify the outcome. Nothing on disk changes unless every
//! precondition holds. Steps completed before a failure are not undone.

use std::fs;
use std::path::{Path, PathBuf};

use derive_builder::Builder;
use itertools::Itertools;
use tracing::{info, warn};

use linkkeep_core::pattern::expand_home;
use linkkeep_core::{ConflictStrategy, LinkMode, LinkRecord};
use linkkeep_scan::{absolutize, link_identity, resolve};

use crate::action::{ActionKind, Execution, MigrationAction, MigrationPlan};
use crate::conflict::resolve_conflict;
use crate::error::MigrationError;
use crate::fsops::{
    copy_tree, is_real_dir, is_symlink, link_text_for, make_symlink, move_dir, path_exists,
    remove_link, retarget_link,
};

/// Hops followed when verifying links after a migration.
const VERIFY_HOP_LIMIT: usize = linkkeep_core::DEFAULT_HOP_LIMIT;

/// Move one real directory and update the links that point at it.
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct MigrationRequest {
    /// Directory the links point at today.
    pub current_target: PathBuf,

    /// Where the directory should live. A relative path is taken relative
    /// to `data_root`.
    pub new_target: PathBuf,

    /// Links to update.
    #[builder(default)]
    pub links: Vec<PathBuf>,

    #[builder(default)]
    pub link_mode: LinkMode,

    #[builder(default)]
    pub conflict: ConflictStrategy,

    /// Explicit place to park an existing destination.
    #[builder(default, setter(into, strip_option))]
    pub backup_path: Option<PathBuf>,

    #[builder(default, setter(into, strip_option))]
    pub data_root: Option<PathBuf>,
}

impl MigrationRequest {
    /// Create a new request builder.
    pub fn builder() -> MigrationRequestBuilder {
        MigrationRequestBuilder::default()
    }

    /// Request with default mode and conflict strategy.
    pub fn new(current_target: impl Into<PathBuf>, new_target: impl Into<PathBuf>, links: Vec<PathBuf>) -> Self {
        Self {
            current_target: current_target.into(),
            new_target: new_target.into(),
            links,
            link_mode: LinkMode::default(),
            conflict: ConflictStrategy::default(),
            backup_path: None,
            data_root: None,
        }
    }

    /// Absolute destination, with `~` expanded and relative paths
    /// anchored at the data root.
    pub fn resolved_new_target(&self) -> PathBuf {
        let expanded = expand_path(&self.new_target);
        if expanded.is_absolute() {
            return absolutize(&expanded);
        }
        match &self.data_root {
            Some(root) => absolutize(&expand_path(root).join(expanded)),
            None => absolutize(&expanded),
        }
    }

    /// Links with repeats removed, first occurrence kept.
    pub fn unique_links(&self) -> Vec<PathBuf> {
        unique_links(&self.links)
    }
}

/// Drop repeated link paths, comparing the link itself rather than its target.
fn unique_links(links: &[PathBuf]) -> Vec<PathBuf> {
    links.iter().unique_by(|l| link_identity(l)).cloned().collect()
}

fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(expand_home(&path.to_string_lossy()))
}

/// Checked source, destination and backup of a move.
struct MovePlan {
    current: PathBuf,
    new: PathBuf,
    backup: Option<PathBuf>,
}

impl MovePlan {
    fn check(request: &MigrationRequest) -> Result<Self, MigrationError> {
        let current = absolutize(&expand_path(&request.current_target));
        let new = request.resolved_new_target();

        if current == new {
            return Err(MigrationError::SameTarget { path: new });
        }
        if new.starts_with(&current) {
            return Err(MigrationError::NestedTarget {
                current_target: current,
                new_target: new,
            });
        }
        if current.starts_with(&new) {
            return Err(MigrationError::EnclosingTarget {
                current_target: current,
                new_target: new,
            });
        }
        if !is_real_dir(&current) {
            return Err(MigrationError::MissingData { path: current });
        }

        let explicit = request.backup_path.as_deref().map(|p| absolutize(&expand_path(p)));
        let backup = resolve_conflict(&new, request.conflict, explicit.as_deref())?;

        Ok(Self { current, new, backup })
    }

    fn push_actions(&self, plan: &mut MigrationPlan) {
        if let Some(backup) = &self.backup {
            plan.push(MigrationAction::backup(&self.new, backup));
        }
        plan.push(MigrationAction::move_dir(&self.current, &self.new));
    }
}

fn require_symlinks(links: &[PathBuf]) -> Result<(), MigrationError> {
    match links.iter().find(|l| !is_symlink(l)) {
        Some(link) => Err(MigrationError::NotASymlink { path: link.clone() }),
        None => Ok(()),
    }
}

/// Move the real directory and repoint every link at the new location.
///
/// In `inline` mode each link is replaced by a full copy of the moved
/// data instead. Returns the plan, executed or not.
pub fn migrate_and_relink(
    request: &MigrationRequest,
    execution: Execution,
) -> Result<MigrationPlan, MigrationError> {
    let moving = MovePlan::check(request)?;
    let links = request.unique_links();
    require_symlinks(&links)?;

    let mut plan = MigrationPlan::new();
    moving.push_actions(&mut plan);
    for link in &links {
        let action = match request.link_mode {
            LinkMode::Inline => MigrationAction::inline_copy(link, &moving.new),
            mode => MigrationAction::retarget(
                link,
                &moving.new,
                link_text_for(link, &moving.new, mode == LinkMode::Relative),
            ),
        };
        plan.push(action);
    }

    if !execution.is_apply() {
        return Ok(plan);
    }

    execute_plan(&plan)?;

    verify_exists(&moving.new)?;
    if let Some(backup) = &moving.backup {
        verify_exists(backup)?;
    }
    for link in &links {
        if request.link_mode.is_symlink() {
            verify_link_resolves(link, &moving.new)?;
        } else {
            verify_real_dir(link)?;
        }
    }
    Ok(plan)
}

/// Move the real directory and delete every link that pointed at it.
pub fn move_and_delete_links(
    request: &MigrationRequest,
    execution: Execution,
) -> Result<MigrationPlan, MigrationError> {
    let moving = MovePlan::check(request)?;
    let links = request.unique_links();
    require_symlinks(&links)?;

    let mut plan = MigrationPlan::new();
    moving.push_actions(&mut plan);
    for link in &links {
        plan.push(MigrationAction::unlink(link, &moving.new));
    }

    if !execution.is_apply() {
        return Ok(plan);
    }

    execute_plan(&plan)?;

    verify_exists(&moving.new)?;
    for link in &links {
        if is_symlink(link) {
            return Err(MigrationError::verification(link, "link still present"));
        }
    }
    Ok(plan)
}

/// Replace each link with a full copy of `source`, leaving `source` alone.
pub fn materialize_links_in_place(
    source: &Path,
    links: &[PathBuf],
    execution: Execution,
) -> Result<MigrationPlan, MigrationError> {
    let source = absolutize(source);
    if !source.is_dir() {
        return Err(MigrationError::MissingData { path: source });
    }
    let links = unique_links(links);
    require_symlinks(&links)?;

    let plan: MigrationPlan = links
        .iter()
        .map(|link| MigrationAction::materialize(link, &source))
        .collect();

    if !execution.is_apply() {
        return Ok(plan);
    }

    execute_plan(&plan)?;

    for link in &links {
        verify_real_dir(link)?;
    }
    verify_exists(&source)?;
    Ok(plan)
}

/// Rewrite links to relative text without moving any data.
///
/// Links that already carry the right relative text are left out of the
/// plan, so running this twice yields an empty second plan. Broken links
/// are skipped.
pub fn rewrite_links_to_relative(
    records: &[LinkRecord],
    execution: Execution,
) -> Result<MigrationPlan, MigrationError> {
    let records: Vec<&LinkRecord> = records
        .iter()
        .filter(|r| {
            if r.is_broken {
                warn!("Skipping broken link {}", r.source_path.display());
            }
            !r.is_broken
        })
        .collect();

    let mut plan = MigrationPlan::new();
    for record in &records {
        let link = &record.source_path;
        let current = fs::read_link(link).map_err(|_| MigrationError::NotASymlink { path: link.clone() })?;
        let text = link_text_for(link, &record.resolved_target, true);
        if current != text {
            plan.push(MigrationAction::retarget(link, &record.resolved_target, text));
        }
    }

    if !execution.is_apply() {
        return Ok(plan);
    }

    execute_plan(&plan)?;

    for record in &records {
        let link = &record.source_path;
        verify_link_resolves(link, &record.resolved_target)?;
        let text = fs::read_link(link).map_err(|e| MigrationError::verification(link, e.to_string()))?;
        if text.is_absolute() {
            return Err(MigrationError::verification(link, "link text is still absolute"));
        }
    }
    Ok(plan)
}

/// Run each step in order, stopping at the first failure.
///
/// A failure after the first step is reported as
/// [`MigrationError::Interrupted`].
pub(crate) fn execute_plan(plan: &MigrationPlan) -> Result<(), MigrationError> {
    for (index, action) in plan.iter().enumerate() {
        execute_action(action).map_err(|e| e.at_step(index, plan.len()))?;
        info!("{action}");
    }
    Ok(())
}

fn execute_action(action: &MigrationAction) -> Result<(), MigrationError> {
    let path = action.path.as_path();
    let target = action.target.as_path();

    match action.kind {
        ActionKind::Backup => {
            if path_exists(target) {
                return Err(MigrationError::BackupExists {
                    path: target.to_path_buf(),
                });
            }
            fs::rename(path, target).map_err(|e| MigrationError::execution("back up", path, e))
        }
        ActionKind::Move => move_dir(path, target),
        ActionKind::Retarget => {
            let text = action.link_text.as_deref().unwrap_or(target);
            retarget_link(path, text)
        }
        ActionKind::Unlink => remove_link(path),
        ActionKind::InlineCopy => inline_copy(path, target),
        ActionKind::Materialize => materialize(path, target),
    }
}

/// Swap the link for a copy of `source`, which lives elsewhere.
fn inline_copy(link: &Path, source: &Path) -> Result<(), MigrationError> {
    if is_symlink(link) {
        remove_link(link)?;
    }
    // The move already put the data at the link's own path.
    if link == source {
        return Ok(());
    }
    if path_exists(link) {
        return Err(MigrationError::execution(
            "inline over",
            link,
            std::io::Error::from(std::io::ErrorKind::AlreadyExists),
        ));
    }
    copy_tree(source, link)
}

/// Copy `source` next to the link first, then swap it in.
fn materialize(link: &Path, source: &Path) -> Result<(), MigrationError> {
    let parent = link.parent().unwrap_or(Path::new("/"));
    let staging = tempfile::Builder::new()
        .prefix(".lk-materialize")
        .tempdir_in(parent)
        .map_err(|e| MigrationError::execution("create staging directory in", parent, e))?;

    copy_tree(source, staging.path())?;
    install_staged(&staging.keep(), link)
}

/// Put the finished copy at `staged` where the symlink `link` is.
///
/// If the final rename fails the link is recreated with its old text and
/// the copy stays at `staged`.
fn install_staged(staged: &Path, link: &Path) -> Result<(), MigrationError> {
    let text = match fs::read_link(link) {
        Ok(text) => text,
        Err(err) => {
            let _ = fs::remove_dir_all(staged);
            return Err(MigrationError::execution("read link", link, err));
        }
    };
    if let Err(err) = remove_link(link) {
        let _ = fs::remove_dir_all(staged);
        return Err(err);
    }
    if let Err(err) = fs::rename(staged, link) {
        if let Err(restore) = make_symlink(&text, link) {
            warn!("Could not restore link {}: {restore}", link.display());
        }
        warn!("Copy left at {}", staged.display());
        return Err(MigrationError::execution("install copy at", link, err));
    }
    Ok(())
}

fn verify_exists(path: &Path) -> Result<(), MigrationError> {
    if path_exists(path) {
        Ok(())
    } else {
        Err(MigrationError::verification(path, "missing after migration"))
    }
}

fn verify_real_dir(path: &Path) -> Result<(), MigrationError> {
    if is_symlink(path) {
        return Err(MigrationError::verification(path, "still a symlink"));
    }
    if !is_real_dir(path) {
        return Err(MigrationError::verification(path, "not a directory"));
    }
    Ok(())
}

fn verify_link_resolves(link: &Path, expected: &Path) -> Result<(), MigrationError> {
    let resolution = resolve(link, VERIFY_HOP_LIMIT);
    let expected = absolutize(expected);
    if resolution.is_broken || resolution.target != expected {
        return Err(MigrationError::verification(
            link,
            format!(
                "resolves to {} instead of {}",
                resolution.target.display(),
                expected.display()
            ),
        ));
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    #[test]
    fn test_resolved_new_target_uses_data_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let request = MigrationRequest::builder()
            .current_target(root.join("old"))
            .new_target("sub/new")
            .data_root(root.clone())
            .build()
            .unwrap();
        assert_eq!(request.resolved_new_target(), root.join("sub/new"));
    }

    #[test]
    fn test_preview_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::create_dir(root.join("old")).unwrap();
        symlink(root.join("old"), root.join("link")).unwrap();

        let request = MigrationRequest::new(root.join("old"), root.join("new"), vec![root.join("link")]);
        let plan = migrate_and_relink(&request, Execution::Preview).unwrap();

        assert_eq!(plan.len(), 2);
        assert_eq!(plan.actions()[0].kind, ActionKind::Move);
        assert_eq!(plan.actions()[1].link_text, Some(PathBuf::from("new")));
        assert!(root.join("old").is_dir());
        assert!(!root.join("new").exists());
    }

    #[test]
    fn test_same_and_nested_targets() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::create_dir(root.join("old")).unwrap();

        let same = MigrationRequest::new(root.join("old"), root.join("old"), vec![]);
        assert!(matches!(
            migrate_and_relink(&same, Execution::Preview),
            Err(MigrationError::SameTarget { .. })
        ));

        let nested = MigrationRequest::new(root.join("old"), root.join("old/inner"), vec![]);
        assert!(matches!(
            migrate_and_relink(&nested, Execution::Preview),
            Err(MigrationError::NestedTarget { .. })
        ));

        // A sibling sharing a name prefix is not nested.
        let sibling = MigrationRequest::new(root.join("old"), root.join("older"), vec![]);
        assert!(migrate_and_relink(&sibling, Execution::Preview).is_ok());
    }

    #[test]
    fn test_missing_source() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let request = MigrationRequest::new(root.join("gone"), root.join("new"), vec![]);
        assert!(matches!(
            migrate_and_relink(&request, Execution::Preview),
            Err(MigrationError::MissingData { .. })
        ));
    }

    #[test]
    fn test_non_symlink_link_rejected() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::create_dir(root.join("old")).unwrap();
        fs::create_dir(root.join("plain")).unwrap();

        let request = MigrationRequest::new(root.join("old"), root.join("new"), vec![root.join("plain")]);
        assert!(matches!(
            migrate_and_relink(&request, Execution::Apply),
            Err(MigrationError::NotASymlink { .. })
        ));
        assert!(root.join("old").is_dir());
    }

    #[test]
    fn test_enclosing_target_rejected_before_backup() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::create_dir_all(root.join("outer/app")).unwrap();

        let mut request = MigrationRequest::new(root.join("outer/app"), root.join("outer"), vec![]);
        request.conflict = ConflictStrategy::Backup;
        let err = migrate_and_relink(&request, Execution::Apply).unwrap_err();

        assert!(matches!(err, MigrationError::EnclosingTarget { .. }));
        assert!(err.is_precondition());
        assert!(root.join("outer/app").is_dir());
    }

    #[test]
    fn test_unique_links_compares_link_paths() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::create_dir(root.join("data")).unwrap();
        symlink(root.join("data"), root.join("a")).unwrap();
        symlink(root.join("data"), root.join("b")).unwrap();

        let links = vec![root.join("a"), root.join("./a"), root.join("b"), root.join("a")];
        assert_eq!(unique_links(&links), vec![root.join("a"), root.join("b")]);
    }

    #[test]
    fn test_failure_mid_plan_is_interrupted() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::create_dir(root.join("old")).unwrap();
        fs::create_dir(root.join("plain")).unwrap();

        let plan: MigrationPlan = [
            MigrationAction::move_dir(&root.join("old"), &root.join("new")),
            MigrationAction::unlink(&root.join("plain"), &root.join("new")),
        ]
        .into_iter()
        .collect();
        let err = execute_plan(&plan).unwrap_err();

        assert!(matches!(
            err,
            MigrationError::Interrupted {
                completed: 1,
                total: 2,
                ..
            }
        ));
        assert!(err.is_partially_applied());
        assert!(root.join("new").is_dir());
    }

    #[test]
    fn test_failed_install_restores_link() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::create_dir(root.join("data")).unwrap();
        symlink("data", root.join("link")).unwrap();

        let err = install_staged(&root.join("never-staged"), &root.join("link")).unwrap_err();

        assert!(err.is_partially_applied());
        assert_eq!(fs::read_link(root.join("link")).unwrap(), PathBuf::from("data"));
    }
}
