//! linkkeep - find, classify and safely relocate the directories your
//! symlinks point at.
//!
//! Usage:
//!   lk scan [ROOTS]...                  List symlinks under the roots
//!   lk classify [ROOTS]...              Group links by classification rules
//!   lk targets [ROOTS]...               Group links by data directory
//!   lk migrate --from DIR --to DIR      Move a data directory and relink
//!   lk unlink-move --from DIR --to DIR  Move a data directory, drop links
//!   lk materialize --source DIR         Replace links with real copies
//!   lk relativize [ROOTS]...            Rewrite links to relative text
//!   lk validate --link PATH --to DIR    Pre-flight a target change
//!   lk project status|set-mode ROOT     Inspect or switch a project's data
//!
//! Nothing on disk changes without `--apply`.

use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Report, Result, bail};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use linkkeep_classify::{ClassificationRules, Classifier, default_rules_path};
use linkkeep_core::pattern::expand_home;
use linkkeep_core::{
    ConflictStrategy, DEFAULT_HOP_LIMIT, DEFAULT_MAX_DEPTH, FilterPolicy, LinkRecord, LinkScan,
    ScanConfig,
};
use linkkeep_ops::{
    AuditPhase, Execution, LinkMode, MigrationError, MigrationPlan, MigrationRequest,
    ProjectDataStatus, append_audit_log, materialize_links_in_place, migrate_and_relink,
    move_and_delete_links, parse_link_mode, project_data_status, rewrite_links_to_relative,
    set_project_data_mode, validate_target_change,
};
use linkkeep_scan::{
    LinkScanner, TreeSummary, absolutize, group_by_target, links_into_data_root, resolve,
    tree_summary,
};

#[derive(Parser)]
#[command(
    name = "linkkeep",
    version,
    about = "Find, classify and safely relocate the directories your symlinks point at",
    long_about = "linkkeep scans for symbolic links, groups them by the data they point at, \
                  and moves that data without leaving dangling links behind.\n\n\
                  Every command that changes the filesystem only prints its plan unless \
                  `--apply` is given."
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List symlinks under the scan roots
    Scan {
        #[command(flatten)]
        scan: ScanArgs,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Group links by Markdown classification rules
    Classify {
        #[command(flatten)]
        scan: ScanArgs,

        /// Rules file (defaults to ~/.config/lk/projects.md)
        #[arg(short, long, value_name = "FILE")]
        rules: Option<PathBuf>,

        /// Group by primary and secondary category
        #[arg(long)]
        hierarchy: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Group links pointing into the data root by their target
    Targets {
        #[command(flatten)]
        scan: ScanArgs,

        /// Directory holding shared data (defaults to ~/Developer/Data)
        #[arg(long, value_name = "DIR")]
        data_root: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Move a data directory and repoint every link at it
    Migrate {
        #[command(flatten)]
        args: MoveArgs,

        /// How links are rewritten: relative, absolute or inline
        #[arg(long, default_value = "relative")]
        link_mode: String,
    },

    /// Move a data directory and delete the links that pointed at it
    UnlinkMove {
        #[command(flatten)]
        args: MoveArgs,
    },

    /// Replace links with full copies of their target
    Materialize {
        #[command(flatten)]
        scan: ScanArgs,

        /// Directory the links point at
        #[arg(long, value_name = "DIR")]
        source: PathBuf,

        /// Links to replace instead of scanning for them
        #[arg(long = "link", value_name = "PATH")]
        links: Vec<PathBuf>,

        /// Execute the plan
        #[arg(long)]
        apply: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Rewrite absolute links to relative ones without moving data
    Relativize {
        #[command(flatten)]
        scan: ScanArgs,

        /// Only rewrite links pointing into this directory
        #[arg(long, value_name = "DIR")]
        data_root: Option<PathBuf>,

        /// Execute the plan
        #[arg(long)]
        apply: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Check whether retargeting a link's data looks safe
    Validate {
        /// The symlink whose data would move
        #[arg(long, value_name = "PATH")]
        link: PathBuf,

        /// Proposed new location
        #[arg(long, value_name = "DIR")]
        to: PathBuf,

        /// Warn when the destination leaves this tree
        #[arg(long, value_name = "DIR")]
        scan_root: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Inspect or switch a project's data entry
    Project {
        #[command(subcommand)]
        command: ProjectCommand,
    },
}

#[derive(Subcommand)]
enum ProjectCommand {
    /// Show how the project's data entry is stored
    Status {
        /// Project root
        #[arg(default_value = ".")]
        root: PathBuf,

        /// Other project roots to check for shared data
        #[arg(long = "peer", value_name = "DIR")]
        peers: Vec<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Switch the data entry to relative, absolute or inline
    SetMode {
        /// Desired mode
        mode: String,

        /// Project root
        #[arg(default_value = ".")]
        root: PathBuf,

        /// Execute the plan
        #[arg(long)]
        apply: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Where to look for links and which ones to keep.
#[derive(Args)]
struct ScanArgs {
    /// Directories to scan (defaults to your home directory)
    roots: Vec<PathBuf>,

    /// Maximum directory depth below each root
    #[arg(short, long, default_value_t = DEFAULT_MAX_DEPTH)]
    depth: u32,

    /// Keep every link, ignoring the filter config and name heuristics
    #[arg(long)]
    no_filter: bool,

    /// Link name glob that is always kept (repeatable)
    #[arg(long = "include", value_name = "GLOB")]
    include: Vec<String>,

    /// Link name glob that is dropped (repeatable)
    #[arg(long = "exclude", value_name = "GLOB")]
    exclude: Vec<String>,

    /// YAML filter config (defaults to ~/.config/lk/filter.yml)
    #[arg(long, value_name = "FILE")]
    filter_config: Option<PathBuf>,
}

/// Options shared by `migrate` and `unlink-move`.
#[derive(Args)]
struct MoveArgs {
    #[command(flatten)]
    scan: ScanArgs,

    /// Directory the links point at now
    #[arg(long, value_name = "DIR")]
    from: PathBuf,

    /// New location; relative paths are taken relative to --data-root
    #[arg(long, value_name = "DIR")]
    to: PathBuf,

    /// Base for a relative --to
    #[arg(long, value_name = "DIR")]
    data_root: Option<PathBuf>,

    /// Links to update instead of scanning for them (repeatable)
    #[arg(long = "link", value_name = "PATH")]
    links: Vec<PathBuf>,

    /// What to do when the destination exists: abort or backup
    #[arg(long, default_value = "abort")]
    conflict: ConflictStrategy,

    /// Where to park an existing destination
    #[arg(long, value_name = "DIR")]
    backup_path: Option<PathBuf>,

    /// Execute the plan
    #[arg(long)]
    apply: bool,

    /// Append the plan to this JSON Lines file
    #[arg(long, value_name = "FILE")]
    log_json: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Scan { scan, format } => run_scan(&scan, format)?,
        Command::Classify {
            scan,
            rules,
            hierarchy,
            format,
        } => run_classify(&scan, rules.as_deref(), hierarchy, format)?,
        Command::Targets {
            scan,
            data_root,
            format,
        } => run_targets(&scan, data_root, format)?,
        Command::Migrate { args, link_mode } => {
            let mode = parse_link_mode(&link_mode)?;
            run_move(&args, mode, false)?;
        }
        Command::UnlinkMove { args } => run_move(&args, LinkMode::default(), true)?,
        Command::Materialize {
            scan,
            source,
            links,
            apply,
            format,
        } => run_materialize(&scan, &source, links, apply, format)?,
        Command::Relativize {
            scan,
            data_root,
            apply,
            format,
        } => run_relativize(&scan, data_root.as_deref(), apply, format)?,
        Command::Validate {
            link,
            to,
            scan_root,
            format,
        } => run_validate(&link, &to, scan_root.as_deref(), format)?,
        Command::Project { command } => match command {
            ProjectCommand::Status {
                root,
                peers,
                format,
            } => {
                let status = project_data_status(&root, &peers);
                match format {
                    OutputFormat::Text => print_project_status(&status),
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
                }
            }
            ProjectCommand::SetMode {
                mode,
                root,
                apply,
                format,
            } => run_set_mode(&root, &mode, apply, format)?,
        },
    }

    Ok(())
}

/// Log to stderr so stdout stays machine-readable.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();
}

impl ScanArgs {
    fn roots(&self) -> Vec<PathBuf> {
        if !self.roots.is_empty() {
            return self.roots.iter().map(|r| expand(r)).collect();
        }
        vec![dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))]
    }

    fn filter_policy(&self) -> Result<FilterPolicy> {
        let policy = if self.no_filter {
            FilterPolicy::permissive()
        } else {
            FilterPolicy::load(self.filter_config.as_deref()).context("Failed to load filter config")?
        };
        Ok(policy.merge_patterns(&self.include, &self.exclude))
    }

    /// Scan every root with the same filter policy.
    fn scan(&self) -> Result<Vec<LinkScan>> {
        let policy = self.filter_policy()?;
        let scanner = LinkScanner::new();

        self.roots()
            .into_iter()
            .map(|root| {
                eprintln!("Scanning {}...", root.display());
                let config = ScanConfig::builder()
                    .root(root.clone())
                    .max_depth(self.depth)
                    .filter(policy.clone())
                    .build()
                    .context("Invalid scan configuration")?;
                scanner
                    .scan(&config)
                    .with_context(|| format!("Scan of {} failed", root.display()))
            })
            .collect()
    }

    /// Records from every root, without duplicates from overlapping roots.
    fn records(&self) -> Result<Vec<LinkRecord>> {
        Ok(merge_records(&self.scan()?))
    }
}

fn merge_records(scans: &[LinkScan]) -> Vec<LinkRecord> {
    let mut merged: IndexMap<&Path, &LinkRecord> = IndexMap::new();
    for record in scans.iter().flat_map(|s| &s.records) {
        merged.entry(record.source_path.as_path()).or_insert(record);
    }
    merged.sort_keys();
    merged.into_values().cloned().collect()
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(expand_home(&path.to_string_lossy()))
}

fn default_data_root() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join("Developer").join("Data"))
        .unwrap_or_else(|| PathBuf::from("Data"))
}

/// Links among `scan` whose chain ends at `target`.
fn links_to(scan: &ScanArgs, target: &Path) -> Result<Vec<PathBuf>> {
    let target = absolutize(&expand(target));
    let links: Vec<PathBuf> = scan
        .records()?
        .into_iter()
        .filter(|r| !r.is_broken && r.resolved_target == target)
        .map(|r| r.source_path)
        .collect();

    if links.is_empty() {
        warn!("No links point at {}", target.display());
    }
    Ok(links)
}

/// Run a quick scan and display summary.
fn run_scan(args: &ScanArgs, format: OutputFormat) -> Result<()> {
    let scans = args.scan()?;

    match format {
        OutputFormat::Text => {
            for scan in &scans {
                println!();
                println!("{}", "─".repeat(60));
                println!(
                    " {} - {} links, {} broken",
                    scan.root.display(),
                    scan.len(),
                    scan.stats.broken
                );
                println!(
                    " {} directories, {} filtered",
                    scan.stats.dirs_visited,
                    scan.stats.total_filtered()
                );
                println!(" Scanned in {:.2}s", scan.scan_duration.as_secs_f64());
                println!("{}", "─".repeat(60));
                println!();

                for record in &scan.records {
                    print_record(record, "  ");
                }

                if scan.has_warnings() {
                    println!();
                    println!("{} warning(s) during scan", scan.warnings.len());
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&scans)?);
        }
    }

    Ok(())
}

/// Classify scanned links by the Markdown rules.
fn run_classify(
    args: &ScanArgs,
    rules_path: Option<&Path>,
    hierarchy: bool,
    format: OutputFormat,
) -> Result<()> {
    let rules = match rules_path {
        Some(path) => ClassificationRules::read_markdown(&expand(path))?,
        None => match default_rules_path().filter(|p| p.exists()) {
            Some(path) => ClassificationRules::load_markdown(&path),
            None => {
                warn!("No rules file found; every link will be unclassified");
                ClassificationRules::new()
            }
        },
    };

    let roots = args.roots();
    let records = args.records()?;
    let scan_root = match roots.as_slice() {
        [root] => Some(absolutize(root)),
        _ => None,
    };
    let classifier = Classifier::new(&rules, scan_root.as_deref());

    if hierarchy {
        let groups = classifier.classify_hierarchy(&records);
        match format {
            OutputFormat::Text => {
                for (primary, by_secondary) in &groups {
                    let total: usize = by_secondary.values().map(Vec::len).sum();
                    println!();
                    println!(" {primary} ({total})");
                    for (secondary, records) in by_secondary {
                        println!("   {secondary} ({})", records.len());
                        for record in records {
                            let project = record.project_name.as_deref().unwrap_or_default();
                            println!("     [{project}] {}", record.source_path.display());
                        }
                    }
                }
            }
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&groups)?),
        }
    } else {
        let groups = classifier.classify(&records);
        match format {
            OutputFormat::Text => {
                for (category, records) in &groups {
                    println!();
                    println!(" {category} ({})", records.len());
                    for record in records {
                        print_record(record, "   ");
                    }
                }
            }
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&groups)?),
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct TargetGroup {
    target: PathBuf,
    relative: PathBuf,
    summary: TreeSummary,
    links: Vec<LinkRecord>,
}

/// Show which data directories are linked from where.
fn run_targets(args: &ScanArgs, data_root: Option<PathBuf>, format: OutputFormat) -> Result<()> {
    let data_root = absolutize(&data_root.map(|p| expand(&p)).unwrap_or_else(default_data_root));
    let records = args.records()?;

    let groups: Vec<TargetGroup> = group_by_target(&records, &data_root)
        .into_iter()
        .map(|(target, links)| TargetGroup {
            relative: target.strip_prefix(&data_root).unwrap_or(&target).to_path_buf(),
            summary: tree_summary(&target),
            target,
            links,
        })
        .collect();

    match format {
        OutputFormat::Text => {
            println!();
            println!("{}", "─".repeat(70));
            println!(" Links into {}", data_root.display());
            println!("{}", "─".repeat(70));
            println!();

            if groups.is_empty() {
                println!(" No links point into the data root.");
            }
            for group in &groups {
                println!(
                    " {} ({} links, {} files, {})",
                    group.relative.display(),
                    group.links.len(),
                    group.summary.files,
                    format_size(group.summary.bytes)
                );
                for link in &group.links {
                    println!("   {}", link.source_path.display());
                }
                println!();
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&groups)?);
        }
    }

    Ok(())
}

/// Preview, and with `--apply` execute, a directory move.
fn run_move(args: &MoveArgs, link_mode: LinkMode, delete_links: bool) -> Result<()> {
    let links = if args.links.is_empty() {
        links_to(&args.scan, &args.from)?
    } else {
        args.links.iter().map(|l| expand(l)).collect()
    };

    let mut builder = MigrationRequest::builder();
    builder
        .current_target(expand(&args.from))
        .new_target(expand(&args.to))
        .links(links)
        .link_mode(link_mode)
        .conflict(args.conflict);
    if let Some(backup) = &args.backup_path {
        builder.backup_path(expand(backup));
    }
    if let Some(root) = &args.data_root {
        builder.data_root(expand(root));
    }
    let request = builder.build().context("Invalid migration request")?;

    let operation: fn(&MigrationRequest, Execution) -> Result<MigrationPlan, MigrationError> =
        if delete_links {
            move_and_delete_links
        } else {
            migrate_and_relink
        };

    let plan = operation(&request, Execution::Preview)?;
    let new_target = request.resolved_new_target();
    let current = tree_summary(&absolutize(&request.current_target));
    let existing = if new_target.exists() {
        tree_summary(&new_target)
    } else {
        TreeSummary::default()
    };

    if let Some(log) = &args.log_json {
        append_audit_log(log, AuditPhase::Preview, &plan, link_mode)?;
    }

    if !args.apply {
        print_plan(&plan, Execution::Preview, args.format)?;
        if matches!(args.format, OutputFormat::Text) {
            println!(" {}", TreeSummary::pair_description(&current, &existing));
            println!(" {} to move", format_size(current.bytes));
        }
        return Ok(());
    }

    let plan = operation(&request, Execution::Apply).map_err(stopped_part_way)?;
    if let Some(log) = &args.log_json {
        append_audit_log(log, AuditPhase::Applied, &plan, link_mode)?;
    }
    print_plan(&plan, Execution::Apply, args.format)
}

fn run_materialize(
    args: &ScanArgs,
    source: &Path,
    links: Vec<PathBuf>,
    apply: bool,
    format: OutputFormat,
) -> Result<()> {
    let links = if links.is_empty() {
        links_to(args, source)?
    } else {
        links.iter().map(|l| expand(l)).collect()
    };
    let source = expand(source);

    let execution = Execution::from_apply(apply);
    let plan = materialize_links_in_place(&source, &links, execution).map_err(stopped_part_way)?;

    if matches!(format, OutputFormat::Text) && !apply {
        let summary = tree_summary(&source);
        println!(
            " Each copy holds {} files ({})",
            summary.files,
            format_size(summary.bytes)
        );
    }
    print_plan(&plan, execution, format)
}

fn run_relativize(
    args: &ScanArgs,
    data_root: Option<&Path>,
    apply: bool,
    format: OutputFormat,
) -> Result<()> {
    let mut records = args.records()?;
    if let Some(root) = data_root {
        records = links_into_data_root(&records, &absolutize(&expand(root)));
    }

    let execution = Execution::from_apply(apply);
    let plan = rewrite_links_to_relative(&records, execution).map_err(stopped_part_way)?;

    if plan.is_empty() && matches!(format, OutputFormat::Text) {
        println!(" All links are already relative.");
        return Ok(());
    }
    print_plan(&plan, execution, format)
}

fn run_validate(link: &Path, to: &Path, scan_root: Option<&Path>, format: OutputFormat) -> Result<()> {
    let link = absolutize(&expand(link));
    let resolution = resolve(&link, DEFAULT_HOP_LIMIT);
    let record = LinkRecord::new(&link, resolution.target, resolution.is_broken);

    let scan_root = scan_root.map(|p| absolutize(&expand(p)));
    let report = validate_target_change(&record, &expand(to), scan_root.as_deref());

    match format {
        OutputFormat::Text => {
            for error in &report.errors {
                println!(" error: {error}");
            }
            for warning in &report.warnings {
                println!(" warning: {warning}");
            }
            if report.is_ok() {
                println!(" {} can move to {}", record.resolved_target.display(), to.display());
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if !report.is_ok() {
        bail!("{} problem(s) found", report.errors.len());
    }
    Ok(())
}

fn run_set_mode(root: &Path, mode: &str, apply: bool, format: OutputFormat) -> Result<()> {
    let mode = parse_link_mode(mode)?;
    let execution = Execution::from_apply(apply);
    let change = set_project_data_mode(&expand(root), mode, execution).map_err(stopped_part_way)?;

    match format {
        OutputFormat::Text => {
            if change.plan.is_empty() {
                println!(" Already {mode}.");
            }
            print_plan(&change.plan, execution, format)?;
            print_project_status(&change.status);
        }
        OutputFormat::Json => {
            let out = serde_json::json!({
                "plan": change.plan,
                "status": change.status,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}

/// Point out that earlier steps of a failed run stay applied.
fn stopped_part_way(err: MigrationError) -> Report {
    if err.is_partially_applied() {
        Report::new(err).wrap_err("Stopped part-way; completed steps were not undone")
    } else {
        Report::new(err)
    }
}

fn print_plan(plan: &MigrationPlan, execution: Execution, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            let label = if execution.is_apply() { "Applied" } else { "Plan (preview)" };
            if !plan.is_empty() {
                println!(" {label}:");
            }
            for line in plan.descriptions() {
                println!("   • {line}");
            }
            if !execution.is_apply() && !plan.is_empty() {
                println!(" Re-run with --apply to execute.");
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(plan)?),
    }
    Ok(())
}

fn print_record(record: &LinkRecord, indent: &str) {
    println!(
        "{indent}{} -> {}{}",
        record.source_path.display(),
        record.resolved_target.display(),
        if record.is_broken { "  [broken]" } else { "" }
    );
}

fn print_project_status(status: &ProjectDataStatus) {
    println!(" project: {}", status.project_root.display());
    println!(" data:    {} ({})", status.data_path.display(), status.mode);
    if let Some(text) = &status.link_text {
        println!(" link:    {}", text.display());
    }
    if let Some(target) = &status.target_path {
        println!(" target:  {}", target.display());
    }
    for peer in &status.shared_with {
        println!(" shared with {}", peer.display());
    }
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
