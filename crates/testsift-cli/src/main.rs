//! testsift - regression test selection for CI builds.
//!
//! ## Commands
//!
//! - `select`: prioritize and reorder the suite manifest for a build
//! - `scan`: show the history scan signals for a build
//! - `state show`: show the persisted priority state

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

use testsift_core::{
    BuildLog, ChangeSet, DependencyResolver, HandoffResolver, HistoryScanner,
    PriorityStateStore, SectionMarkers, SelectionConfig, SelectionPipeline,
    SelectionReportArtifact,
};

#[derive(Parser)]
#[command(name = "testsift")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Regression test selection and prioritization", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prioritize tests for a build and rewrite the suite manifest
    Select {
        /// Path to the suite manifest
        #[arg(short, long)]
        manifest: PathBuf,

        /// Path to the priority-state file
        #[arg(short, long, default_value = "build_when_previously_prioritized.txt")]
        state_file: PathBuf,

        /// Path to the build-log artifact (JSON array of build outcomes)
        #[arg(long)]
        history: PathBuf,

        /// Current build number
        #[arg(short, long)]
        build_number: u64,

        /// How many recent builds to check for failures
        #[arg(long, default_value = "1")]
        failure_window: u32,

        /// How many recent builds to check for executions
        #[arg(long, default_value = "3")]
        execution_window: u32,

        /// Maximum builds a test may go without being re-prioritized
        #[arg(long, default_value = "10")]
        priority_window: u32,

        /// Changed file path (repeatable)
        #[arg(long = "changed")]
        changed: Vec<String>,

        /// File listing changed paths, one per line
        #[arg(long)]
        changes_file: Option<PathBuf>,

        /// Dependency analyzer command; enables dependency filtering
        #[arg(long)]
        analyzer: Option<String>,

        /// Handoff file shared with the analyzer
        #[arg(long, default_value = "handoff.txt")]
        handoff_file: PathBuf,

        /// Analyzer timeout in seconds
        #[arg(long, default_value = "60")]
        resolver_timeout_secs: u64,

        /// Suffix appended to resolved module ids when matching test ids
        #[arg(long, default_value = ".class")]
        module_suffix: String,

        /// Extension identifying changed source files, without the dot
        #[arg(long, default_value = "java")]
        source_extension: String,

        /// Optional path for the JSON selection report
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Show the history scan signals for a build
    Scan {
        /// Path to the build-log artifact (JSON array of build outcomes)
        #[arg(long)]
        history: PathBuf,

        /// Build number to scan backward from
        #[arg(short, long)]
        build_number: u64,

        /// How many recent builds to check for failures
        #[arg(long, default_value = "1")]
        failure_window: u32,

        /// How many recent builds to check for executions
        #[arg(long, default_value = "3")]
        execution_window: u32,
    },

    /// Inspect the persisted priority state
    State {
        #[command(subcommand)]
        action: StateAction,
    },
}

#[derive(Subcommand)]
enum StateAction {
    /// Print every testId:buildNumber record
    Show {
        /// Path to the priority-state file
        #[arg(short, long, default_value = "build_when_previously_prioritized.txt")]
        state_file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    testsift_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Select {
            manifest,
            state_file,
            history,
            build_number,
            failure_window,
            execution_window,
            priority_window,
            changed,
            changes_file,
            analyzer,
            handoff_file,
            resolver_timeout_secs,
            module_suffix,
            source_extension,
            report,
        } => {
            let config = SelectionConfig {
                failure_window,
                execution_window,
                priority_window,
                module_suffix,
                source_extension,
                markers: SectionMarkers::default(),
            };
            cmd_select(
                &manifest,
                &state_file,
                &history,
                build_number,
                &config,
                changed,
                changes_file.as_deref(),
                analyzer.as_deref(),
                &handoff_file,
                resolver_timeout_secs,
                report.as_deref(),
            )
            .await
        }
        Commands::Scan {
            history,
            build_number,
            failure_window,
            execution_window,
        } => cmd_scan(&history, build_number, failure_window, execution_window),
        Commands::State { action } => match action {
            StateAction::Show { state_file } => cmd_state_show(&state_file),
        },
    }
}

#[allow(clippy::too_many_arguments)]
async fn cmd_select(
    manifest: &Path,
    state_file: &Path,
    history_path: &Path,
    build_number: u64,
    config: &SelectionConfig,
    changed: Vec<String>,
    changes_file: Option<&Path>,
    analyzer: Option<&str>,
    handoff_file: &Path,
    resolver_timeout_secs: u64,
    report: Option<&Path>,
) -> Result<()> {
    let history = BuildLog::load(history_path)
        .with_context(|| format!("load build log from {}", history_path.display()))?;

    let changes = collect_changes(build_number, changed, changes_file)?;

    let resolver: Option<HandoffResolver> = analyzer.map(|command_line| {
        let command: Vec<String> = command_line
            .split_whitespace()
            .map(String::from)
            .collect();
        HandoffResolver::new(
            command,
            handoff_file,
            Duration::from_secs(resolver_timeout_secs),
        )
    });

    let outcome = SelectionPipeline::run(
        &history,
        resolver.as_ref().map(|r| r as &dyn DependencyResolver),
        changes.as_ref(),
        config,
        manifest,
        state_file,
        build_number,
    )
    .await?;

    println!(
        "Selected {} of {} tests ({} high, {} low){}",
        outcome.selected.len(),
        outcome.registry_size,
        outcome.high_count,
        outcome.low_count,
        if outcome.fail_open {
            ", dependency analysis fell back to the full registry"
        } else {
            ""
        }
    );
    for id in &outcome.selected {
        println!("  {id}");
    }
    println!("Selection took {} ms", outcome.duration_ms);

    if let Some(report_path) = report {
        let artifact = SelectionReportArtifact::from_outcome(build_number, config, &outcome);
        testsift_core::write_selection_report_json(report_path, &artifact)?;
        println!("Report written to {}", report_path.display());
    }

    Ok(())
}

/// Merge `--changed` arguments with the changes file, if any.
fn collect_changes(
    build_number: u64,
    changed: Vec<String>,
    changes_file: Option<&Path>,
) -> Result<Option<ChangeSet>> {
    let mut files = changed;
    if let Some(path) = changes_file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read changes file {}", path.display()))?;
        files.extend(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from),
        );
    }
    if files.is_empty() {
        return Ok(None);
    }
    Ok(Some(ChangeSet::new(build_number).with_files(files)))
}

fn cmd_scan(
    history_path: &Path,
    build_number: u64,
    failure_window: u32,
    execution_window: u32,
) -> Result<()> {
    let history = BuildLog::load(history_path)
        .with_context(|| format!("load build log from {}", history_path.display()))?;

    let scan = HistoryScanner::scan(
        &history,
        build_number,
        testsift_core::HistoryWindows {
            failure_window,
            execution_window,
        },
    );

    println!("Executed within the last {execution_window} build(s):");
    for id in &scan.found {
        println!("  {id}");
    }
    println!("Failed within the last {failure_window} build(s):");
    for id in &scan.failed {
        println!("  {id}");
    }
    Ok(())
}

fn cmd_state_show(state_file: &Path) -> Result<()> {
    let state = PriorityStateStore::new(state_file).load();
    if state.is_empty() {
        println!("No priority state recorded");
        return Ok(());
    }
    for (id, build) in state {
        println!("{id}:{build}");
    }
    Ok(())
}
