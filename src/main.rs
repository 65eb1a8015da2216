use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use source_patcher::config::{common_target, load_patch_sets, PatchConfig};
use source_patcher::{load, store, RunOutput, Sequence, StepReport, StepStatus, WriteMode};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "source-patcher")]
#[command(about = "Apply ordered literal and regex patches to a source file", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a patch set to a file
    Apply {
        /// File to patch (defaults to the patch set's target)
        target: Option<PathBuf>,

        /// Patch set file or directory of patch sets (built-in set if omitted)
        #[arg(short, long)]
        patches: Option<PathBuf>,

        /// Dry run - show what would be changed without modifying the file
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,

        /// Refuse to write if any required step made no change
        #[arg(long)]
        strict: bool,

        /// Write through a tempfile and rename instead of truncating in place
        #[arg(long)]
        atomic: bool,
    },

    /// Report what each step would do, without writing
    Status {
        /// File to check (defaults to the patch set's target)
        target: Option<PathBuf>,

        /// Patch set file or directory of patch sets (built-in set if omitted)
        #[arg(short, long)]
        patches: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the steps of a patch set
    List {
        /// Patch set file or directory of patch sets (built-in set if omitted)
        #[arg(short, long)]
        patches: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Apply {
            target,
            patches,
            dry_run,
            diff,
            strict,
            atomic,
        } => {
            let mode = if atomic {
                WriteMode::Atomic
            } else {
                WriteMode::Truncate
            };
            cmd_apply(target, patches, dry_run, diff, strict, mode)
        }

        Commands::Status {
            target,
            patches,
            json,
        } => cmd_status(target, patches, json),

        Commands::List { patches } => cmd_list(patches),
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose >= 2)
        .with_writer(std::io::stderr)
        .init();

    tracing::trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());
}

/// Helper: Concatenate patch sets into one sequence, in load order.
fn build_sequence(sets: &[PatchConfig]) -> Result<Sequence> {
    let mut sequence = Sequence::default();
    for set in sets {
        sequence.extend(
            set.sequence()
                .with_context(|| format!("failed to compile patch set '{}'", set.meta.name))?,
        );
    }
    Ok(sequence)
}

/// Resolve the file to patch.
///
/// Priority order:
/// 1. Explicit TARGET argument
/// 2. The `meta.target` every declaring patch set agrees on
///
/// Patch sets that declare different targets are rejected either way.
fn resolve_target(cli_target: Option<PathBuf>, sets: &[PatchConfig]) -> Result<PathBuf> {
    let declared = common_target(sets)?;

    if let Some(path) = cli_target {
        return Ok(path);
    }

    if let Some(target) = declared {
        return Ok(PathBuf::from(target));
    }

    anyhow::bail!(
        "{}\n  {}",
        "No target file given and the patch set does not declare one.".red(),
        "Pass it explicitly: source-patcher apply path/to/file"
    )
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

#[derive(Default)]
struct Tally {
    applied: usize,
    already_applied: usize,
    skipped: usize,
    missed: usize,
}

/// Print one line per step and return the counts.
fn report_steps(output: &RunOutput, dry_run: bool) -> Tally {
    let mut tally = Tally::default();

    for report in &output.reports {
        match &report.status {
            StepStatus::Applied { .. } => {
                let verb = if dry_run { "Would apply" } else { "Applied" };
                println!("{} {}: {} ({})", "✓".green(), report.id, verb, report.status);
                tally.applied += 1;
            }
            StepStatus::AlreadyApplied => {
                println!("{} {}: Already applied", "⊙".yellow(), report.id);
                tally.already_applied += 1;
            }
            status if report.optional => {
                println!("{} {}: Skipped ({})", "⊘".cyan(), report.id, status);
                tally.skipped += 1;
            }
            status => {
                eprintln!("{} {}: No change - {}", "✗".red(), report.id, status);
                tally.missed += 1;

                if let Some(hint) = &report.hint {
                    eprintln!(
                        "  Closest line {} ({:.0}% similar):",
                        hint.line_number,
                        hint.similarity * 100.0
                    );
                    eprintln!("    expected: {}", hint.expected);
                    eprintln!("    found:    {}", hint.line.trim());
                }
            }
        }
    }

    tally
}

fn print_summary(tally: &Tally) {
    println!();
    println!("{}", "Summary:".bold());
    println!("  {} applied", format!("{}", tally.applied).green());
    println!(
        "  {} already applied",
        format!("{}", tally.already_applied).yellow()
    );
    println!("  {} skipped", format!("{}", tally.skipped).cyan());
    println!("  {} no change", format!("{}", tally.missed).red());
}

fn cmd_apply(
    target: Option<PathBuf>,
    patches: Option<PathBuf>,
    dry_run: bool,
    show_diff: bool,
    strict: bool,
    mode: WriteMode,
) -> Result<()> {
    // 1. Load patch sets and compile them into one sequence
    let sets = load_patch_sets(patches.as_deref())?;
    let target = resolve_target(target, &sets)?;
    let sequence = build_sequence(&sets)?;

    println!("Target: {}", target.display());
    println!("Steps: {}", sequence.len());
    println!();

    // 2. Load the file; nothing runs if this fails
    let original = load(&target)?;
    let before = show_diff.then(|| original.clone());

    // 3. Run every step in memory
    let output = sequence.run(original);
    let tally = report_steps(&output, dry_run);

    if dry_run {
        println!();
        println!("{}", "[DRY RUN - file not written]".cyan());
        if let Some(before) = &before {
            if before != &output.buffer {
                display_diff(&target, before, &output.buffer);
            }
        }
        print_summary(&tally);
        return Ok(());
    }

    // 4. Strict mode refuses to commit a partial patch
    if strict {
        if let Err(e) = output.ensure_complete() {
            print_summary(&tally);
            eprintln!();
            eprintln!("{} {}", "Refusing to write:".red().bold(), e);
            std::process::exit(1);
        }
    }

    // 5. Commit
    store(&target, &output.buffer, mode)?;

    if let Some(before) = &before {
        if before != &output.buffer {
            display_diff(&target, before, &output.buffer);
        }
    }

    print_summary(&tally);
    println!();
    println!("{} updated successfully", display_name(&target));

    Ok(())
}

fn status_label(status: &StepStatus) -> &'static str {
    match status {
        StepStatus::Applied { .. } => "pending",
        StepStatus::AlreadyApplied => "applied",
        StepStatus::NoMatch => "no-match",
        StepStatus::Unmet { .. } => "unmet",
        StepStatus::Unbalanced { .. } => "unbalanced",
    }
}

fn report_json(report: &StepReport) -> serde_json::Value {
    serde_json::json!({
        "id": report.id,
        "kind": report.kind,
        "status": status_label(&report.status),
        "detail": report.status.to_string(),
        "optional": report.optional,
        "closest_line": report.hint.as_ref().map(|hint| hint.line_number),
    })
}

fn cmd_status(target: Option<PathBuf>, patches: Option<PathBuf>, json: bool) -> Result<()> {
    let sets = load_patch_sets(patches.as_deref())?;
    let target = resolve_target(target, &sets)?;
    let sequence = build_sequence(&sets)?;

    // Read-only: the run happens in memory and is discarded
    let buffer = load(&target)?;
    let output = sequence.run(buffer);

    if json {
        let reports: Vec<_> = output.reports.iter().map(report_json).collect();
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    println!("{}", "Patch Status Report".bold());
    println!("Target: {}", target.display());
    println!();

    let mut applied = Vec::new();
    let mut pending = Vec::new();
    let mut missing = Vec::new();

    for report in &output.reports {
        match &report.status {
            StepStatus::AlreadyApplied => applied.push(report),
            StepStatus::Applied { .. } => pending.push(report),
            _ => missing.push(report),
        }
    }

    if !applied.is_empty() {
        println!(
            "{} {} ({} steps)",
            "✓".green(),
            "APPLIED".green().bold(),
            applied.len()
        );
        for report in &applied {
            println!("  - {}", report.id);
        }
        println!();
    }

    if !pending.is_empty() {
        println!(
            "{} {} ({} steps)",
            "⊙".yellow(),
            "NOT APPLIED".yellow().bold(),
            pending.len()
        );
        for report in &pending {
            println!("  - {} ({})", report.id, "target found".dimmed());
        }
        println!();
    }

    if !missing.is_empty() {
        println!(
            "{} {} ({} steps)",
            "✗".red(),
            "NO MATCH".red().bold(),
            missing.len()
        );
        for report in &missing {
            let reason = report.status.to_string();
            let suffix = if report.optional { ", optional" } else { "" };
            println!("  - {} ({}{})", report.id, reason.dimmed(), suffix);
        }
        println!();
    }

    Ok(())
}

fn cmd_list(patches: Option<PathBuf>) -> Result<()> {
    let sets = load_patch_sets(patches.as_deref())?;

    for set in &sets {
        println!("{}", set.meta.name.bold());
        if let Some(description) = &set.meta.description {
            println!("  {}", description.dimmed());
        }
        if let Some(target) = &set.meta.target {
            println!("  Target: {}", target);
        }
        println!();

        for (idx, step) in set.steps.iter().enumerate() {
            let sequence_step = step.to_step()?;
            let mut line = format!(
                "  {}. {} [{}]",
                idx + 1,
                step.id,
                sequence_step.kind.name()
            );
            if step.optional {
                line.push_str(" (optional)");
            }
            println!("{}", line);
            if let Some(description) = &step.description {
                println!("     {}", description);
            }
            for requirement in &step.requires {
                println!("     requires: {}", requirement.dimmed());
            }
            for marker in &step.unless {
                println!("     unless:   {}", marker.dimmed());
            }
        }
        println!();
    }

    Ok(())
}
