use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use mdpatch::{parse_changes, process, ChangeKind, ProcessOutcome};
use similar::{ChangeTag, TextDiff};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "mdpatch")]
#[command(about = "Apply markdown-described line edits with anchor verification", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a change description to a source file
    Apply {
        /// File to patch
        source: PathBuf,

        /// Markdown change description
        changes: PathBuf,

        /// Write the patched text here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Rewrite the source file in place
        #[arg(short, long)]
        in_place: bool,

        /// Dry run - report what would change without writing
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,

        /// Emit a JSON object with processedCode or errorMessage
        #[arg(long)]
        json: bool,
    },

    /// Parse a change description and list its changes without applying
    Check {
        /// Markdown change description
        changes: PathBuf,

        /// Emit the parsed changes as JSON
        #[arg(long)]
        json: bool,
    },

    /// Verify a change description applies cleanly, writing nothing
    Verify {
        /// File the changes target
        source: PathBuf,

        /// Markdown change description
        changes: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Apply {
            source,
            changes,
            output,
            in_place,
            dry_run,
            diff,
            json,
        } => cmd_apply(source, changes, output, in_place, dry_run, diff, json),

        Commands::Check { changes, json } => cmd_check(changes, json),

        Commands::Verify { source, changes } => cmd_verify(source, changes),
    }
}

fn read_input(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn cmd_apply(
    source: PathBuf,
    changes: PathBuf,
    output: Option<PathBuf>,
    in_place: bool,
    dry_run: bool,
    show_diff: bool,
    json: bool,
) -> Result<()> {
    if in_place && output.is_some() {
        anyhow::bail!("--in-place and --output are mutually exclusive");
    }

    let original = read_input(&source)?;
    let description = read_input(&changes)?;

    let result = process(&original, &description);
    let target = if in_place { Some(source.clone()) } else { output };

    if json {
        let outcome = ProcessOutcome::from(result);
        if let (ProcessOutcome::Success { processed_code }, Some(path)) = (&outcome, &target) {
            if !dry_run {
                atomic_write(path, processed_code)?;
            }
        }
        println!("{}", serde_json::to_string(&outcome)?);
        if matches!(outcome, ProcessOutcome::Failure { .. }) {
            std::process::exit(1);
        }
        return Ok(());
    }

    let patched = match result {
        Ok(patched) => patched,
        Err(e) => {
            eprintln!("{} {}", "✗".red(), e);
            std::process::exit(1);
        }
    };

    if show_diff {
        display_diff(&source, &original, &patched);
        println!();
    }

    match &target {
        Some(path) if dry_run => {
            println!("{} dry run - would patch {}", "⊙".yellow(), path.display());
        }
        Some(path) => {
            atomic_write(path, &patched)?;
            println!("{} patched {}", "✓".green(), path.display());
        }
        None => {
            if !show_diff {
                print!("{}", patched);
            }
        }
    }

    Ok(())
}

fn cmd_check(changes: PathBuf, json: bool) -> Result<()> {
    let description = read_input(&changes)?;

    let parsed = match parse_changes(&description) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("{} {}", "✗".red(), e);
            std::process::exit(1);
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&parsed)?);
        return Ok(());
    }

    println!(
        "{}",
        format!("{} change(s) in {}", parsed.len(), changes.display()).bold()
    );
    for change in &parsed {
        let span = match change.kind {
            ChangeKind::InsertBetween => format!(
                "between lines {} and {}",
                change.from.line, change.to.line
            ),
            _ => format!("lines {}-{}", change.from.line, change.to.line),
        };
        match &change.content {
            Some(content) => println!(
                "  {} {} {} ({}, {} content line(s))",
                "✓".green(),
                change.kind,
                change.file_tag,
                span,
                content.split('\n').count()
            ),
            None => println!(
                "  {} {} {} ({})",
                "✓".green(),
                change.kind,
                change.file_tag,
                span
            ),
        }
    }

    Ok(())
}

fn cmd_verify(source: PathBuf, changes: PathBuf) -> Result<()> {
    let original = read_input(&source)?;
    let description = read_input(&changes)?;

    let parsed = match parse_changes(&description) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("{} {}", "✗".red(), e);
            std::process::exit(1);
        }
    };

    match process(&original, &description) {
        Ok(_) => {
            println!(
                "{} {} change(s) verified against {}",
                "✓".green(),
                parsed.len(),
                source.display()
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("{} verification failed", "✗".red());
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}

/// Show a unified diff between the original and patched text.
fn display_diff(file: &Path, original: &str, patched: &str) {
    println!("{}", format!("--- {} (original)", file.display()).dimmed());
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, patched);

    for change in diff.iter_all_changes() {
        let line = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", line);
    }
}

/// Atomic file write: tempfile in the target directory + fsync + rename.
fn atomic_write(path: &Path, content: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create tempfile next to {}", path.display()))?;
    temp.write_all(content.as_bytes())?;
    temp.as_file().sync_all()?;
    temp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("failed to replace {}", path.display()))?;

    Ok(())
}
