use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::fs;
use std::path::{Path, PathBuf};
use text_patcher::config::{load_from_path, DocumentFormat, PatchDocument};
use text_patcher::edit::atomic_write;
use text_patcher::{
    apply_patch, compute_patch, invert_patch, ApplyMode, EditResult, Encoding, FileEdit,
};

#[derive(Parser)]
#[command(name = "text-patcher")]
#[command(about = "Compute, apply and undo minimal text patches", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute a patch document turning one file into another
    Diff {
        /// Original text
        before: PathBuf,

        /// Rewritten text
        after: PathBuf,

        /// Name recorded in the document (defaults to the file name)
        #[arg(long)]
        name: Option<String>,

        /// Offset unit for the spans: utf8, utf16 or char
        #[arg(short, long, default_value = "utf8")]
        encoding: Encoding,

        /// Document format: toml or json (defaults to the output extension)
        #[arg(short, long)]
        format: Option<DocumentFormat>,

        /// Write the document here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also print a colored line diff to stderr
        #[arg(long)]
        show: bool,
    },

    /// Apply a patch document to a file
    Apply {
        /// File to patch
        file: PathBuf,

        /// Patch document (.toml or .json)
        patch: PathBuf,

        /// Apply best effort when the file has drifted
        #[arg(long)]
        safe: bool,

        /// Print the outcome without writing the file
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Write the document that undoes a patch
    Invert {
        /// Text the patch applies to
        original: PathBuf,

        /// Patch document to invert
        patch: PathBuf,

        /// Document format: toml or json (defaults to the output extension)
        #[arg(short, long)]
        format: Option<DocumentFormat>,

        /// Write the document here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check whether a patch applies cleanly to a file
    Check {
        /// File to check
        file: PathBuf,

        /// Patch document (.toml or .json)
        patch: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    match cli.command {
        Commands::Diff {
            before,
            after,
            name,
            encoding,
            format,
            output,
            show,
        } => cmd_diff(&before, &after, name, encoding, format, output, show),

        Commands::Apply {
            file,
            patch,
            safe,
            dry_run,
            diff,
        } => cmd_apply(&file, &patch, safe, dry_run, diff),

        Commands::Invert {
            original,
            patch,
            format,
            output,
        } => cmd_invert(&original, &patch, format, output),

        Commands::Check { file, patch } => cmd_check(&file, &patch),
    }
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Helper: Render a document and write it to `output` or stdout.
fn emit_document(
    document: &PatchDocument,
    format: Option<DocumentFormat>,
    output: Option<&Path>,
) -> Result<()> {
    let format = format
        .or_else(|| output.map(DocumentFormat::from_path))
        .unwrap_or_default();
    let rendered = format.render(document)?;

    match output {
        Some(path) => {
            atomic_write(path, rendered.as_bytes())?;
            eprintln!("{} Wrote {}", "✓".green(), path.display());
        }
        None => print!("{rendered}"),
    }
    Ok(())
}

/// Helper: Show unified diff between original and modified content
fn display_diff(label: &str, original: &str, modified: &str) {
    eprintln!("\n{}", format!("--- {label} (original)").dimmed());
    eprintln!("{}", format!("+++ {label} (patched)").dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        eprint!("{}", sign);
    }
}

fn cmd_diff(
    before_path: &Path,
    after_path: &Path,
    name: Option<String>,
    encoding: Encoding,
    format: Option<DocumentFormat>,
    output: Option<PathBuf>,
    show: bool,
) -> Result<()> {
    let before = read_text(before_path)?;
    let after = read_text(after_path)?;

    let patch = compute_patch(&before, &after);
    if patch.is_empty() {
        eprintln!("{}", "Files are identical, patch is empty".yellow());
    }

    let name = name.unwrap_or_else(|| {
        before_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "patch".to_string())
    });
    let document = PatchDocument::from_patch(name, &before, &patch, encoding)?;

    if show {
        display_diff(&before_path.display().to_string(), &before, &after);
    }

    emit_document(&document, format, output.as_deref())
}

fn cmd_apply(
    file: &Path,
    patch_path: &Path,
    safe: bool,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    let document = load_from_path(patch_path)?;
    let content = read_text(file)?;
    let verification = document.verification();

    let drifted = verification.as_ref().is_some_and(|v| !v.matches(&content));
    if drifted && document.is_applied_to(&content) {
        println!(
            "{} {}: Already applied to {}",
            "⊙".yellow(),
            document.meta.name,
            file.display()
        );
        return Ok(());
    }

    let mode = if safe { ApplyMode::Safe } else { ApplyMode::Strict };
    if mode == ApplyMode::Strict {
        if let Some(verification) = &verification {
            if let Err(e) = verification.ensure_matches(file, &content) {
                report_conflict(&document.meta.name, &e, true);
            }
        }
    }

    let patch = match mode {
        ApplyMode::Strict => document.patch_for(&content).with_context(|| {
            format!(
                "patch '{}' does not fit {}",
                document.meta.name,
                file.display()
            )
        })?,
        ApplyMode::Safe => document.patch_for_lossy(&content),
    };
    let edit = FileEdit::with_verification(file, patch, verification);

    if dry_run {
        println!("{}", "[DRY RUN - showing what would be applied]".cyan());
        let patched = edit.preview(mode)?;
        if patched == content {
            println!("{} {}: No change", "⊙".yellow(), document.meta.name);
        } else {
            println!(
                "{} {}: Would apply to {}",
                "✓".green(),
                document.meta.name,
                file.display()
            );
        }
        if show_diff {
            display_diff(&file.display().to_string(), &content, &patched);
        }
        return Ok(());
    }

    match edit.apply(mode) {
        Ok(EditResult::Applied {
            file: ref path,
            bytes_changed,
        }) => {
            println!(
                "{} {}: Applied to {} ({} bytes changed)",
                "✓".green(),
                document.meta.name,
                path.display(),
                bytes_changed
            );
            if show_diff {
                let patched = read_text(path)?;
                display_diff(&path.display().to_string(), &content, &patched);
            }
            Ok(())
        }
        Ok(EditResult::Unchanged { file: path }) => {
            println!(
                "{} {}: No change to {}",
                "⊙".yellow(),
                document.meta.name,
                path.display()
            );
            Ok(())
        }
        Err(e) => report_conflict(&document.meta.name, &e, drifted),
    }
}

/// Helper: Print a failed apply and exit with status 1.
fn report_conflict(name: &str, error: &dyn std::fmt::Display, drifted: bool) -> ! {
    eprintln!("{} {}: Failed - {}", "✗".red(), name, error);
    if drifted {
        eprintln!("  {}", "CONFLICT: file changed since the patch was computed".red());
        eprintln!("  Action: recompute the patch, or retry with --safe to apply best effort");
    }
    std::process::exit(1);
}

fn cmd_invert(
    original_path: &Path,
    patch_path: &Path,
    format: Option<DocumentFormat>,
    output: Option<PathBuf>,
) -> Result<()> {
    let document = load_from_path(patch_path)?;
    let original = read_text(original_path)?;

    if let Some(verification) = document.verification() {
        if !verification.matches(&original) {
            anyhow::bail!(
                "{} does not match the base text of patch '{}'",
                original_path.display(),
                document.meta.name
            );
        }
    }

    let patch = document.patch_for(&original)?;
    let patched = apply_patch(&original, &patch)?;
    let inverse = invert_patch(&original, &patch)?;

    let mut inverse_document = PatchDocument::from_patch(
        format!("{}-inverse", document.meta.name),
        &patched,
        &inverse,
        document.meta.encoding,
    )?;
    inverse_document.meta.description = Some(format!("Undoes patch '{}'", document.meta.name));

    emit_document(&inverse_document, format, output.as_deref())
}

fn cmd_check(file: &Path, patch_path: &Path) -> Result<()> {
    let document = load_from_path(patch_path)?;
    let content = read_text(file)?;
    let name = &document.meta.name;

    let verified = document
        .verification()
        .map_or(true, |verification| verification.matches(&content));

    if verified {
        match document
            .patch_for(&content)
            .and_then(|patch| apply_patch(&content, &patch))
        {
            Ok(_) => {
                println!("{} {}: Applies cleanly to {}", "✓".green(), name, file.display());
                return Ok(());
            }
            Err(e) => {
                eprintln!("{} {}: Invalid - {}", "✗".red(), name, e);
                std::process::exit(1);
            }
        }
    }

    if document.is_applied_to(&content) {
        println!("{} {}: Already applied to {}", "⊙".yellow(), name, file.display());
        return Ok(());
    }

    eprintln!("{} {}: DRIFTED", "✗".red(), name);
    eprintln!("  Expected: base text the patch was computed against");
    eprintln!("  Found: {} has changed", file.display());
    std::process::exit(1);
}
