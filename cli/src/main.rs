//! pdf-outline CLI - batch heading outline extraction

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use pdf_outline::{
    discover_inputs, BatchItem, BatchProcessor, BatchSummary, ExtractorConfig, OutlineCache,
    OutlineExtractor,
};

#[derive(Parser)]
#[command(name = "pdf-outline")]
#[command(author = "iyulab")]
#[command(version)]
#[command(about = "Extract titles and heading outlines from PDFs to JSON", long_about = None)]
struct Cli {
    /// Directory containing PDF files
    #[arg(short, long, value_name = "DIR", env = "PDF_OUTLINE_INPUT")]
    input: Option<PathBuf>,

    /// Directory for JSON results
    #[arg(short, long, value_name = "DIR", env = "PDF_OUTLINE_OUTPUT")]
    output: Option<PathBuf>,

    /// Configuration file (defaults to ./config.json when present)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Maximum number of worker threads
    #[arg(short, long)]
    workers: Option<usize>,

    /// Disable the result cache
    #[arg(long, global = true)]
    no_cache: bool,

    /// Cache directory
    #[arg(long, value_name = "DIR", global = true)]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the outline of a single PDF
    Extract {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Inspect or clear the result cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show entry count and disk usage
    Stats,
    /// Remove every cached entry
    Clear,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match &cli.command {
        Some(Commands::Extract { input, output }) => {
            cmd_extract(&cli, input, output.as_deref())
        }
        Some(Commands::Cache { action }) => cmd_cache(&cli, action),
        Some(Commands::Version) => {
            cmd_version();
            Ok(())
        }
        None => cmd_batch(&cli),
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

/// Resolve configuration and apply command-line overrides.
fn load_config(cli: &Cli) -> ExtractorConfig {
    let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut config = ExtractorConfig::load_or_default(cli.config.as_deref(), &base_dir);

    if let Some(workers) = cli.workers {
        config.batch.max_workers = workers.max(1);
    }
    if cli.no_cache {
        config.cache.enabled = false;
    }
    if let Some(dir) = &cli.cache_dir {
        config.cache.cache_dir = dir.clone();
    }
    config
}

fn cmd_batch(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let (input_dir, output_dir) =
        prepare_dirs(cli.input.as_deref(), cli.output.as_deref(), Path::new(""))?;

    let files = discover_inputs(&input_dir)?;
    if files.is_empty() {
        println!(
            "{} No PDF files found in {}",
            "!".yellow().bold(),
            input_dir.display()
        );
        println!("  Add PDF files to the input directory and try again.");
        return Ok(());
    }

    let config = load_config(cli);
    let extractor = Arc::new(OutlineExtractor::from_config(&config));
    let batch = BatchProcessor::new(extractor, config.batch.clone());

    println!(
        "{} {} PDF files from {}",
        "Processing".cyan().bold(),
        files.len(),
        input_dir.display()
    );

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let summary = batch.run_with_progress(&files, &output_dir, |item| {
        pb.println(status_line(item));
        pb.set_message(item.file_name.clone());
        pb.inc(1);
    });
    pb.finish_and_clear();

    print_summary(&summary, &output_dir);
    Ok(())
}

/// Resolve the batch directories under `base`.
///
/// The default `input/` is created on first run; an explicit input directory
/// must already exist. The output directory is always created.
fn prepare_dirs(
    input: Option<&Path>,
    output: Option<&Path>,
    base: &Path,
) -> io::Result<(PathBuf, PathBuf)> {
    let input_dir = match input {
        Some(dir) if !dir.is_dir() => {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Input directory not found: {}", dir.display()),
            ));
        }
        Some(dir) => dir.to_path_buf(),
        None => {
            let dir = base.join("input");
            fs::create_dir_all(&dir)?;
            dir
        }
    };

    let output_dir = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| base.join("output"));
    fs::create_dir_all(&output_dir)?;
    Ok((input_dir, output_dir))
}

fn status_line(item: &BatchItem) -> String {
    if item.success {
        format!(
            "  {} {} ({} headings, {:.3}s)",
            "✓".green(),
            item.file_name,
            item.outline_items,
            item.duration.as_secs_f64()
        )
    } else {
        format!(
            "  {} {} failed after {} attempts in {:.3}s: {}",
            "✗".red(),
            item.file_name,
            item.attempts,
            item.duration.as_secs_f64(),
            item.error.as_deref().unwrap_or("unknown error")
        )
    }
}

fn print_summary(summary: &BatchSummary, output_dir: &Path) {
    println!();
    println!("{}", "Processing Summary".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    let succeeded = format!("{}/{}", summary.succeeded(), summary.total());
    if summary.failed() == 0 {
        println!("{}: {}", "Successful".bold(), succeeded.green());
    } else {
        println!("{}: {}", "Successful".bold(), succeeded.yellow());
        println!("{}: {}", "Failed".bold(), summary.failed().to_string().red());
    }
    println!(
        "{}: {:.3}s",
        "Total time".bold(),
        summary.total_duration().as_secs_f64()
    );
    println!(
        "{}: {:.3}s",
        "Average per file".bold(),
        summary.average_duration().as_secs_f64()
    );
    println!("{}: {}", "Workers used".bold(), summary.workers);
    println!(
        "{}: {:.2}s",
        "Wall time".bold(),
        summary.wall_time.as_secs_f64()
    );

    let output = output_dir
        .canonicalize()
        .unwrap_or_else(|_| output_dir.to_path_buf());
    println!("\n{} {}", "Results saved to".green(), output.display());
}

fn cmd_extract(
    cli: &Cli,
    input: &Path,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(cli);
    let extractor = OutlineExtractor::from_config(&config);
    let result = extractor.extract(input)?;
    let json = result.to_json_pretty()?;

    if let Some(path) = output {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, &json)?;
        println!("{} {}", "Saved to".green(), path.display());
    } else {
        println!("{}", json);
    }

    Ok(())
}

fn cmd_cache(cli: &Cli, action: &CacheAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(cli);
    let cache = OutlineCache::open(&config.cache)?;

    match action {
        CacheAction::Stats => {
            let stats = cache.stats();
            println!("{}", "Cache Statistics".cyan().bold());
            println!("{}", "─".repeat(40).dimmed());
            println!("{}: {}", "Directory".bold(), stats.cache_dir.display());
            println!("{}: {}", "Entries".bold(), stats.entries);
            println!("{}: {:.2} MB", "Size".bold(), stats.total_mb());
            println!(
                "{}: {} days",
                "Retention".bold(),
                config.cache.retention_days
            );
        }
        CacheAction::Clear => {
            let removed = cache.invalidate_all();
            println!("{} {} cache entries", "Removed".green(), removed);
        }
    }

    Ok(())
}

fn cmd_version() {
    println!("{} {}", "pdf-outline".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("PDF heading outline extraction tool");
    println!();
    println!("License: MIT");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_dirs_created() {
        let dir = TempDir::new().unwrap();
        let (input, output) = prepare_dirs(None, None, dir.path()).unwrap();
        assert_eq!(input, dir.path().join("input"));
        assert!(input.is_dir());
        assert!(output.is_dir());
    }

    #[test]
    fn test_missing_explicit_input_not_created() {
        let dir = TempDir::new().unwrap();
        let typo = dir.path().join("inptu");
        let output = dir.path().join("out");

        let err = prepare_dirs(Some(&typo), Some(&output), dir.path()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(!typo.exists());
    }

    #[test]
    fn test_explicit_dirs_used() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("papers");
        fs::create_dir(&input).unwrap();
        let output = dir.path().join("nested").join("json");

        let resolved = prepare_dirs(Some(&input), Some(&output), dir.path()).unwrap();
        assert_eq!(resolved, (input, output.clone()));
        assert!(output.is_dir());
        assert!(!dir.path().join("input").exists());
    }
}
