use anyhow::{Context, Result, anyhow};
use clap::{ArgAction, Parser, ValueEnum};
use dialoguer::Confirm;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use shotcull::config::{DEFAULT_BACKUP_DIR, DEFAULT_REPORT_FILE, DEFAULT_RESIZE};
use shotcull::ocr::OcrOptions;
use shotcull::prefilter::{BlankFilter, DEFAULT_MIN_BYTES};
use shotcull::{
    Analysis, Analyzer, CleanupReport, ClusterStrategy, DedupConfig, DownsampledCorrelation,
    RelocationMode, TesseractExtractor, Thresholds, apply,
};

const PREVIEW_CHARS: usize = 60;
const LISTED_DUPLICATES: usize = 3;

#[derive(Parser, Debug)]
#[command(
    name = "shotcull",
    version,
    about = "Clean up screenshots using OCR text similarity AND image similarity"
)]
struct Cli {
    /// Directory containing screenshots
    #[arg(value_name = "DIR")]
    directory: PathBuf,

    /// Text similarity threshold (0.0-1.0)
    #[arg(long, default_value_t = 0.8, value_parser = unit_interval)]
    text_similarity: f64,

    /// Image similarity threshold (0.0-1.0)
    #[arg(long, default_value_t = 0.95, value_parser = unit_interval)]
    image_similarity: f64,

    /// Actually perform cleanup (default is dry run)
    #[arg(long)]
    execute: bool,

    /// Delete duplicates instead of moving them to the backup directory
    #[arg(long)]
    no_backup: bool,

    /// How records are clustered
    #[arg(long, value_enum, default_value_t = Strategy::Greedy)]
    strategy: Strategy,

    /// Fraction of the image height, from the top, read by OCR
    #[arg(long, default_value_t = 0.5)]
    crop_fraction: f64,

    /// Side of the grayscale grid used for pixel comparison
    #[arg(long, default_value_t = DEFAULT_RESIZE)]
    resize: u32,

    /// Tesseract page segmentation mode
    #[arg(long, default_value_t = 6)]
    psm: u8,

    /// Tesseract recognition language(s)
    #[arg(long, default_value = "eng")]
    lang: String,

    /// Tesseract executable
    #[arg(long, env = "SHOTCULL_TESSERACT", default_value = "tesseract")]
    tesseract: String,

    /// Image extension to scan for (repeatable)
    #[arg(long = "ext", value_name = "EXT", default_values_t = vec!["png".to_string()])]
    extensions: Vec<String>,

    /// Also cull blank captures (tiny files, loading/fullscreen prompts)
    #[arg(long)]
    drop_blank: bool,

    /// Files smaller than this many bytes count as blank
    #[arg(long, default_value_t = DEFAULT_MIN_BYTES, requires = "drop_blank")]
    min_bytes: u64,

    /// Directory to move duplicates into (default: `<DIR>/duplicates_backup`)
    #[arg(long, value_name = "DIR", conflicts_with = "no_backup")]
    backup_dir: Option<PathBuf>,

    /// Write the JSON report here (default after --execute: `<DIR>/cleanup_report.json`)
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Do not ask before deleting
    #[arg(short, long)]
    yes: bool,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Strategy {
    /// Compare against group representatives only, first match wins
    Greedy,
    /// Merge every pair that matches
    Transitive,
}

impl From<Strategy> for ClusterStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Greedy => ClusterStrategy::RepresentativeGreedy,
            Strategy::Transitive => ClusterStrategy::TransitiveClosure,
        }
    }
}

impl Cli {
    fn config(&self) -> DedupConfig {
        DedupConfig {
            thresholds: Thresholds::new(self.text_similarity, self.image_similarity),
            strategy: self.strategy.into(),
            resize: self.resize,
            ocr: OcrOptions {
                binary: self.tesseract.clone(),
                lang: self.lang.clone(),
                psm: self.psm,
                crop_fraction: self.crop_fraction,
            },
            extensions: self.extensions.clone(),
            blank_filter: self
                .drop_blank
                .then(|| BlankFilter::default().with_min_bytes(self.min_bytes)),
        }
    }

    fn relocation_mode(&self) -> RelocationMode {
        if self.no_backup {
            RelocationMode::Delete
        } else {
            RelocationMode::Backup {
                dir: self
                    .backup_dir
                    .clone()
                    .unwrap_or_else(|| self.directory.join(DEFAULT_BACKUP_DIR)),
            }
        }
    }
}

fn unit_interval(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("`{s}` is not a number"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is not within 0.0-1.0"))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.config();
    config.validate()?;

    let extractor = TesseractExtractor::new(config.ocr.clone()).map_err(|e| {
        anyhow!(
            "❌ Tesseract OCR not found! ({e})\n   \
             Install with: sudo apt-get install tesseract-ocr\n   \
             macOS: brew install tesseract"
        )
    })?;
    let comparator = DownsampledCorrelation::new(config.resize);

    println!("▶ Analyzing screenshots in: {}", cli.directory.display());
    let analyzer = Analyzer::new(config, &extractor, &comparator)
        .with_progress(std::io::stderr().is_terminal());
    let analysis = benchmark("analysis", || analyzer.analyze(&cli.directory))
        .with_context(|| format!("Failed to analyze {}", cli.directory.display()))?;

    if analysis.is_empty() {
        println!("No image files found in {}", cli.directory.display());
        return Ok(());
    }

    print_summary(&analysis);

    if !cli.execute {
        println!("🔍 DRY RUN - No files will be modified");
        println!("   Use --execute to actually perform cleanup");
        if let Some(path) = &cli.report {
            CleanupReport::new(&analysis, None).write(path)?;
            println!("   Report saved: {}", path.display());
        }
        return Ok(());
    }

    let mode = cli.relocation_mode();
    let pending = analysis.files_to_relocate().len();
    if pending == 0 {
        println!("Nothing to clean up.");
    } else if matches!(mode, RelocationMode::Delete) && !cli.yes && std::io::stdin().is_terminal() {
        let confirmed = Confirm::new()
            .with_prompt(format!("Permanently delete {pending} file(s)?"))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Aborted; no files were changed.");
            return Ok(());
        }
    }

    if let RelocationMode::Backup { dir } = &mode {
        println!("📁 Backup directory: {}", dir.display());
    }
    let outcomes = apply(&analysis, &mode)?;
    for outcome in &outcomes {
        let name = outcome
            .source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match (&outcome.error, &outcome.destination) {
            (Some(err), _) => eprintln!("⚠️  Failed on {name}: {err}"),
            (None, Some(dest)) => println!("   📦 Moved {name} → {}", dest.display()),
            (None, None) => println!("   🗑️  Deleted {name}"),
        }
    }

    let failed = outcomes.iter().filter(|o| !o.succeeded()).count();
    println!("\n✅ Cleanup complete!");
    println!("   Processed: {} file(s), {} failed", outcomes.len(), failed);
    println!(
        "   Remaining: {} unique screenshots",
        analysis.grouping.unique_count()
    );

    let report_path = cli
        .report
        .clone()
        .unwrap_or_else(|| cli.directory.join(DEFAULT_REPORT_FILE));
    CleanupReport::new(&analysis, Some((&mode, outcomes.as_slice()))).write(&report_path)?;
    println!("   Report saved: {}", report_path.display());

    Ok(())
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_summary(analysis: &Analysis) {
    let grouping = &analysis.grouping;
    let total = analysis.total_files;
    let unique = grouping.unique_count();

    println!("\n📊 Analysis Results:");
    println!("   Total screenshots: {total}");
    println!("   Unique groups: {unique}");
    println!("   Duplicates to remove: {}", grouping.duplicate_count());
    if !analysis.blanks.is_empty() {
        println!("   Blank screenshots: {}", analysis.blanks.len());
    }
    println!(
        "   Retention rate: {unique}/{total} ({:.1}%)",
        100.0 * unique as f64 / total as f64
    );
    println!(
        "   Thresholds: text≥{:.2}, image≥{:.2} ({})",
        grouping.thresholds.text, grouping.thresholds.image, grouping.strategy
    );

    println!("\n📋 Unique Groups:");
    for (i, group) in grouping.groups.iter().enumerate() {
        let rep = &group.representative;
        println!("\n✨ Group {}: {}", i + 1, rep.name);
        println!("     Text: '{}'", preview(&rep.extracted_text));
        println!("     Size: {:.1}KB", rep.file_size as f64 / 1024.0);

        if !group.members.is_empty() {
            println!("     Duplicates: {}", group.members.len());
            for member in group.members.iter().take(LISTED_DUPLICATES) {
                println!(
                    "       📦 {} (text: {:.2}, image: {:.2})",
                    member.record.name, member.scores.text, member.scores.image
                );
            }
            if group.members.len() > LISTED_DUPLICATES {
                println!(
                    "       ... and {} more",
                    group.members.len() - LISTED_DUPLICATES
                );
            }
        }
    }

    if !analysis.blanks.is_empty() {
        println!("\n🗑️  Blank screenshots:");
        for blank in &analysis.blanks {
            println!("       {} ({:?})", blank.name, blank.reason);
        }
    }
    println!();
}

fn preview(text: &str) -> String {
    if text.chars().count() > PREVIEW_CHARS {
        let head: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

/// Run `f()`, log how long it took (with `label`), and return its result.
fn benchmark<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    let start = Instant::now();
    let result = f();
    log::info!("⏱ {} took {:.2?}", label, start.elapsed());
    result
}
