use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use simimg::config::Config;
use simimg::{
    chi_squared, CancellationToken, ErrorLog, HistogramExtractor, RankOrder, SimilarityRanker,
};
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(name = "simimg", version, about = "Find images that look like a reference image")]
struct Cli {
    /// JSON file with default settings
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Append-only file that unreadable images are logged to
    #[arg(long, value_name = "FILE", global = true)]
    log_file: Option<PathBuf>,

    /// More console logging (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search a folder tree for images similar to a reference image
    Search {
        /// Reference image
        #[arg(value_name = "IMAGE")]
        reference: PathBuf,
        /// Folder to search (recursively)
        #[arg(value_name = "DIR")]
        folder: PathBuf,
        /// Minimum similarity score (0 to 1)
        #[arg(short, long, allow_negative_numbers = true)]
        threshold: Option<f64>,
        /// Maximum number of matches to keep
        #[arg(short = 'n', long, allow_negative_numbers = true)]
        count: Option<i64>,
        /// Sort matches by score instead of keeping walk order
        #[arg(long)]
        sort_by_score: bool,
        /// Visit files sorted by name for a reproducible order
        #[arg(long)]
        sorted_walk: bool,
        /// Directory to write the report into (default: current directory)
        #[arg(long, value_name = "DIR", conflicts_with = "no_report")]
        report_dir: Option<PathBuf>,
        /// Don't write a report file
        #[arg(long)]
        no_report: bool,
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Score one image against another
    Compare {
        #[arg(value_name = "REFERENCE")]
        reference: PathBuf,
        #[arg(value_name = "CANDIDATE")]
        candidate: PathBuf,
    },

    /// Print the histogram signature of an image as JSON
    Signature {
        #[arg(value_name = "IMAGE")]
        image: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let error_log = ErrorLog::new(cli.log_file.unwrap_or_else(|| config.log_file.clone()));

    match cli.command {
        Commands::Search {
            reference,
            folder,
            threshold,
            count,
            sort_by_score,
            sorted_walk,
            report_dir,
            no_report,
            json,
        } => {
            let mut options = config.search_options();
            if let Some(threshold) = threshold {
                options.threshold = threshold;
            }
            if let Some(count) = count {
                options.max_results = simimg::SearchOptions::max_results_from(count);
            }
            if sort_by_score {
                options.order = RankOrder::Score;
            }
            options.sorted_walk |= sorted_walk;
            if let Some(dir) = report_dir {
                options.report_dir = dir;
            }
            options.persist_report = !no_report;

            if !json {
                println!(
                    "▶ Searching {} for images like {}",
                    folder.display(),
                    reference.display()
                );
            }

            let spinner = if json {
                ProgressBar::hidden()
            } else {
                let spinner = ProgressBar::new_spinner();
                spinner.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
                spinner.enable_steady_tick(Duration::from_millis(100));
                spinner
            };

            let ranker = SimilarityRanker::new(&error_log).with_progress(spinner.clone());
            let outcome = benchmark("search", !json, || {
                let outcome =
                    ranker.find_similar(&reference, &folder, &options, &CancellationToken::new());
                spinner.finish_and_clear();
                outcome
            })
            .with_context(|| format!("Search in {:?} failed", folder))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
                return Ok(());
            }

            if outcome.skipped > 0 {
                println!(
                    "⚠️  Skipped {} unreadable image(s); see {}",
                    outcome.skipped,
                    error_log.path().display()
                );
            }

            if outcome.cancelled {
                println!("Search cancelled.");
            } else if outcome.matches.is_empty() {
                println!("No similar images found.");
            } else {
                println!(
                    "Similar images to '{}' (similarity threshold {:?} or higher):",
                    reference.display(),
                    options.threshold
                );
                for (i, m) in outcome.matches.iter().enumerate() {
                    println!("{}. {} ({:.4})", i + 1, m.path.display(), m.score);
                }
                if let Some(report) = &outcome.report {
                    println!("\n✅ Similar images logged to '{}'", report.display());
                }
            }
        }

        Commands::Compare {
            reference,
            candidate,
        } => {
            let extractor = HistogramExtractor::default();
            let a = extractor
                .compute_signature(&reference)
                .context("Reference image is not readable")?;
            let b = extractor
                .compute_signature(&candidate)
                .context("Candidate image is not readable")?;

            let distance = chi_squared(&a, &b);
            println!("Chi-squared distance: {:.6}", distance);
            println!(
                "Similarity score:     {:.6}",
                simimg::core::similarity::similarity_from_distance(distance)
            );
        }

        Commands::Signature { image } => {
            let signature = HistogramExtractor::default()
                .compute_signature(&image)
                .context("Image is not readable")?;
            println!("{}", serde_json::to_string(&signature)?);
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Run `f()`, print how long it took (with `label`) when `report` is set, and return its result.
fn benchmark<T, F: FnOnce() -> T>(label: &str, report: bool, f: F) -> T {
    let start = Instant::now();
    let result = f();
    if report {
        println!("⏱ {} took {:.2?}", label, start.elapsed());
    }
    result
}
