// src/main.rs
mod utils;
mod sec;
mod extractors;
mod storage;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use utils::AppError;
use sec::client::{self, FetchConfig};
use sec::FilingPeriod;
use extractors::{CoveredListExtractor, PdfTextSource, Pdftotext};
use storage::StorageManager;

/// Collect SEC 13F covered securities lists
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download the quarterly list PDFs that are not yet present
    Pull {
        /// Directory the raw PDFs are saved to
        #[arg(short, long)]
        output: PathBuf,

        /// Name and email for the SEC user agent, e.g. "Jane Doe jane@example.com"
        #[arg(short = 'a', long, env = "SECLIST_USER_AGENT")]
        user_agent: String,

        /// Delete the output directory before downloading
        #[arg(short, long)]
        replace_existing: bool,

        /// Earliest list year to download
        #[arg(long, default_value_t = client::DEFAULT_MIN_YEAR)]
        min_year: u16,

        /// Page listing the quarterly PDFs
        #[arg(long, default_value = client::SEC_13F_LIST_URL)]
        index_url: String,

        /// Pause before each download, in milliseconds
        #[arg(long, default_value_t = client::DEFAULT_REQUEST_DELAY_MS)]
        delay_ms: u64,
    },
    /// Parse every unparsed PDF in the input directory into CSV
    Parse {
        /// Directory with the raw PDFs
        #[arg(short, long)]
        input: PathBuf,

        /// Directory for the parsed CSV and metadata files
        #[arg(short, long)]
        output: PathBuf,

        /// Delete the output directory before parsing
        #[arg(short, long)]
        replace_existing: bool,

        /// Path to the pdftotext binary
        #[arg(long, env = "PDFTOTEXT_BIN", default_value = "pdftotext")]
        pdftotext: PathBuf,

        /// Debug mode - save the converted layout text of each PDF
        #[arg(short, long)]
        debug: bool,
    },
}

/// Per-document outcome counts for one stage.
#[derive(Debug, Default, PartialEq, Eq)]
struct StageSummary {
    succeeded: usize,
    skipped: usize,
    failed: usize,
}

impl StageSummary {
    /// A stage fails only when every document it attempted failed and nothing
    /// was already in place from an earlier run.
    fn finish(self, stage: &str) -> Result<Self, AppError> {
        tracing::info!(
            "{} finished. Success: {}, Skipped: {}, Failures: {}",
            stage, self.succeeded, self.skipped, self.failed
        );
        if self.succeeded == 0 && self.skipped == 0 && self.failed > 0 {
            return Err(AppError::Processing(format!("{} failed for all {} documents", stage, self.failed)));
        }
        Ok(self)
    }
}

fn progress_bar(len: usize) -> ProgressBar {
    let bar = ProgressBar::new(len as u64);
    let style = ProgressStyle::with_template("{spinner:.cyan} [{bar:40.green/238}] {pos:>3}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Setup Logging (reads RUST_LOG env var)
    utils::logging::setup_logging();

    // 2. Parse CLI Arguments
    let args = Args::parse();
    tracing::debug!("Starting processing for args: {:?}", args);

    // 3. Run the requested stage
    match args.command {
        Command::Pull { output, user_agent, replace_existing, min_year, index_url, delay_ms } => {
            if user_agent.trim().is_empty() {
                return Err(AppError::Config("SEC requires a user agent of the form \"Name email\"".to_string()));
            }
            let config = FetchConfig {
                index_url,
                min_year,
                request_delay: Duration::from_millis(delay_ms),
                ..FetchConfig::new(user_agent)
            };
            pull_indexes(&config, &output, replace_existing).await?;
        }
        Command::Parse { input, output, replace_existing, pdftotext, debug } => {
            let source = Pdftotext::new(pdftotext);
            let extractor = CoveredListExtractor::new();
            parse_indexes(&source, &extractor, &input, &output, replace_existing, debug).await?;
        }
    }

    Ok(())
}

/// Downloads every list on the SEC index page that is missing from `output_dir`.
async fn pull_indexes(config: &FetchConfig, output_dir: &Path, replace_existing: bool) -> Result<StageSummary, AppError> {
    let storage = StorageManager::prepare(output_dir, replace_existing)?;
    let http = client::build_sec_client(config)?;

    let documents = client::fetch_index(&http, config).await?;
    tracing::info!("Found {} quarterly lists since {}", documents.len(), config.min_year);

    // Earlier downloads may use the legacy `4_2005.pdf` naming
    let stored = storage.stored_periods()?;

    let mut summary = StageSummary::default();
    let bar = progress_bar(documents.len());

    for doc in &documents {
        bar.set_message(doc.period.to_string());

        if stored.contains(&doc.period) {
            tracing::debug!("{} already downloaded", doc.period);
            summary.skipped += 1;
        } else {
            let saved = match client::download_document(&http, config, doc).await {
                Ok(content) => storage
                    .save_document(&doc.file_name(), &content)
                    .map(|path| (path, content.len()))
                    .map_err(AppError::from),
                Err(e) => Err(AppError::from(e)),
            };
            match saved {
                Ok((path, size)) => {
                    tracing::info!("Saved {} ({} bytes)", path.display(), size);
                    summary.succeeded += 1;
                }
                Err(e) => {
                    tracing::error!("Failed to pull {} from {}: {}", doc.period, doc.url, e);
                    summary.failed += 1;
                }
            }
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    summary.finish("Pull")
}

/// Parses every PDF in `input_dir` that has no output in `output_dir` yet.
async fn parse_indexes<S: PdfTextSource>(
    source: &S,
    extractor: &CoveredListExtractor,
    input_dir: &Path,
    output_dir: &Path,
    replace_existing: bool,
    debug: bool,
) -> Result<StageSummary, AppError> {
    let storage = StorageManager::prepare(output_dir, replace_existing)?;

    let mut inputs = Vec::new();
    for entry in std::fs::read_dir(input_dir)? {
        let path = entry?.path();
        let is_pdf = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if path.is_file() && is_pdf {
            inputs.push(path);
        }
    }
    inputs.sort();
    tracing::info!("Found {} PDFs in {} (text backend: {})", inputs.len(), input_dir.display(), source.backend_name());

    let mut summary = StageSummary::default();
    let bar = progress_bar(inputs.len());

    for path in &inputs {
        let Some(stem) = document_stem(path) else {
            tracing::warn!("Skipping {}: file name is not valid UTF-8", path.display());
            summary.failed += 1;
            bar.inc(1);
            continue;
        };
        bar.set_message(stem.to_string());

        if storage.has_output(stem) {
            tracing::debug!("{} already parsed", stem);
            summary.skipped += 1;
        } else {
            match parse_one(source, extractor, &storage, path, stem, debug).await {
                Ok(count) => {
                    tracing::info!("Parsed {} securities from {}", count, path.display());
                    summary.succeeded += 1;
                }
                Err(e) => {
                    tracing::error!("Failed to parse {}: {}", path.display(), e);
                    summary.failed += 1;
                }
            }
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    summary.finish("Parse")
}

/// Output files are named after the input's stem, so it must round-trip as UTF-8.
fn document_stem(path: &Path) -> Option<&str> {
    path.file_stem().and_then(|s| s.to_str()).filter(|s| !s.is_empty())
}

async fn parse_one<S: PdfTextSource>(
    source: &S,
    extractor: &CoveredListExtractor,
    storage: &StorageManager,
    path: &Path,
    stem: &str,
    debug: bool,
) -> Result<usize, AppError> {
    let text = source.layout_text(path).await?;

    if debug {
        if let Err(e) = storage.save_layout_text(stem, &text) {
            tracing::warn!("Failed to save layout text for {}: {}", stem, e);
        }
    }

    let period = FilingPeriod::from_path(path);
    if period.is_none() {
        tracing::warn!("File name {} carries no filing period, falling back to page header", path.display());
    }

    let list = extractor.extract_document(&text, &path.display().to_string(), period)?;
    storage.save_records(&list, stem)?;
    storage.save_metadata(&list, stem, path)?;

    Ok(list.records.len())
}
