use anyhow::{Context, Result};
use indicatif::{HumanBytes, MultiProgress, ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::config::RunConfig;
use crate::downloader::Downloader;
use crate::headers::{self, HeaderLayers, HeaderSet};
use crate::report::{self, DirectoryReport, Reporter, RunSummary};
use crate::scheduler::{self, Scheduler};
use crate::state::{DownloadOutcome, DownloadRequest};

/// Reads the URL list: one URL per line, surrounding whitespace trimmed,
/// blank lines ignored.
pub async fn read_url_list(path: &Path) -> Result<Vec<String>> {
    let file = fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open URL file: {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();
    let mut urls = Vec::new();
    while let Some(line) = lines.next_line().await? {
        let url = line.trim();
        if !url.is_empty() {
            urls.push(url.to_string());
        }
    }
    Ok(urls)
}

async fn resolve_headers(config: &RunConfig) -> Result<HeaderSet> {
    let base = match &config.header_file {
        Some(path) => headers::load_header_file(path).await?,
        None => HeaderSet::new(),
    };
    Ok(HeaderLayers::new(base, config.explicit_headers.clone()).resolve())
}

fn print_headers(headers: &HeaderSet) {
    println!("Using custom headers:");
    for (key, value) in headers {
        println!("  {}: {}", key, headers::mask_value(key, value));
    }
    println!();
}

fn progress_bar(progress: &MultiProgress, total: usize) -> Result<ProgressBar> {
    let pb = progress.add(ProgressBar::new(total as u64));
    pb.set_style(ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
    )?
    .progress_chars("=>-"));
    pb.set_message("(Success: 0, Failed: 0)");
    Ok(pb)
}

/// Prints one outcome line to `out` with the bars cleared. Unlike
/// `ProgressBar::println`, this still prints when the bar is hidden.
fn print_outcome(
    pb: &ProgressBar,
    out: &mut impl Write,
    outcome: &DownloadOutcome,
) -> io::Result<()> {
    pb.suspend(|| writeln!(out, "{}", outcome))
}

/// Runs a full download pass and prints the report. Item failures, including
/// an output root that cannot be created, are part of the summary; only
/// setup failures such as an unreadable URL file are errors.
pub async fn run_downloads(config: RunConfig, progress: MultiProgress) -> Result<RunSummary> {
    let custom_headers = resolve_headers(&config).await?;
    if config.verbose && !custom_headers.is_empty() {
        print_headers(&custom_headers);
    }

    let urls = read_url_list(&config.url_file).await?;

    println!("Found {} JavaScript URLs to download", urls.len());
    println!("Output directory: {}", config.output_dir.display());
    println!("Concurrent downloads: {}", config.concurrency);
    if !custom_headers.is_empty() {
        println!("Using {} custom header(s)", custom_headers.len());
    }
    println!("Maintaining directory structure based on URL paths\n");

    let (urls, removed) = scheduler::dedup_urls(urls);
    if removed > 0 {
        println!("Removed {} duplicate URLs", removed);
    }

    // Each item creates its own directories and fails on its own if it can't.
    if let Err(err) = fs::create_dir_all(&config.output_dir).await {
        warn!(
            path = %config.output_dir.display(),
            error = %err,
            "could not create output directory"
        );
    }

    let header_map = Arc::new(headers::to_header_map(&custom_headers));
    let requests: Vec<DownloadRequest> = urls
        .into_iter()
        .map(|url| DownloadRequest::new(url, Arc::clone(&header_map)))
        .collect();
    let total = requests.len();

    let downloader = Arc::new(Downloader::new(&config.output_dir, &config.fetcher)?);
    let scheduler = Scheduler::new(downloader, config.concurrency);
    info!(total, concurrency = config.concurrency, "starting downloads");

    let pb = progress_bar(&progress, total)?;
    let mut reporter = Reporter::new();
    let mut stdout = io::stdout();
    scheduler
        .run(requests, |outcome| {
            if let Err(err) = print_outcome(&pb, &mut stdout, outcome) {
                warn!(error = %err, "could not print outcome");
            }
            reporter.record(outcome);
            let summary = reporter.summary();
            pb.inc(1);
            pb.set_message(format!(
                "(Success: {}, Failed: {})",
                summary.success_count, summary.failed_count
            ));
        })
        .await?;
    pb.finish();

    let mut summary = reporter.finish();
    println!(
        "\n\nDownload completed: {} success, {} failed",
        summary.success_count, summary.failed_count
    );

    if report::write_failed_urls(&summary.failed_urls, &config.failed_file).await? {
        println!("Failed URLs saved to {}", config.failed_file.display());
    }

    let root: PathBuf = config.output_dir.clone();
    let tree = tokio::task::spawn_blocking(move || DirectoryReport::scan(&root))
        .await
        .context("directory scan task join")?;
    summary.total_files = tree.total_files;
    summary.total_bytes = tree.total_bytes;

    println!("\nDirectory structure created:");
    println!("{}", tree);
    info!(
        written = %HumanBytes(summary.bytes_written),
        on_disk = %HumanBytes(summary.total_bytes),
        "run finished"
    );

    Ok(summary)
}
