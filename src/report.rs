use anyhow::{Context, Result};
use indicatif::HumanCount;
use std::cmp::Ordering;
use std::fmt;
use std::path::Path;
use tokio::fs;
use walkdir::WalkDir;

use crate::mapper::JS_EXTENSION;
use crate::state::{DownloadOutcome, OutcomeStatus};

/// Directory depth below which files are still listed in the tree.
const TREE_FILE_DEPTH: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Includes skipped URLs.
    pub success_count: usize,
    pub skipped_count: usize,
    pub failed_count: usize,
    /// In the order failures were observed.
    pub failed_urls: Vec<String>,
    /// Bytes written during this run.
    pub bytes_written: u64,
    /// Script files found under the output root after the run.
    pub total_files: usize,
    pub total_bytes: u64,
}

/// Accumulates outcomes as they complete.
#[derive(Debug, Default)]
pub struct Reporter {
    summary: RunSummary,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: &DownloadOutcome) {
        let summary = &mut self.summary;
        if outcome.status.is_success() {
            summary.success_count += 1;
            if outcome.status == OutcomeStatus::Skipped {
                summary.skipped_count += 1;
            }
        } else {
            summary.failed_count += 1;
            summary.failed_urls.push(outcome.url.clone());
        }
        summary.bytes_written += outcome.bytes_written.unwrap_or(0);
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn finish(self) -> RunSummary {
        self.summary
    }
}

/// Writes one URL per line to `path`. Nothing is written for an empty list.
/// Returns whether the file was written.
pub async fn write_failed_urls(failed_urls: &[String], path: &Path) -> Result<bool> {
    if failed_urls.is_empty() {
        return Ok(false);
    }
    let mut content = failed_urls.join("\n");
    content.push('\n');
    fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write failed URL list: {}", path.display()))?;
    Ok(true)
}

/// Read-only scan of the output root: an indented tree plus script totals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryReport {
    pub lines: Vec<String>,
    pub total_files: usize,
    pub total_bytes: u64,
}

impl DirectoryReport {
    /// Directories are listed at every depth, script files down to
    /// [`TREE_FILE_DEPTH`]. Files come before subdirectories, each sorted by
    /// name. A missing root yields an empty report.
    pub fn scan(root: &Path) -> Self {
        let mut report = Self::default();
        let walker = WalkDir::new(root)
            .min_depth(1)
            .sort_by(|a, b| match (a.file_type().is_dir(), b.file_type().is_dir()) {
                (false, true) => Ordering::Less,
                (true, false) => Ordering::Greater,
                _ => a.file_name().cmp(b.file_name()),
            });

        for entry in walker.into_iter().filter_map(|e| e.ok()) {
            let depth = entry.depth();
            let name = entry.file_name().to_string_lossy();
            let indent = "  ".repeat(depth);

            if entry.file_type().is_dir() {
                report.lines.push(format!("{}{}/", indent, name));
                continue;
            }
            if !name.ends_with(JS_EXTENSION) {
                continue;
            }
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            let size = metadata.len();
            report.total_files += 1;
            report.total_bytes += size;
            if depth - 1 < TREE_FILE_DEPTH {
                report
                    .lines
                    .push(format!("{}{} ({} bytes)", indent, name, HumanCount(size)));
            }
        }
        report
    }

    pub fn total_megabytes(&self) -> f64 {
        self.total_bytes as f64 / 1024.0 / 1024.0
    }
}

impl fmt::Display for DirectoryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        write!(
            f,
            "\nTotal: {} files, {} bytes ({:.2} MB)",
            self.total_files,
            HumanCount(self.total_bytes),
            self.total_megabytes()
        )
    }
}
