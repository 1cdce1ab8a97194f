//! Bounded worker pool over the deduplicated request set.
//!
//! Keeps up to `concurrency` downloads in flight; whenever one finishes its
//! outcome is handed out and the next request is started. Outcomes therefore
//! arrive in completion order, not submission order.

use anyhow::{Context, Result};
use futures::FutureExt;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinSet;

use crate::downloader::Downloader;
use crate::mapper::map_url;
use crate::state::{DownloadOutcome, DownloadRequest, OutcomeStatus};

pub const DEFAULT_CONCURRENCY: usize = 10;

/// Removes exact-duplicate URLs, keeping first occurrences in input order.
/// Returns the distinct URLs and how many entries were dropped.
pub fn dedup_urls(urls: Vec<String>) -> (Vec<String>, usize) {
    let total = urls.len();
    let mut seen = HashSet::with_capacity(total);
    let unique: Vec<String> = urls
        .into_iter()
        .filter(|url| seen.insert(url.clone()))
        .collect();
    let removed = total - unique.len();
    (unique, removed)
}

pub struct Scheduler {
    downloader: Arc<Downloader>,
    concurrency: usize,
}

impl Scheduler {
    pub fn new(downloader: Arc<Downloader>, concurrency: usize) -> Self {
        Self {
            downloader,
            concurrency: concurrency.max(1),
        }
    }

    /// Runs every request exactly once. `on_outcome` sees each outcome as
    /// soon as its download finishes.
    pub async fn run<F>(
        &self,
        requests: Vec<DownloadRequest>,
        mut on_outcome: F,
    ) -> Result<Vec<DownloadOutcome>>
    where
        F: FnMut(&DownloadOutcome),
    {
        let mut pending = requests.into_iter();
        let mut outcomes = Vec::with_capacity(pending.len());
        let mut join_set = JoinSet::new();

        loop {
            while join_set.len() < self.concurrency {
                let Some(request) = pending.next() else {
                    break;
                };
                let downloader = Arc::clone(&self.downloader);
                join_set.spawn(run_unit(downloader, request));
            }

            let Some(res) = join_set.join_next().await else {
                break;
            };
            let outcome = res.context("download task join")?;
            on_outcome(&outcome);
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }
}

async fn run_unit(downloader: Arc<Downloader>, request: DownloadRequest) -> DownloadOutcome {
    let url = request.url.clone();
    match AssertUnwindSafe(downloader.download_file(request))
        .catch_unwind()
        .await
    {
        Ok(outcome) => outcome,
        Err(_) => {
            tracing::error!(%url, "download worker panicked");
            let path = map_url(&url).relative_path();
            let status = OutcomeStatus::OtherError {
                message: "download worker panicked".to_string(),
            };
            DownloadOutcome::failed(url, path, status)
        }
    }
}
