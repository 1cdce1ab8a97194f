use anyhow::Result;
use std::path::Path;
use tracing::{debug, warn};

use crate::fetcher::{Fetcher, FetcherConfig};
use crate::mapper::map_url;
use crate::persister::{Persister, Target};
use crate::state::{DownloadOutcome, DownloadRequest, OutcomeStatus};

/// Runs one URL through map -> existence check -> fetch -> write.
pub struct Downloader {
    fetcher: Fetcher,
    persister: Persister,
}

impl Downloader {
    pub fn new(output_dir: &Path, fetcher_config: &FetcherConfig) -> Result<Self> {
        Ok(Self {
            fetcher: Fetcher::new(fetcher_config)?,
            persister: Persister::new(output_dir.to_path_buf()),
        })
    }

    /// Never fails: every error is folded into the returned outcome.
    pub async fn download_file(&self, request: DownloadRequest) -> DownloadOutcome {
        let DownloadRequest { url, headers } = request;
        let location = map_url(&url);
        let relative = location.relative_path();

        // Held until the write finishes so a second URL mapping to the same
        // file sees it on disk and skips.
        let _guard = self.persister.lock(&self.persister.target_path(&location)).await;

        let filepath = match self.persister.prepare(&location).await {
            Ok(Target::Exists(existing)) => {
                debug!(%url, path = %existing.display(), "target exists, skipping");
                return DownloadOutcome::skipped(url, relative);
            }
            Ok(Target::Vacant(filepath)) => filepath,
            Err(err) => {
                warn!(%url, error = %err, "could not prepare target");
                let status = OutcomeStatus::OtherError {
                    message: err.to_string(),
                };
                return DownloadOutcome::failed(url, relative, status);
            }
        };

        debug!(%url, "fetching");
        let content = match self.fetcher.fetch(&url, &headers).await {
            Ok(content) => content,
            Err(err) => {
                warn!(%url, error = %err, "fetch failed");
                return DownloadOutcome::failed(url, relative, err.into());
            }
        };

        match self.persister.write(&filepath, &content).await {
            Ok(bytes) => {
                debug!(%url, bytes, path = %relative.display(), "written");
                DownloadOutcome::success(url, relative, bytes)
            }
            Err(err) => {
                warn!(%url, error = %err, "write failed");
                let status = OutcomeStatus::OtherError {
                    message: err.to_string(),
                };
                DownloadOutcome::failed(url, relative, status)
            }
        }
    }
}
