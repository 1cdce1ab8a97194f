use reqwest::header::HeaderMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::fetcher::FetchError;

/// One URL to fetch, with the resolved header set shared by the whole run.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub headers: Arc<HeaderMap>,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, headers: Arc<HeaderMap>) -> Self {
        Self {
            url: url.into(),
            headers,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    Success,
    /// Target already existed; nothing was fetched.
    Skipped,
    Timeout,
    NetworkError { message: String },
    OtherError { message: String },
}

impl OutcomeStatus {
    /// Skipped counts as success: the file is on disk either way.
    pub fn is_success(&self) -> bool {
        matches!(self, OutcomeStatus::Success | OutcomeStatus::Skipped)
    }
}

impl From<FetchError> for OutcomeStatus {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Timeout => OutcomeStatus::Timeout,
            FetchError::Network { message } => OutcomeStatus::NetworkError { message },
            FetchError::Other { message } => OutcomeStatus::OtherError { message },
        }
    }
}

/// Terminal result of processing one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub url: String,
    pub status: OutcomeStatus,
    pub bytes_written: Option<u64>,
    /// Target path relative to the output root.
    pub path: PathBuf,
}

impl DownloadOutcome {
    pub fn success(url: String, path: PathBuf, bytes_written: u64) -> Self {
        Self {
            url,
            status: OutcomeStatus::Success,
            bytes_written: Some(bytes_written),
            path,
        }
    }

    pub fn skipped(url: String, path: PathBuf) -> Self {
        Self {
            url,
            status: OutcomeStatus::Skipped,
            bytes_written: None,
            path,
        }
    }

    pub fn failed(url: String, path: PathBuf, status: OutcomeStatus) -> Self {
        Self {
            url,
            status,
            bytes_written: None,
            path,
        }
    }
}

impl fmt::Display for DownloadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            OutcomeStatus::Success => {
                write!(f, "[SUCCESS] {} -> {}", self.url, self.path.display())
            }
            OutcomeStatus::Skipped => write!(f, "[SKIP] Already exists: {}", self.path.display()),
            OutcomeStatus::Timeout => write!(f, "[TIMEOUT] {}", self.url),
            OutcomeStatus::NetworkError { message } | OutcomeStatus::OtherError { message } => {
                write!(f, "[ERROR] {}: {}", self.url, message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skipped_is_success() {
        assert!(OutcomeStatus::Skipped.is_success());
        assert!(OutcomeStatus::Success.is_success());
        assert!(!OutcomeStatus::Timeout.is_success());
        assert!(!OutcomeStatus::OtherError {
            message: "x".into()
        }
        .is_success());
    }

    #[test]
    fn fetch_errors_map_to_status() {
        assert_eq!(OutcomeStatus::from(FetchError::Timeout), OutcomeStatus::Timeout);
        assert_eq!(
            OutcomeStatus::from(FetchError::Network {
                message: "refused".into()
            }),
            OutcomeStatus::NetworkError {
                message: "refused".into()
            }
        );
    }

    #[test]
    fn display_lines() {
        let ok = DownloadOutcome::success(
            "https://a.com/x.js".into(),
            PathBuf::from("a.com/x.js"),
            3,
        );
        assert_eq!(ok.to_string(), "[SUCCESS] https://a.com/x.js -> a.com/x.js");

        let timeout = DownloadOutcome::failed(
            "https://a.com/y.js".into(),
            PathBuf::from("a.com/y.js"),
            OutcomeStatus::Timeout,
        );
        assert_eq!(timeout.to_string(), "[TIMEOUT] https://a.com/y.js");

        let err = DownloadOutcome::failed(
            "https://a.com/z.js".into(),
            PathBuf::from("a.com/z.js"),
            OutcomeStatus::OtherError {
                message: "HTTP 404 Not Found".into(),
            },
        );
        assert_eq!(err.to_string(), "[ERROR] https://a.com/z.js: HTTP 404 Not Found");
    }
}
