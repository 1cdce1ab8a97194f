use std::path::PathBuf;

use crate::fetcher::FetcherConfig;
use crate::headers::HeaderSet;
use crate::scheduler::DEFAULT_CONCURRENCY;

pub const DEFAULT_OUTPUT_DIR: &str = "./js_files";
/// Relative to the working directory, next to the default output root.
pub const DEFAULT_FAILED_FILE: &str = "failed_urls.txt";

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub url_file: PathBuf,
    pub output_dir: PathBuf,
    pub failed_file: PathBuf,
    pub concurrency: usize,
    pub verbose: bool,
    pub header_file: Option<PathBuf>,
    /// Headers given with `--header`; applied over the header file.
    pub explicit_headers: HeaderSet,
    pub fetcher: FetcherConfig,
}

impl RunConfig {
    pub fn new(url_file: PathBuf) -> Self {
        Self {
            url_file,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            failed_file: PathBuf::from(DEFAULT_FAILED_FILE),
            concurrency: DEFAULT_CONCURRENCY,
            verbose: false,
            header_file: None,
            explicit_headers: HeaderSet::new(),
            fetcher: FetcherConfig::default(),
        }
    }
}
