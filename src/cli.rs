use clap::Parser;
use reqwest::header::{HeaderName, HeaderValue};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{RunConfig, DEFAULT_FAILED_FILE, DEFAULT_OUTPUT_DIR};
use crate::fetcher::{FetcherConfig, DEFAULT_TIMEOUT};
use crate::headers::{collect_headers, parse_header_line};
use crate::scheduler::DEFAULT_CONCURRENCY;

const EXAMPLES: &str = "\
Examples:
  jsdl urls.txt
  jsdl urls.txt -H \"X-Bug-Bounty: hunter123\"
  jsdl urls.txt -H \"X-Bug-Bounty: hunter123\" -H \"Authorization: Bearer token123\"
  jsdl urls.txt --header-file headers.json
  jsdl urls.txt --header-file headers.txt

Header files are either a JSON object ({\"X-Bug-Bounty\": \"hunter123\"})
or one `Key: Value` pair per line. --header flags override the file.";

/// Download JavaScript files while keeping the URL's directory structure.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, after_help = EXAMPLES)]
pub struct Args {
    /// File containing URLs, one per line
    pub url_file: PathBuf,

    /// Output directory
    #[arg(short = 'o', long = "output", default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Custom header "Key: Value" (repeatable, overrides --header-file)
    #[arg(short = 'H', long = "header", value_parser = parse_header_arg)]
    pub headers: Vec<(String, String)>,

    /// Load headers from a file (JSON object or `Key: Value` lines)
    #[arg(long = "header-file")]
    pub header_file: Option<PathBuf>,

    /// Number of concurrent downloads
    #[arg(short = 't', long = "threads", default_value_t = DEFAULT_CONCURRENCY as u64,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub threads: u64,

    /// Show the headers being used (credentials masked) and debug logs
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
    pub timeout: u64,

    /// Validate TLS certificates (off by default)
    #[arg(long = "verify-tls")]
    pub verify_tls: bool,

    /// Where to write URLs that failed
    #[arg(long = "failed-file", default_value = DEFAULT_FAILED_FILE)]
    pub failed_file: PathBuf,
}

impl Args {
    pub fn into_config(self) -> RunConfig {
        RunConfig {
            output_dir: self.output_dir,
            failed_file: self.failed_file,
            concurrency: self.threads.max(1) as usize,
            verbose: self.verbose,
            header_file: self.header_file,
            explicit_headers: collect_headers(self.headers),
            fetcher: FetcherConfig {
                timeout: Duration::from_secs(self.timeout),
                accept_invalid_certs: !self.verify_tls,
                ..FetcherConfig::default()
            },
            ..RunConfig::new(self.url_file)
        }
    }
}

/// Value parser for `--header`; rejects anything reqwest could not send.
pub fn parse_header_arg(raw: &str) -> Result<(String, String), String> {
    let (key, value) =
        parse_header_line(raw).ok_or_else(|| format!("expected \"Key: Value\", got {:?}", raw))?;
    HeaderName::from_bytes(key.as_bytes())
        .map_err(|_| format!("invalid header name: {:?}", key))?;
    HeaderValue::from_str(&value).map_err(|_| format!("invalid value for header {}", key))?;
    Ok((key, value))
}
