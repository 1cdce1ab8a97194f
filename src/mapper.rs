use std::path::{Path, PathBuf};
use url::Url;

use crate::utils::{sanitize_segment, split_extension};

/// Extension a path segment must carry to be used verbatim as the file name.
pub const JS_EXTENSION: &str = ".js";
/// File name used when the URL path does not end in a script.
pub const INDEX_FILE: &str = "index.js";

const QUERY_SUFFIX_MAX: usize = 50;

/// Where a URL lands on disk, relative to the output root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MappedLocation {
    pub directory: Vec<String>,
    pub file_name: String,
}

impl MappedLocation {
    pub fn relative_path(&self) -> PathBuf {
        let mut path: PathBuf = self.directory.iter().collect();
        path.push(&self.file_name);
        path
    }

    pub fn directory_in(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        path.extend(&self.directory);
        path
    }

    pub fn file_in(&self, root: &Path) -> PathBuf {
        root.join(self.relative_path())
    }
}

struct UrlParts {
    host: Option<String>,
    path: String,
    query: Option<String>,
}

impl UrlParts {
    fn from_parsed(url: &Url) -> Self {
        // `port()` is None for the scheme's default port.
        let host = url.host_str().map(|host| match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        });
        Self {
            host,
            path: url.path().to_string(),
            query: url.query().map(str::to_string),
        }
    }

    /// Splits a string `Url` refused to parse, without validating anything.
    fn best_effort(raw: &str) -> Self {
        let without_fragment = raw.split('#').next().unwrap_or_default();
        let (before_query, query) = match without_fragment.split_once('?') {
            Some((before, query)) => (before, Some(query.to_string())),
            None => (without_fragment, None),
        };

        match before_query.split_once("://") {
            Some((_, rest)) => {
                let (authority, path) = match rest.find('/') {
                    Some(idx) => rest.split_at(idx),
                    None => (rest, ""),
                };
                let host = authority.rsplit('@').next().unwrap_or_default();
                Self {
                    host: Some(host.to_string()).filter(|h| !h.is_empty()),
                    path: path.to_string(),
                    query,
                }
            }
            None => Self {
                host: None,
                path: before_query.to_string(),
                query,
            },
        }
    }
}

/// Maps a URL to its on-disk location.
///
/// Total: malformed input still produces a location built from whatever
/// host/path/query pieces can be split out of the raw string.
///
/// - `https://example.com/app.js` -> `example.com/app.js`
/// - `https://example.com/` -> `example.com/index.js`
/// - `https://example.com/lib/loader` -> `example.com/lib/loader/index.js`
/// - `https://example.com/b.js?v=1` -> `example.com/b_v_1.js`
pub fn map_url(url: &str) -> MappedLocation {
    let parts = match Url::parse(url) {
        Ok(parsed) => UrlParts::from_parsed(&parsed),
        Err(_) => UrlParts::best_effort(url),
    };
    build_location(parts)
}

fn build_location(parts: UrlParts) -> MappedLocation {
    let segments: Vec<&str> = parts.path.split('/').filter(|s| !s.is_empty()).collect();

    let (dir_segments, file_name) = match segments.split_last() {
        Some((last, rest)) if last.ends_with(JS_EXTENSION) => (rest, *last),
        _ => (segments.as_slice(), INDEX_FILE),
    };

    let directory = parts
        .host
        .as_deref()
        .into_iter()
        .chain(dir_segments.iter().copied())
        .map(directory_segment)
        .collect();

    let mut file_name = sanitize_segment(file_name);
    if let Some(query) = parts.query.as_deref().filter(|q| !q.is_empty()) {
        let (stem, ext) = split_extension(&file_name);
        file_name = format!("{}_{}{}", stem, query_suffix(query), ext);
    }

    MappedLocation {
        directory,
        file_name,
    }
}

fn directory_segment(segment: &str) -> String {
    let sanitized = sanitize_segment(segment);
    if sanitized == "." || sanitized == ".." {
        "_".to_string()
    } else {
        sanitized
    }
}

fn query_suffix(query: &str) -> String {
    query
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(QUERY_SUFFIX_MAX)
        .collect()
}
