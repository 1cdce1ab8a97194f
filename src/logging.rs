//! Logging init: stderr, routed around the progress display.

use indicatif::MultiProgress;
use std::io::{self, Write};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Writes each log record to stderr with the progress bars cleared, so log
/// lines never get drawn over.
struct ProgressWriter(MultiProgress);

impl io::Write for ProgressWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.suspend(|| io::stderr().lock().write_all(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().lock().flush()
    }
}

struct ProgressMakeWriter(MultiProgress);

impl<'a> MakeWriter<'a> for ProgressMakeWriter {
    type Writer = ProgressWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ProgressWriter(self.0.clone())
    }
}

fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "warn,jsdl=debug"
    } else {
        "warn"
    }
}

/// Initialize structured logging. `RUST_LOG` overrides the default level.
pub fn init_logging(verbose: bool, progress: &MultiProgress) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(ProgressMakeWriter(progress.clone()))
        .with_ansi(false)
        .with_target(false)
        .init();
}
