//! Command-line flags for the stub emulator.

use std::path::PathBuf;

use clap::Parser;

/// Stub App Engine API emulator speaking the framed stdio protocol.
#[derive(Parser, Debug)]
#[command(name = "apibed-emulator", version)]
pub(crate) struct Cli {
    /// Keep running after `#quit#`, an empty line, or end of input.
    #[arg(long)]
    pub(crate) ignore_quit: bool,
    /// Append every received line to this file.
    #[arg(long, value_name = "PATH")]
    pub(crate) transcript: Option<PathBuf>,
    /// Lines of noise written to stderr for each request.
    #[arg(long, value_name = "LINES", default_value_t = 0)]
    pub(crate) stderr_chatter: u32,
    /// `tracing` filter for the emulator's own diagnostics.
    #[arg(long, value_name = "FILTER", default_value = "warn")]
    pub(crate) log_filter: String,
}
