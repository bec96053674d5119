//! Stub API emulator for exercising `apibed` end to end.
//!
//! Reads framed requests from stdin and writes framed replies to stdout,
//! honouring the `#quit#` and `#reset#` control lines. It serves a handful of
//! services, enough to observe ordering, state resets, and error mapping from
//! the transport side:
//!
//! - `datastore_v3.AllocateIds` hands out contiguous id blocks from a counter
//!   that `#reset#` rewinds.
//! - `echo.Echo` returns its payload.
//! - `Fail` on any service reports the application error named in its
//!   request.
//!
//! Anything else fails with application error [`BAD_REQUEST`].

mod cli;
mod emulator;
mod error;
mod services;

use std::ffi::OsString;
use std::io::{BufRead, Write};
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use apibed_config::Config;
use clap::Parser;
use clap::error::ErrorKind;

pub use emulator::{Emulator, EmulatorOptions, Exit, MALFORMED_REQUEST};
pub use error::EmulatorError;
pub use services::{
    AllocateIdsRequest, AllocateIdsResponse, BAD_REQUEST, FailRequest, ServiceState,
};

use crate::cli::Cli;

/// Parses `args`, serves `input`, and reports the outcome as an exit code.
///
/// With `--ignore-quit` the process never exits on its own, even at end of
/// input, so only a kill stops it.
pub fn run<I, R, W, E>(args: I, input: &mut R, output: &mut W, errors: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    R: BufRead + ?Sized,
    W: Write + ?Sized,
    E: Write + ?Sized,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => return report_usage(&error, output, errors),
    };

    let config = Config {
        log_filter: cli.log_filter,
        ..Config::default()
    };
    if let Err(error) = apibed::telemetry::initialise(&config) {
        drop(writeln!(errors, "apibed-emulator: {error}"));
    }

    let options = EmulatorOptions {
        ignore_quit: cli.ignore_quit,
        transcript: cli.transcript,
        stderr_chatter: cli.stderr_chatter,
    };
    let ignore_quit = options.ignore_quit;
    let outcome =
        Emulator::new(options).and_then(|mut emulator| emulator.serve(input, output, errors));

    match outcome {
        Ok(Exit::EndOfInput) if ignore_quit => park(),
        Ok(_) => ExitCode::SUCCESS,
        Err(error) => {
            drop(writeln!(errors, "apibed-emulator: {error}"));
            ExitCode::FAILURE
        }
    }
}

fn report_usage<W, E>(error: &clap::Error, output: &mut W, errors: &mut E) -> ExitCode
where
    W: Write + ?Sized,
    E: Write + ?Sized,
{
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            drop(write!(output, "{error}"));
            ExitCode::SUCCESS
        }
        _ => {
            drop(write!(errors, "{error}"));
            ExitCode::from(2)
        }
    }
}

fn park() -> ! {
    tracing::info!(target: "apibed_emulator", "input closed, waiting to be killed");
    loop {
        thread::sleep(Duration::from_secs(60));
    }
}
