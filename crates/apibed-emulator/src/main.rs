//! Entry point for the stub emulator binary.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut input = io::stdin().lock();
    let mut output = io::stdout().lock();
    let mut errors = io::stderr().lock();
    apibed_emulator::run(std::env::args_os(), &mut input, &mut output, &mut errors)
}
