//! Command line used to launch the emulator.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use apibed_config::Config;

use crate::error::StartError;

/// Executable plus ordered arguments. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    command: PathBuf,
    args: Vec<OsString>,
}

impl Endpoint {
    /// Builds an endpoint from an executable and its arguments.
    #[must_use]
    pub fn new<I, S>(command: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Builds an `interpreter script args...` endpoint after checking that the
    /// script exists.
    ///
    /// # Errors
    ///
    /// Returns [`StartError::ScriptNotFound`] when `script` is not a file.
    pub fn python_script<I, S>(
        interpreter: impl Into<PathBuf>,
        script: &Path,
        args: I,
    ) -> Result<Self, StartError>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        if !script.is_file() {
            return Err(StartError::ScriptNotFound {
                path: script.to_path_buf(),
            });
        }
        let argv = std::iter::once(script.as_os_str().to_owned())
            .chain(args.into_iter().map(Into::into));
        Ok(Self::new(interpreter, argv))
    }

    /// Builds the endpoint named by the configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.emulator_command().as_std_path(),
            config.emulator_args().iter().cloned(),
        )
    }

    /// Executable to launch.
    #[must_use]
    pub fn command(&self) -> &Path {
        &self.command
    }

    /// Arguments passed to the executable, in order.
    #[must_use]
    pub fn args(&self) -> &[OsString] {
        &self.args
    }
}
