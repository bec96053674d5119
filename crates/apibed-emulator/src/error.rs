//! Errors raised while serving the pipe.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Failures that stop the emulator.
#[derive(Debug, Error)]
pub enum EmulatorError {
    /// The transcript file could not be opened or written.
    #[error("failed to write transcript {path}: {source}")]
    Transcript {
        /// Transcript location.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// Reading requests or writing replies failed.
    #[error("emulator pipe failed: {0}")]
    Pipe(#[source] Arc<io::Error>),
}

impl EmulatorError {
    pub(crate) fn pipe(error: io::Error) -> Self {
        Self::Pipe(Arc::new(error))
    }
}
