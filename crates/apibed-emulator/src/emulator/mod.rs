//! The request loop: one framed request in, one framed reply out.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use apibed::frame::{self, Sentinel};
use apibed::wire::{Request, Response, RpcError};
use prost::Message;
use tracing::{debug, info, warn};

use crate::error::EmulatorError;
use crate::services::ServiceState;

const EMULATOR_TARGET: &str = "apibed_emulator";

/// RPC error code for lines that are not a decodable request.
pub const MALFORMED_REQUEST: i32 = 2;

/// Behaviour switches for [`Emulator`].
#[derive(Debug, Clone, Default)]
pub struct EmulatorOptions {
    /// Keep serving after `#quit#`, an empty line, or end of input.
    pub ignore_quit: bool,
    /// Append every received line to this file.
    pub transcript: Option<PathBuf>,
    /// Lines of noise written to the diagnostics stream per request.
    pub stderr_chatter: u32,
}

/// Why [`Emulator::serve`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// A quit sentinel or an empty line arrived.
    Quit,
    /// The input stream closed.
    EndOfInput,
}

/// Stub emulator serving the framed stdio protocol.
#[derive(Debug)]
pub struct Emulator {
    options: EmulatorOptions,
    state: ServiceState,
    transcript: Option<File>,
}

impl Emulator {
    /// Builds an emulator, opening the transcript when one is configured.
    ///
    /// # Errors
    ///
    /// Returns [`EmulatorError::Transcript`] when the file cannot be opened.
    pub fn new(options: EmulatorOptions) -> Result<Self, EmulatorError> {
        let transcript = match &options.transcript {
            Some(path) => Some(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|source| EmulatorError::Transcript {
                        path: path.clone(),
                        source: Arc::new(source),
                    })?,
            ),
            None => None,
        };
        Ok(Self {
            options,
            state: ServiceState::default(),
            transcript,
        })
    }

    /// Serves requests from `input` until quit or end of input.
    ///
    /// Replies go to `output`; chatter goes to `diagnostics`.
    ///
    /// # Errors
    ///
    /// Returns [`EmulatorError`] when the streams or the transcript fail.
    pub fn serve<R, W, D>(
        &mut self,
        input: &mut R,
        output: &mut W,
        diagnostics: &mut D,
    ) -> Result<Exit, EmulatorError>
    where
        R: BufRead + ?Sized,
        W: Write + ?Sized,
        D: Write + ?Sized,
    {
        let mut line = Vec::new();
        loop {
            line.clear();
            let received = input.read_until(b'\n', &mut line).map_err(EmulatorError::pipe)?;
            if received == 0 {
                debug!(target: EMULATOR_TARGET, "input closed");
                return Ok(Exit::EndOfInput);
            }
            self.record(&line)?;

            let text = String::from_utf8_lossy(&line);
            let control = if text.trim().is_empty() {
                Some(Sentinel::Quit)
            } else {
                Sentinel::parse(&text)
            };
            match control {
                Some(Sentinel::Quit) if self.options.ignore_quit => {
                    info!(target: EMULATOR_TARGET, "ignoring quit request");
                }
                Some(Sentinel::Quit) => {
                    info!(target: EMULATOR_TARGET, "quit requested");
                    return Ok(Exit::Quit);
                }
                Some(Sentinel::Reset) => {
                    debug!(target: EMULATOR_TARGET, "resetting state");
                    self.state.reset();
                }
                None => {
                    let response = self.answer(&line, diagnostics)?;
                    frame::write_frame(output, &response.encode_to_vec())
                        .map_err(EmulatorError::pipe)?;
                }
            }
        }
    }

    fn answer<D: Write + ?Sized>(
        &mut self,
        line: &[u8],
        diagnostics: &mut D,
    ) -> Result<Response, EmulatorError> {
        let decoded = match frame::decode(line) {
            Ok(bytes) => Request::decode(bytes.as_slice()).map_err(|error| error.to_string()),
            Err(error) => Err(error.to_string()),
        };
        let request = match decoded {
            Ok(request) => request,
            Err(detail) => {
                warn!(target: EMULATOR_TARGET, %detail, "malformed request line");
                return Ok(Response {
                    rpc_error: Some(RpcError {
                        code: MALFORMED_REQUEST,
                        detail: Some(detail),
                    }),
                    ..Response::default()
                });
            }
        };

        for index in 0..self.options.stderr_chatter {
            writeln!(
                diagnostics,
                "apibed-emulator: {}.{} chatter {index}",
                request.service_name, request.method
            )
            .map_err(EmulatorError::pipe)?;
        }
        debug!(
            target: EMULATOR_TARGET,
            service = %request.service_name,
            method = %request.method,
            request_id = request.request_id(),
            "handling request"
        );
        Ok(self.state.handle(&request))
    }

    fn record(&mut self, line: &[u8]) -> Result<(), EmulatorError> {
        let Some(file) = self.transcript.as_mut() else {
            return Ok(());
        };
        file.write_all(line)
            .and_then(|()| file.flush())
            .map_err(|source| EmulatorError::Transcript {
                path: self.options.transcript.clone().unwrap_or_default(),
                source: Arc::new(source),
            })
    }
}
