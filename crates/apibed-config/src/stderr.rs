//! Handling policy for the emulator's standard error stream.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// What the transport does with the child's standard error.
///
/// The emulator can be chatty on stderr. A pipe that nobody reads eventually
/// fills up and blocks the child mid-response, so the default drains it on a
/// background thread and forwards each line to `tracing`.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum StderrMode {
    /// Pipe stderr and forward each line as a `debug` event.
    #[default]
    Drain,
    /// Let the child write straight to the host's stderr.
    Inherit,
    /// Discard the child's stderr.
    Null,
}

/// Errors encountered while parsing a [`StderrMode`] from text.
pub type StderrModeParseError = strum::ParseError;

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("drain", StderrMode::Drain)]
    #[case("INHERIT", StderrMode::Inherit)]
    #[case("Null", StderrMode::Null)]
    fn parses_case_insensitively(#[case] text: &str, #[case] expected: StderrMode) {
        let parsed: StderrMode = text.parse().expect("mode should parse");
        assert_eq!(parsed, expected);
    }

    #[test]
    fn rejects_unknown_mode() {
        assert!("tee".parse::<StderrMode>().is_err());
    }

    #[test]
    fn displays_in_snake_case() {
        assert_eq!(StderrMode::Inherit.to_string(), "inherit");
    }
}
