//! Failure taxonomy for a single format request

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while formatting a buffer
///
/// Every variant leaves the caller's text untouched: the service never
/// hands back partial output alongside an error.
#[derive(Error, Debug)]
pub enum FormatError {
    /// The executable could not be located (missing installation, bad path)
    #[error("couldn't find `{executable}` for formatting (ENOENT). Make sure it is installed and available in PATH")]
    SpawnNotFound {
        executable: String,
        #[source]
        source: io::Error,
    },

    #[error("couldn't run `{executable}`: {source}")]
    SpawnFailed {
        executable: String,
        #[source]
        source: io::Error,
    },

    /// A standard stream of the child was not handed to us
    #[error("couldn't open {0} of the formatter process")]
    ProcessIoUnavailable(&'static str),

    /// Reading from or writing to one of the child's pipes failed
    #[error("failed while streaming {stream} of the formatter process: {source}")]
    StreamIo {
        stream: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("formatter failed with exit code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("formatter was terminated by a signal: {stderr}")]
    SignalTerminated { stderr: String },

    #[error("formatter produced output that is not valid UTF-8")]
    InvalidOutput(#[source] std::string::FromUtf8Error),

    #[error("formatter did not finish within {0:?}")]
    Timeout(Duration),

    #[error("formatting was cancelled")]
    Cancelled,
}

impl FormatError {
    /// Whether the user has to fix their installation or `executePath`
    pub fn is_not_found(&self) -> bool {
        matches!(self, FormatError::SpawnNotFound { .. })
    }

    /// Diagnostic text reported by the formatter, if it got that far
    pub fn stderr(&self) -> Option<&str> {
        match self {
            FormatError::NonZeroExit { stderr, .. } | FormatError::SignalTerminated { stderr } => {
                Some(stderr)
            }
            _ => None,
        }
    }
}
