//! Error types for scanning, serving connections and loading configuration.

use std::io;
use std::path::PathBuf;

/// Failure recorded by a [`Lexer`](crate::lexer::Lexer) when it stops producing lines.
///
/// Needing more data is never an error: the lexer simply reads again.
#[derive(Debug, thiserror::Error)]
pub enum LexError {
    /// Peer closed its side of the stream with nothing left to scan.
    #[error("stream ended")]
    StreamEnded,

    /// The underlying transport reported an I/O fault.
    #[error("transport failure: {0}")]
    Transport(#[from] io::Error),

    /// Buffered bytes exceeded the line limit without a terminator.
    #[error("line exceeds {limit} bytes")]
    LineTooLong { limit: usize },

    /// `scan` was called on a lexer with no source bound.
    #[error("lexer is not bound to a source")]
    Detached,
}

impl LexError {
    /// Orderly end of stream, as opposed to a failure.
    pub fn is_stream_end(&self) -> bool {
        matches!(self, LexError::StreamEnded)
    }

    /// Fault raised by the transport itself (reset, broken pipe, ...).
    pub fn is_transport(&self) -> bool {
        matches!(self, LexError::Transport(_))
    }
}

/// Reason a connection terminated abnormally.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("scan failed: {0}")]
    Scan(#[from] LexError),

    #[error("reply write failed: {0}")]
    Write(#[source] io::Error),
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {}", .0.display(), .1)]
    FileRead(PathBuf, #[source] io::Error),

    #[error("Failed to parse config file '{}': {}", .0.display(), .1)]
    TomlParse(PathBuf, #[source] toml::de::Error),

    #[error("Invalid value for {0}: must be greater than zero")]
    ZeroValue(&'static str),
}
