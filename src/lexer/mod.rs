//! Line tokenizer over an async byte source.
//!
//! A [`Lexer`] pulls bytes from its bound source, frames them into lines with
//! [`scanner::advance`] and classifies each line with [`token::classify`].
//!
//! Lexers are recycled across connections through a [`LexerPool`]; [`Lexer::reset`]
//! rebinds one to a new source and discards everything it had buffered.
//!
//! ## Read cycles
//!
//! `scan` returns `false` in two situations:
//! - every buffered byte was consumed as lines since the last cycle ended and the
//!   last of them was non-empty, so the caller may reply before waiting for more
//!   input (`err()` is `None`);
//! - a terminal condition was reached (`err()` is `Some`).

pub mod pool;
pub mod scanner;
pub mod token;

pub use pool::LexerPool;
pub use token::{Token, TokenKind};

use crate::error::LexError;
use bytes::{Bytes, BytesMut};
use scanner::ScanResult;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

/// Default initial capacity of the read buffer.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4 * 1024;

/// Default limit for a single unterminated line.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

/// Buffer sizing for a lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexerConfig {
    pub read_buffer_size: usize,
    pub max_line_length: usize,
}

impl Default for LexerConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

/// Tokenizer bound to at most one source at a time.
pub struct Lexer<R> {
    source: Option<R>,
    config: LexerConfig,
    /// Bytes read but not yet framed.
    buffer: BytesMut,
    /// Last line produced by `scan`.
    line: Bytes,
    /// Source reported end-of-data.
    at_eof: bool,
    /// Lines produced since the current read cycle started.
    cycle_lines: usize,
    err: Option<LexError>,
}

impl<R> Lexer<R> {
    /// Create a lexer bound to `source`.
    pub fn new(source: R) -> Self {
        Self::with_config(Some(source), LexerConfig::default())
    }

    /// Create a lexer with explicit sizing; `None` yields a detached lexer.
    pub fn with_config(source: Option<R>, config: LexerConfig) -> Self {
        Self {
            source,
            config,
            buffer: BytesMut::with_capacity(config.read_buffer_size),
            line: Bytes::new(),
            at_eof: false,
            cycle_lines: 0,
            err: None,
        }
    }

    /// Rebind to `source`, or detach with `None`.
    ///
    /// All buffered bytes, the last line and the last error are discarded.
    /// The buffer allocation is kept for the next binding.
    pub fn reset(&mut self, source: Option<R>) {
        self.source = source;
        self.buffer.clear();
        self.line = Bytes::new();
        self.at_eof = false;
        self.cycle_lines = 0;
        self.err = None;
    }

    pub fn is_bound(&self) -> bool {
        self.source.is_some()
    }

    /// Raw bytes of the most recently scanned line, terminator excluded.
    pub fn line(&self) -> &Bytes {
        &self.line
    }

    /// Tokens of the most recently scanned line.
    pub fn tokens(&self) -> Vec<Token> {
        token::classify(&self.line)
    }

    /// Last recorded failure.
    pub fn err(&self) -> Option<&LexError> {
        self.err.as_ref()
    }

    /// Move the last recorded failure out of the lexer.
    pub fn take_err(&mut self) -> Option<LexError> {
        self.err.take()
    }

    /// Number of bytes buffered but not yet returned as a line.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn fail_line_too_long(&mut self) {
        self.err = Some(LexError::LineTooLong {
            limit: self.config.max_line_length,
        });
    }

    fn take_line(&mut self, len: usize, consumed: usize) {
        let mut frame = self.buffer.split_to(consumed);
        frame.truncate(len);
        self.line = frame.freeze();
        self.cycle_lines += 1;
    }
}

impl<R: AsyncRead + Unpin> Lexer<R> {
    /// Advance to the next line, reading from the source as needed.
    ///
    /// Returns `true` when a line is available through [`line`](Self::line) and
    /// [`tokens`](Self::tokens). On `false`, [`err`](Self::err) tells a drained
    /// read cycle (`None`) apart from a terminal condition.
    pub async fn scan(&mut self) -> bool {
        if self.err.is_some() {
            return false;
        }

        loop {
            match scanner::advance(&self.buffer, self.at_eof) {
                ScanResult::Ready(line, consumed) | ScanResult::FinalLine(line, consumed) => {
                    let len = line.len();
                    if len > self.config.max_line_length {
                        self.fail_line_too_long();
                        return false;
                    }
                    self.take_line(len, consumed);
                    return true;
                }
                ScanResult::StreamClosed => {
                    self.err = Some(LexError::StreamEnded);
                    return false;
                }
                ScanResult::NeedMoreData => {}
            }

            // A trailing empty line keeps the cycle open.
            if self.buffer.is_empty() && self.cycle_lines > 0 && !self.line.is_empty() {
                self.cycle_lines = 0;
                return false;
            }

            // No terminator buffered: the pending bytes are one partial line.
            let pending = self.buffer.strip_suffix(b"\r").unwrap_or(&self.buffer[..]).len();
            if pending > self.config.max_line_length {
                self.fail_line_too_long();
                return false;
            }

            let Some(source) = self.source.as_mut() else {
                self.err = Some(LexError::Detached);
                return false;
            };

            match source.read_buf(&mut self.buffer).await {
                Ok(0) => {
                    trace!(pending = self.buffer.len(), "Source reached end of data");
                    self.at_eof = true;
                }
                Ok(n) => trace!(bytes = n, "Read from source"),
                Err(e) => {
                    self.err = Some(LexError::Transport(e));
                    return false;
                }
            }
        }
    }
}
