//! Token types and line classification.
//!
//! A line is classified by its first byte only:
//!
//! ```text
//! +OK    -> [PLUS "",   STRING "OK"]
//! -ERR   -> [MINUS "",  STRING "ERR"]
//! *2     -> [STAR "",   NUMBER "2"]
//! $5     -> [DOLLAR "", NUMBER "5"]
//! hello  -> [STRING "hello"]
//! ""     -> [STRING ""]
//! ```
//!
//! Sigils never nest or recur within a line; multi-bulk arrays are not parsed.

use bytes::Bytes;
use std::fmt;

/// Kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `$`
    Dollar,
    /// Payload following a count or length sigil.
    Number,
    /// Opaque text payload.
    String,
}

impl TokenKind {
    /// Map a leading byte to its sigil kind.
    pub fn from_sigil(byte: u8) -> Option<TokenKind> {
        match byte {
            b'+' => Some(TokenKind::Plus),
            b'-' => Some(TokenKind::Minus),
            b'*' => Some(TokenKind::Star),
            b'$' => Some(TokenKind::Dollar),
            _ => None,
        }
    }

    /// Kind given to the remainder of a line that starts with this sigil.
    pub fn payload_kind(self) -> TokenKind {
        match self {
            TokenKind::Star | TokenKind::Dollar => TokenKind::Number,
            _ => TokenKind::String,
        }
    }

    fn name(self) -> &'static str {
        match self {
            TokenKind::Plus => "PLUS",
            TokenKind::Minus => "MINUS",
            TokenKind::Star => "STAR",
            TokenKind::Dollar => "DOLLAR",
            TokenKind::Number => "NUMBER",
            TokenKind::String => "STRING",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A classified span of a line. Never contains the line terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    kind: TokenKind,
    payload: Bytes,
}

impl Token {
    pub fn new(kind: TokenKind, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(\"{}\")", self.kind, self.payload.escape_ascii())
    }
}

/// Classify one line into its token sequence.
///
/// Payloads are slices of `line`; nothing is copied.
pub fn classify(line: &Bytes) -> Vec<Token> {
    let sigil = match line.first().copied().and_then(TokenKind::from_sigil) {
        Some(kind) => kind,
        None => return vec![Token::new(TokenKind::String, line.clone())],
    };

    vec![
        Token::new(sigil, Bytes::new()),
        Token::new(sigil.payload_kind(), line.slice(1..)),
    ]
}
