//! Line framing, sigil tokenization and connection serving for sigil-server.
//!
//! Data flows one way:
//!
//! ```text
//! bytes -> lexer::scanner -> line -> lexer::token -> tokens -> server::connection -> +PONG
//! ```

pub mod config;
pub mod error;
pub mod lexer;
pub mod server;
