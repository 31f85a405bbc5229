//! Shared free-list of detached lexers.
//!
//! Lexers are handed out bound to a connection's read half and come back
//! detached, keeping their read buffer allocation across connections.
//! The pool never evicts and has no upper bound.

use super::{Lexer, LexerConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{trace, warn};

/// Concurrent pool of reusable [`Lexer`]s.
///
/// Each lexer is owned by exactly one caller between `acquire` and `release`.
pub struct LexerPool<R> {
    /// Detached lexers (LIFO for cache locality).
    free_list: Mutex<Vec<Lexer<R>>>,
    /// Sizing for lexers created on demand.
    config: LexerConfig,
    /// Lexers constructed over the pool's lifetime.
    created: AtomicUsize,
}

impl<R> LexerPool<R> {
    pub fn new(config: LexerConfig) -> Self {
        Self {
            free_list: Mutex::new(Vec::new()),
            config,
            created: AtomicUsize::new(0),
        }
    }

    /// Take a pooled lexer bound to `source`, or create one if none is idle.
    pub fn acquire(&self, source: R) -> Lexer<R> {
        let pooled = self.free_list().pop();
        match pooled {
            Some(mut lexer) => {
                lexer.reset(Some(source));
                trace!("Reusing pooled lexer");
                lexer
            }
            None => {
                self.created.fetch_add(1, Ordering::Relaxed);
                trace!("Creating lexer");
                Lexer::with_config(Some(source), self.config)
            }
        }
    }

    /// Return a lexer to the pool.
    ///
    /// Callers detach first with `reset(None)`. A lexer still bound to a source
    /// is detached here so no bytes from its previous binding survive.
    pub fn release(&self, mut lexer: Lexer<R>) {
        if lexer.is_bound() {
            warn!("Lexer released while still bound; detaching");
            lexer.reset(None);
        }
        self.free_list().push(lexer);
    }

    /// Number of idle lexers.
    pub fn idle(&self) -> usize {
        self.free_list().len()
    }

    /// Number of lexers constructed so far.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    fn free_list(&self) -> MutexGuard<'_, Vec<Lexer<R>>> {
        // The list holds only detached lexers; a panic elsewhere cannot corrupt it.
        self.free_list.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<R> Default for LexerPool<R> {
    fn default() -> Self {
        Self::new(LexerConfig::default())
    }
}
