//! Per-connection state machine.
//!
//! ```text
//! Idle -> Scanning -> Replying -> Scanning -> ... -> Closed
//! ```
//!
//! Every scanned line is tokenized and logged. Once a read cycle is drained the
//! fixed reply is written. Any terminal condition from the lexer, or a failed
//! write, closes the connection without sending an error frame.

use crate::error::{ConnectionError, LexError};
use crate::lexer::{Lexer, LexerPool};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace, warn};

/// Reply written after each drained read cycle.
pub const REPLY: &[u8] = b"+PONG\r\n";

/// Current state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Accepted, no lexer bound yet.
    Idle,
    /// Pulling lines through the lexer.
    Scanning,
    /// Writing the reply for a drained read cycle.
    Replying,
    /// Lexer returned and transport closed.
    Closed,
}

/// A single client connection.
pub struct Connection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    id: u64,
    /// Read half, moved into the lexer on `serve`.
    reader: Option<R>,
    writer: W,
    lexer: Option<Lexer<R>>,
    pool: Arc<LexerPool<R>>,
    state: ConnState,
}

impl<R, W> Connection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(id: u64, reader: R, writer: W, pool: Arc<LexerPool<R>>) -> Self {
        Self {
            id,
            reader: Some(reader),
            writer,
            lexer: None,
            pool,
            state: ConnState::Idle,
        }
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    /// Drive the connection until a terminal condition, then close it.
    ///
    /// Returns `Ok(())` when the peer ended the stream cleanly.
    pub async fn serve(mut self) -> Result<(), ConnectionError> {
        let result = self.run().await;
        self.close().await;

        match &result {
            Ok(()) => debug!(conn = self.id, "Connection closed by peer"),
            Err(ConnectionError::Scan(e)) if e.is_transport() => {
                debug!(conn = self.id, error = %e, "Transport failure")
            }
            Err(ConnectionError::Write(e)) => {
                debug!(conn = self.id, error = %e, "Reply write failed")
            }
            Err(e) => warn!(conn = self.id, error = %e, "Connection terminated"),
        }

        result
    }

    async fn run(&mut self) -> Result<(), ConnectionError> {
        let reader = match self.reader.take() {
            Some(reader) => reader,
            None => return Err(LexError::Detached.into()),
        };
        self.lexer = Some(self.pool.acquire(reader));
        self.state = ConnState::Scanning;

        loop {
            if let Some(err) = self.scan_cycle().await {
                return if err.is_stream_end() {
                    Ok(())
                } else {
                    Err(err.into())
                };
            }

            self.state = ConnState::Replying;
            trace!(conn = self.id, "Writing reply");
            self.writer
                .write_all(REPLY)
                .await
                .map_err(ConnectionError::Write)?;
            self.state = ConnState::Scanning;
        }
    }

    /// Scan lines until the read cycle drains. Returns the terminal error, if any.
    async fn scan_cycle(&mut self) -> Option<LexError> {
        let lexer = match self.lexer.as_mut() {
            Some(lexer) => lexer,
            None => return Some(LexError::Detached),
        };

        while lexer.scan().await {
            let tokens = lexer.tokens();
            trace!(conn = self.id, ?tokens, "Scanned line");
        }

        lexer.take_err()
    }

    /// Return the lexer and shut the transport down. Safe to call repeatedly.
    async fn close(&mut self) {
        if self.state == ConnState::Closed {
            return;
        }
        self.state = ConnState::Closed;
        self.release_lexer();

        if let Err(e) = self.writer.shutdown().await {
            trace!(conn = self.id, error = %e, "Shutdown failed");
        }
    }

    fn release_lexer(&mut self) {
        if let Some(mut lexer) = self.lexer.take() {
            lexer.reset(None);
            self.pool.release(lexer);
        }
    }
}

impl<R, W> Drop for Connection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    fn drop(&mut self) {
        // Task cancelled mid-serve: the lexer still goes back to the pool.
        self.release_lexer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, split, AsyncReadExt, DuplexStream, ReadHalf, WriteHalf};

    type Pool = LexerPool<ReadHalf<DuplexStream>>;

    fn connection(
        id: u64,
        pool: &Arc<Pool>,
    ) -> (
        DuplexStream,
        Connection<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>,
    ) {
        let (client, server) = duplex(1024);
        let (reader, writer) = split(server);
        (client, Connection::new(id, reader, writer, Arc::clone(pool)))
    }

    #[test]
    fn test_new_connection_is_idle() {
        let pool = Arc::new(Pool::default());
        let (_client, conn) = connection(1, &pool);
        assert_eq!(conn.state(), ConnState::Idle);
    }

    #[tokio::test]
    async fn test_single_ping_then_half_close() {
        let pool = Arc::new(Pool::default());
        let (mut client, conn) = connection(1, &pool);
        let handle = tokio::spawn(conn.serve());

        client.write_all(b"ping\n").await.unwrap();
        client.shutdown().await.unwrap();

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, REPLY);

        assert!(handle.await.unwrap().is_ok());
        assert_eq!(pool.idle(), 1);
        assert_eq!(pool.created(), 1);
    }

    #[tokio::test]
    async fn test_reply_per_drained_cycle() {
        let pool = Arc::new(Pool::default());
        let (mut client, conn) = connection(1, &pool);
        let handle = tokio::spawn(conn.serve());

        let mut reply = [0u8; 7];
        client.write_all(b"+OK\r\n").await.unwrap();
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(&reply, REPLY);

        client.write_all(b"$5\r\n").await.unwrap();
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(&reply, REPLY);

        client.shutdown().await.unwrap();
        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());

        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_final_line_closes_without_reply() {
        let pool = Arc::new(Pool::default());
        let (mut client, conn) = connection(1, &pool);
        let handle = tokio::spawn(conn.serve());

        client.write_all(b"unterminated").await.unwrap();
        client.shutdown().await.unwrap();

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        assert!(received.is_empty());

        assert!(handle.await.unwrap().is_ok());
        assert_eq!(pool.idle(), 1);
    }

    #[tokio::test]
    async fn test_write_failure_closes_connection() {
        let pool = Arc::new(Pool::default());
        let (mut client, conn) = connection(1, &pool);

        client.write_all(b"ping\n").await.unwrap();
        drop(client);

        let result = conn.serve().await;
        assert!(matches!(result, Err(ConnectionError::Write(_))));
        assert_eq!(pool.idle(), 1);
    }

    #[tokio::test]
    async fn test_line_too_long_is_fatal() {
        let pool = Arc::new(LexerPool::new(crate::lexer::LexerConfig {
            read_buffer_size: 16,
            max_line_length: 16,
        }));
        let (mut client, conn) = connection(1, &pool);
        let handle = tokio::spawn(conn.serve());

        client.write_all(&[b'x'; 32]).await.unwrap();

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        assert!(received.is_empty());

        let result = handle.await.unwrap();
        assert!(matches!(
            result,
            Err(ConnectionError::Scan(LexError::LineTooLong { limit: 16 }))
        ));
        assert_eq!(pool.idle(), 1);
    }

    #[tokio::test]
    async fn test_lexer_reused_across_connections() {
        let pool = Arc::new(Pool::default());

        for id in 0..3 {
            let (mut client, conn) = connection(id, &pool);
            let handle = tokio::spawn(conn.serve());

            client.write_all(b"ping\r\n").await.unwrap();
            client.shutdown().await.unwrap();
            let mut received = Vec::new();
            client.read_to_end(&mut received).await.unwrap();
            assert_eq!(received, REPLY);

            assert!(handle.await.unwrap().is_ok());
        }

        assert_eq!(pool.created(), 1);
        assert_eq!(pool.idle(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_serve_returns_lexer() {
        let pool = Arc::new(Pool::default());
        let (_client, conn) = connection(1, &pool);

        let handle = tokio::spawn(conn.serve());
        for _ in 0..100 {
            if pool.created() == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        // The task is parked on its first read with the lexer checked out.
        assert_eq!(pool.created(), 1);
        assert_eq!(pool.idle(), 0);

        handle.abort();
        let _ = handle.await;

        assert_eq!(pool.idle(), 1);
    }
}
