//! TCP server for sigil-line connections.
//!
//! Accepts connections and spawns one task per connection. Every connection
//! borrows a lexer from the shared [`LexerPool`] for its lifetime.

pub mod connection;

pub use connection::{ConnState, Connection};

use crate::config::Config;
use crate::lexer::{LexerConfig, LexerPool};
use std::sync::Arc;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Server instance
pub struct Server {
    config: Config,
    pool: Arc<LexerPool<OwnedReadHalf>>,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: Config) -> Self {
        let pool = Arc::new(LexerPool::new(LexerConfig {
            read_buffer_size: config.read_buffer_size,
            max_line_length: config.max_line_length,
        }));

        Server { config, pool }
    }

    /// Bind the configured address and serve connections forever.
    pub async fn run(&self) -> std::io::Result<()> {
        let listener = TcpListener::bind(&self.config.listen).await?;
        info!(address = %listener.local_addr()?, "Server listening");
        self.serve(listener).await
    }

    /// Accept connections from an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> std::io::Result<()> {
        let mut next_id: u64 = 0;

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    next_id += 1;
                    debug!(conn = next_id, peer = %addr, "New connection");

                    let (reader, writer) = stream.into_split();
                    let conn = Connection::new(next_id, reader, writer, Arc::clone(&self.pool));

                    tokio::spawn(async move {
                        // Outcome is already logged by the connection.
                        let _ = conn.serve().await;
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    /// Get a reference to the lexer pool for testing
    #[cfg(test)]
    pub fn pool(&self) -> &Arc<LexerPool<OwnedReadHalf>> {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::connection::REPLY;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn test_config() -> Config {
        Config {
            listen: "127.0.0.1:0".to_string(),
            workers: None,
            read_buffer_size: 1024,
            max_line_length: 64 * 1024,
            log_level: "info".to_string(),
        }
    }

    async fn start() -> (Arc<Server>, SocketAddr) {
        let server = Arc::new(Server::new(test_config()));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept = Arc::clone(&server);
        tokio::spawn(async move { accept.serve(listener).await });

        (server, addr)
    }

    async fn ping(addr: SocketAddr, line: &[u8]) -> Vec<u8> {
        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(line).await.unwrap();
        client.shutdown().await.unwrap();

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        received
    }

    #[test]
    fn test_server_creation() {
        let server = Server::new(test_config());
        assert_eq!(server.pool().idle(), 0);
        assert_eq!(server.pool().created(), 0);
    }

    #[tokio::test]
    async fn test_ping_then_close() {
        let (_server, addr) = start().await;
        assert_eq!(ping(addr, b"ping\n").await, REPLY);
    }

    #[tokio::test]
    async fn test_concurrent_clients_are_isolated() {
        let (server, addr) = start().await;

        let clients: Vec<_> = [&b"+alpha\r\n"[..], b"$5\r\n", b"*3\n", b"plain\n"]
            .into_iter()
            .map(|line| tokio::spawn(ping(addr, line)))
            .collect();

        for client in clients {
            assert_eq!(client.await.unwrap(), REPLY);
        }

        // Server-side close runs after the reply; wait for all lexers to return.
        for _ in 0..100 {
            if server.pool().idle() == server.pool().created() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(server.pool().idle(), server.pool().created());
        assert!(server.pool().created() <= 4);
    }

    #[tokio::test]
    async fn test_lexer_reused_by_sequential_clients() {
        let (server, addr) = start().await;

        for _ in 0..3 {
            assert_eq!(ping(addr, b"ping\r\n").await, REPLY);
            for _ in 0..100 {
                if server.pool().idle() == 1 {
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        }

        assert_eq!(server.pool().created(), 1);
    }
}
