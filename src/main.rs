//! sigil-server: a line-oriented protocol front-end
//!
//! Accepts TCP connections, splits each byte stream into lines and classifies
//! every line into sigil-prefixed tokens (`+`, `-`, `*`, `$`) plus a payload.
//!
//! Features:
//! - Fragmentation-safe line framing (`\n` or `\r\n`)
//! - Tokenizer instances pooled and reused across connections
//! - `+PONG\r\n` acknowledgment after each drained read cycle
//! - Configuration via CLI arguments or TOML file

use sigil_server::config::Config;
use sigil_server::server::Server;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        workers = ?config.workers,
        read_buffer_size = config.read_buffer_size,
        max_line_length = config.max_line_length,
        "Starting sigil-server"
    );

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    if let Some(workers) = config.workers {
        builder.worker_threads(workers);
    }
    let runtime = builder.enable_all().build()?;

    runtime.block_on(async {
        let server = Server::new(config);
        tokio::select! {
            result = server.run() => result,
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                Ok(())
            }
        }
    })?;

    Ok(())
}
