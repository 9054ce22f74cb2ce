use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use crate::http::connection::Connection;
use crate::http::mux::ServeMux;
use crate::http::parser::LineReaderPool;

/// Port used when the bind address is empty.
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Normalizes a configured bind address.
///
/// An empty address means all interfaces on the standard HTTP port, and a
/// bare `:port` means all interfaces on that port.
///
/// ```
/// # use muxline::server::listener::resolve_bind_addr;
/// assert_eq!(resolve_bind_addr(""), "0.0.0.0:80");
/// assert_eq!(resolve_bind_addr(":3333"), "0.0.0.0:3333");
/// assert_eq!(resolve_bind_addr("127.0.0.1:8080"), "127.0.0.1:8080");
/// ```
pub fn resolve_bind_addr(addr: &str) -> String {
    let addr = addr.trim();
    if addr.is_empty() {
        format!("0.0.0.0:{}", DEFAULT_HTTP_PORT)
    } else if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    }
}

pub async fn bind(addr: &str) -> anyhow::Result<TcpListener> {
    let addr = resolve_bind_addr(addr);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Listening on {}", listener.local_addr().map_or(addr, |a| a.to_string()));
    Ok(listener)
}

/// Accepts sockets until `accept` fails, spawning one task per connection.
///
/// Spawned tasks are not awaited; an accept error ends the loop and is
/// returned to the caller.
pub async fn run(
    listener: TcpListener,
    mux: Arc<ServeMux>,
    pool: Arc<LineReaderPool>,
) -> anyhow::Result<()> {
    loop {
        let (socket, peer) = listener.accept().await.context("Accept failed")?;
        info!("Accepted connection from {}", peer);

        let conn = Connection::accept(socket, Arc::clone(&mux), Arc::clone(&pool));
        tokio::spawn(async move {
            if let Err(e) = conn.run().await {
                tracing::error!("Connection error from {}: {}", peer, e);
            }
        });
    }
}
