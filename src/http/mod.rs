//! HTTP protocol implementation.
//!
//! This module implements a minimal HTTP/1.x server core: one request per
//! connection, routed by path (and optionally host) to a registered handler.
//!
//! # Architecture
//!
//! The HTTP layer is organized into several submodules:
//!
//! - **`connection`**: The per-socket state machine driving parse, route, handle, write
//! - **`parser`**: Reads and splits the request line; pooled line readers
//! - **`request`**: Request line representation (method, target, version)
//! - **`mux`**: Route table with longest-prefix matching and host-qualified patterns
//! - **`handler`**: The handler capability and the function adapter
//! - **`writer`**: The buffered response writer handed to handlers
//! - **`response`**: Status codes and prepared responses
//!
//! # Connection State Machine
//!
//! Each client connection goes through a state machine:
//!
//! ```text
//!        ┌──────────────────┐
//!        │    Accepted      │ ← Socket handed over by the listener
//!        └──────┬───────────┘
//!               ▼
//!        ┌──────────────────┐
//!        │  ReadingRequest  │ ← Read one request line
//!        └──────┬───────────┘
//!               │ ├─ client hung up → Closed
//!               │ └─ malformed → WritingResponse (400)
//!               ▼
//!        ┌──────────────────┐
//!        │     Routing      │ ← Resolve host + path in the mux
//!        └──────┬───────────┘
//!               │ └─ no route → WritingResponse (404)
//!               ▼
//!        ┌──────────────────┐
//!        │     Handling     │ ← Run the handler into a buffer
//!        └──────┬───────────┘
//!               │ └─ handler panic → WritingResponse (500)
//!               ▼
//!        ┌──────────────────┐
//!        │ WritingResponse  │ ← Flush the buffer to the client
//!        └──────┬───────────┘
//!               ▼
//!        ┌──────────────────┐
//!        │     Closed       │ ← Socket released
//!        └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use muxline::http::connection::Connection;
//! use muxline::http::mux::ServeMux;
//! use muxline::http::parser::LineReaderPool;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await?;
//!     let mux = Arc::new(ServeMux::new());
//!     let pool = Arc::new(LineReaderPool::new());
//!
//!     loop {
//!         let (socket, _addr) = listener.accept().await?;
//!         let conn = Connection::accept(socket, mux.clone(), pool.clone());
//!         tokio::spawn(async move {
//!             if let Err(e) = conn.run().await {
//!                 eprintln!("Connection error: {}", e);
//!             }
//!         });
//!     }
//! }
//! ```

pub mod request;
pub mod response;
pub mod parser;
pub mod connection;
pub mod writer;
pub mod handler;
pub mod mux;
