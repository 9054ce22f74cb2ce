//! Muxline - minimal HTTP/1.x server core
//!
//! Accepts connections, parses the request line, routes by path or host
//! pattern to a registered handler and writes one response per connection.

pub mod config;
pub mod http;
pub mod server;
