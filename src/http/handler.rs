//! The handler capability.
//!
//! A handler is anything that can answer a [`Request`] through a
//! [`ResponseWriter`]. Plain functions and closures are adapted with
//! [`HandlerFunc`]; types with their own state implement [`Handler`]
//! directly.

use std::fmt;

use crate::http::request::Request;
use crate::http::writer::ResponseWriter;

/// Request-handling logic registered on a [`ServeMux`](crate::http::mux::ServeMux).
///
/// Handlers run synchronously on the connection's task, which is a tokio
/// worker thread. A handler that blocks (file I/O, a slow computation, a
/// sleep) must wrap that work in [`tokio::task::block_in_place`] so the
/// runtime moves other connections off the thread; this needs the
/// multi-threaded runtime. `spawn_blocking` alone does not help here, as a
/// synchronous `serve` has no way to await its result.
///
/// A panic inside `serve` is contained by the connection and answered with a
/// 500; nothing the handler wrote before panicking is sent.
pub trait Handler: Send + Sync + 'static {
    fn serve(&self, w: &mut ResponseWriter, req: &Request);
}

/// Adapts a function or closure into a [`Handler`].
///
/// # Example
///
/// ```
/// # use muxline::http::handler::{Handler, HandlerFunc};
/// # use muxline::http::request::Request;
/// # use muxline::http::response::StatusCode;
/// # use muxline::http::writer::ResponseWriter;
/// use std::io::Write;
///
/// let hello = HandlerFunc::new(|w: &mut ResponseWriter, _req: &Request| {
///     w.write_header(StatusCode::OK);
///     let _ = w.write_all(b"hello");
/// });
/// ```
pub struct HandlerFunc<F>(F);

impl<F> HandlerFunc<F>
where
    F: Fn(&mut ResponseWriter, &Request) + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        HandlerFunc(f)
    }
}

impl<F> Handler for HandlerFunc<F>
where
    F: Fn(&mut ResponseWriter, &Request) + Send + Sync + 'static,
{
    fn serve(&self, w: &mut ResponseWriter, req: &Request) {
        (self.0)(w, req)
    }
}

impl<F> fmt::Debug for HandlerFunc<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HandlerFunc")
    }
}
