use std::any::Any;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{
    AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter, ReadHalf,
    WriteHalf,
};
use tokio::net::TcpStream;

use crate::http::mux::{MuxEntry, ServeMux};
use crate::http::parser::{LineReaderPool, ParseError};
use crate::http::request::{Request, Version};
use crate::http::response::Response;
use crate::http::writer::{serialize_response, ResponseWriter};

/// How long a closing connection keeps draining unread client bytes, so the
/// peer sees our FIN instead of a reset that could discard the response.
const LINGER_TIMEOUT: Duration = Duration::from_millis(500);
const LINGER_MAX_BYTES: usize = 64 * 1024;

/// One accepted socket serving exactly one request.
pub struct Connection<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: BufWriter<WriteHalf<S>>,
    mux: Arc<ServeMux>,
    pool: Arc<LineReaderPool>,
    peer: Option<SocketAddr>,
    local: Option<SocketAddr>,
    state: ConnectionState,
}

#[derive(Debug)]
pub enum ConnectionState {
    Accepted,
    ReadingRequest,
    Routing(Request),
    Handling(Request, MuxEntry),
    WritingResponse(Bytes),
    Closed,
}

impl Connection<TcpStream> {
    /// Wraps a socket fresh from `accept`, recording both of its addresses.
    pub fn accept(stream: TcpStream, mux: Arc<ServeMux>, pool: Arc<LineReaderPool>) -> Self {
        let peer = stream.peer_addr().ok();
        let local = stream.local_addr().ok();
        Self::new(stream, mux, pool).with_addrs(peer, local)
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, mux: Arc<ServeMux>, pool: Arc<LineReaderPool>) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
            mux,
            pool,
            peer: None,
            local: None,
            state: ConnectionState::Accepted,
        }
    }

    /// Sets the client address and the local address the client reached.
    ///
    /// The local address supplies the host used for host-qualified routes
    /// when the request target does not name one.
    pub fn with_addrs(mut self, peer: Option<SocketAddr>, local: Option<SocketAddr>) -> Self {
        self.peer = peer;
        self.local = local;
        self
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Drives the connection to `Closed`.
    ///
    /// Only I/O failures are returned. A client that leaves without sending
    /// anything, a malformed request line, a missing route and a panicking
    /// handler all end in `Ok(())`. The socket is closed when `self` drops,
    /// on every path.
    pub async fn run(mut self) -> anyhow::Result<()> {
        let mut responded = false;

        loop {
            let state = std::mem::replace(&mut self.state, ConnectionState::Closed);

            self.state = match state {
                ConnectionState::Accepted => ConnectionState::ReadingRequest,

                ConnectionState::ReadingRequest => self.read_request().await?,

                ConnectionState::Routing(req) => self.route(req),

                ConnectionState::Handling(req, entry) => Self::handle(req, entry),

                ConnectionState::WritingResponse(bytes) => {
                    self.writer.write_all(&bytes).await?;
                    self.writer.flush().await?;
                    responded = true;
                    ConnectionState::Closed
                }

                ConnectionState::Closed => {
                    self.close(responded).await;
                    return Ok(());
                }
            };
        }
    }

    async fn read_request(&mut self) -> anyhow::Result<ConnectionState> {
        let mut line_reader = self.pool.acquire();

        match line_reader.read_request(&mut self.reader).await {
            Ok(mut req) => {
                req.remote_addr = self.peer;
                Ok(ConnectionState::Routing(req))
            }
            Err(ParseError::ConnectionClosed) => {
                tracing::debug!(peer = ?self.peer, "Client closed before sending a request");
                Ok(ConnectionState::Closed)
            }
            Err(e @ (ParseError::MalformedRequestLine | ParseError::LineTooLong)) => {
                tracing::warn!(peer = ?self.peer, error = %e, "Rejecting request");
                let bytes = serialize_response(&Response::bad_request(), Version::HTTP_11);
                Ok(ConnectionState::WritingResponse(bytes))
            }
            Err(ParseError::Io(e)) => Err(e.into()),
        }
    }

    fn route(&self, req: Request) -> ConnectionState {
        let host = req.host().or_else(|| self.local.map(local_host));

        match self.mux.resolve(host.as_deref(), req.path()) {
            Some(entry) => ConnectionState::Handling(req, entry),
            None => {
                tracing::debug!(
                    method = %req.method,
                    path = %req.path(),
                    host = ?host,
                    "No route matched"
                );
                let bytes = serialize_response(&Response::not_found(), req.version);
                ConnectionState::WritingResponse(bytes)
            }
        }
    }

    fn handle(req: Request, entry: MuxEntry) -> ConnectionState {
        let mut w = ResponseWriter::new();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| entry.serve(&mut w, &req)));

        match outcome {
            Ok(()) => {
                tracing::info!(
                    method = %req.method,
                    target = %req.target,
                    pattern = %entry.pattern(),
                    status = w.status().map_or(200, |s| s.as_u16()),
                    "Request served"
                );
                ConnectionState::WritingResponse(w.finish(req.version))
            }
            Err(payload) => {
                tracing::error!(
                    method = %req.method,
                    target = %req.target,
                    pattern = %entry.pattern(),
                    panic = %panic_message(payload.as_ref()),
                    "Handler panicked"
                );
                let bytes = serialize_response(&Response::internal_error(), req.version);
                ConnectionState::WritingResponse(bytes)
            }
        }
    }

    async fn close(&mut self, responded: bool) {
        if let Err(e) = self.writer.shutdown().await {
            tracing::trace!(error = %e, "Shutdown after response failed");
            return;
        }

        if responded {
            // Anything the client sent past the request line is still unread.
            let mut limited = (&mut self.reader).take(LINGER_MAX_BYTES as u64);
            let mut sink = tokio::io::sink();
            let drain = tokio::io::copy(&mut limited, &mut sink);
            let _ = tokio::time::timeout(LINGER_TIMEOUT, drain).await;
        }
    }
}

/// Host name for a local socket address, in the same form `url` gives for
/// absolute-form targets: IPv6 addresses are bracketed.
fn local_host(addr: SocketAddr) -> String {
    match addr {
        SocketAddr::V4(a) => a.ip().to_string(),
        SocketAddr::V6(a) => format!("[{}]", a.ip()),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
