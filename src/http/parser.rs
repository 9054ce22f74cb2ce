use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::BytesMut;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::http::request::{Method, Request, Version};

/// Longest request line accepted, terminator included.
pub const MAX_REQUEST_LINE: usize = 8 * 1024;

/// Idle line readers kept by a pool before extras are dropped.
const DEFAULT_MAX_IDLE: usize = 256;

#[derive(Debug)]
pub enum ParseError {
    /// The stream ended, or was reset, before any byte of a request line
    /// arrived.
    ConnectionClosed,
    /// The line is not `<METHOD> <target> HTTP/<major>.<minor>`.
    MalformedRequestLine,
    /// The line exceeded [`MAX_REQUEST_LINE`] without a terminator.
    LineTooLong,
    Io(std::io::Error),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::ConnectionClosed => write!(f, "connection closed before request line"),
            ParseError::MalformedRequestLine => write!(f, "malformed request line"),
            ParseError::LineTooLong => write!(f, "request line too long"),
            ParseError::Io(e) => write!(f, "I/O error reading request line: {}", e),
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ParseError::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// Splits a request line (terminator already removed) into a [`Request`].
///
/// Fields are separated by single spaces: the method runs to the first space,
/// the target to the second, and the rest is the protocol string. An empty
/// protocol string means HTTP/1.1.
pub fn parse_request_line(line: &[u8]) -> Result<Request, ParseError> {
    let line = std::str::from_utf8(line).map_err(|_| ParseError::MalformedRequestLine)?;

    let (method, rest) = line
        .split_once(' ')
        .ok_or(ParseError::MalformedRequestLine)?;
    let (target, proto) = rest
        .split_once(' ')
        .ok_or(ParseError::MalformedRequestLine)?;

    if method.is_empty() || target.is_empty() {
        return Err(ParseError::MalformedRequestLine);
    }

    let version = parse_version(proto)?;

    Ok(Request {
        method: Method::parse(method),
        target: target.to_string(),
        version,
        remote_addr: None,
    })
}

fn parse_version(proto: &str) -> Result<Version, ParseError> {
    if proto.is_empty() {
        return Ok(Version::default());
    }

    let (name, version) = proto
        .split_once('/')
        .ok_or(ParseError::MalformedRequestLine)?;
    if name != "HTTP" {
        return Err(ParseError::MalformedRequestLine);
    }

    let (major, minor) = version
        .trim_start()
        .split_once('.')
        .ok_or(ParseError::MalformedRequestLine)?;

    Ok(Version::new(parse_digits(major)?, parse_digits(minor)?))
}

fn parse_digits(s: &str) -> Result<u32, ParseError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::MalformedRequestLine);
    }
    s.parse().map_err(|_| ParseError::MalformedRequestLine)
}

/// Errors that mean the client went away rather than sent something bad.
fn is_hang_up(e: &std::io::Error) -> bool {
    use std::io::ErrorKind;

    matches!(
        e.kind(),
        ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::UnexpectedEof
            | ErrorKind::BrokenPipe
    )
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Reads one request line at a time from a buffered stream.
///
/// Owns the scratch buffer the line is assembled in; that buffer is what the
/// [`LineReaderPool`] recycles between connections.
#[derive(Debug)]
pub struct LineReader {
    buf: BytesMut,
    limit: usize,
}

impl LineReader {
    pub fn new() -> Self {
        Self::with_limit(MAX_REQUEST_LINE)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(256),
            limit,
        }
    }

    /// Drops any bytes left over from a previous stream.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Reads exactly one line from `reader` and returns it without its
    /// terminator.
    ///
    /// Consumes the line and its `\n` from the reader and nothing more, so
    /// the reader is left at the first byte of the header block. A stream
    /// that ends mid-line yields the partial line.
    pub async fn read_line<R>(&mut self, reader: &mut R) -> Result<&[u8], ParseError>
    where
        R: AsyncBufRead + Unpin,
    {
        self.buf.clear();

        loop {
            let available = match reader.fill_buf().await {
                Ok(available) => available,
                Err(e) if self.buf.is_empty() && is_hang_up(&e) => {
                    return Err(ParseError::ConnectionClosed);
                }
                Err(e) => return Err(ParseError::Io(e)),
            };
            if available.is_empty() {
                if self.buf.is_empty() {
                    return Err(ParseError::ConnectionClosed);
                }
                break;
            }

            let (chunk, done) = match available.iter().position(|&b| b == b'\n') {
                Some(idx) => (&available[..=idx], true),
                None => (available, false),
            };

            if self.buf.len() + chunk.len() > self.limit {
                return Err(ParseError::LineTooLong);
            }

            let n = chunk.len();
            self.buf.extend_from_slice(chunk);
            reader.consume(n);

            if done {
                break;
            }
        }

        Ok(trim_line_end(&self.buf))
    }

    /// Reads and parses the request line.
    pub async fn read_request<R>(&mut self, reader: &mut R) -> Result<Request, ParseError>
    where
        R: AsyncBufRead + Unpin,
    {
        let line = self.read_line(reader).await?;
        parse_request_line(line)
    }
}

impl Default for LineReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Pool of [`LineReader`]s shared by all connections of a server.
///
/// Every reader handed out has been reset, so no bytes from one connection
/// can show up in another.
#[derive(Debug)]
pub struct LineReaderPool {
    idle: Mutex<Vec<LineReader>>,
    max_idle: usize,
    limit: usize,
}

impl LineReaderPool {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_IDLE, MAX_REQUEST_LINE)
    }

    pub fn with_capacity(max_idle: usize, limit: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            max_idle,
            limit,
        }
    }

    /// Takes an idle reader, or creates one when the pool is empty.
    pub fn acquire(self: &Arc<Self>) -> PooledLineReader {
        let reader = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();

        let mut reader = reader.unwrap_or_else(|| LineReader::with_limit(self.limit));
        reader.reset();

        PooledLineReader {
            reader,
            pool: Arc::clone(self),
        }
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn release(&self, mut reader: LineReader) {
        reader.reset();
        // A reader that grew for a huge line is not worth keeping around.
        if reader.buf.capacity() > self.limit {
            return;
        }

        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.max_idle {
            idle.push(reader);
        }
    }
}

impl Default for LineReaderPool {
    fn default() -> Self {
        Self::new()
    }
}

/// A [`LineReader`] on loan from a [`LineReaderPool`]; returned on drop.
#[derive(Debug)]
pub struct PooledLineReader {
    reader: LineReader,
    pool: Arc<LineReaderPool>,
}

impl Deref for PooledLineReader {
    type Target = LineReader;

    fn deref(&self) -> &LineReader {
        &self.reader
    }
}

impl DerefMut for PooledLineReader {
    fn deref_mut(&mut self) -> &mut LineReader {
        &mut self.reader
    }
}

impl Drop for PooledLineReader {
    fn drop(&mut self) {
        let empty = LineReader {
            buf: BytesMut::new(),
            limit: self.reader.limit,
        };
        let reader = std::mem::replace(&mut self.reader, empty);
        self.pool.release(reader);
    }
}
