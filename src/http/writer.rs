use std::io;

use bytes::{BufMut, Bytes, BytesMut};

use crate::http::request::Version;
use crate::http::response::{header_value, set_header, Response, StatusCode};

/// Version written in the status line for a request of version `requested`.
///
/// HTTP/1.0 clients get `HTTP/1.0`; everyone else gets `HTTP/1.1`.
pub fn response_version(requested: Version) -> Version {
    if requested == Version::HTTP_10 {
        Version::HTTP_10
    } else {
        Version::HTTP_11
    }
}

/// Serializes a prepared response, adding `Content-Length` and
/// `Connection: close` framing when absent.
pub fn serialize_response(resp: &Response, version: Version) -> Bytes {
    let mut buf = BytesMut::with_capacity(128 + resp.body.len());
    write_message(&mut buf, version, resp.status, &resp.headers, &resp.body);
    buf.freeze()
}

fn write_message(
    buf: &mut BytesMut,
    version: Version,
    status: StatusCode,
    headers: &[(String, String)],
    body: &[u8],
) {
    // Status line
    buf.put_slice(
        format!(
            "{} {} {}\r\n",
            response_version(version),
            status.as_u16(),
            status.reason_phrase()
        )
        .as_bytes(),
    );

    // Headers
    for (k, v) in headers {
        if !is_safe_field(k) || !is_safe_field(v) {
            tracing::warn!(header = %k.escape_debug(), "Dropping header containing CR or LF");
            continue;
        }
        put_header(buf, k, v);
    }

    let body = if status.allows_body() { body } else { &[][..] };

    if status.allows_body() && header_value(headers, "Content-Length").is_none() {
        put_header(buf, "Content-Length", &body.len().to_string());
    }
    if header_value(headers, "Connection").is_none() {
        put_header(buf, "Connection", "close");
    }

    // Header/body separator
    buf.put_slice(b"\r\n");

    // Body
    buf.put_slice(body);
}

fn put_header(buf: &mut BytesMut, key: &str, value: &str) {
    buf.put_slice(key.as_bytes());
    buf.put_slice(b": ");
    buf.put_slice(value.as_bytes());
    buf.put_slice(b"\r\n");
}

fn is_safe_field(s: &str) -> bool {
    !s.bytes().any(|b| b == b'\r' || b == b'\n')
}

/// The handle a [`Handler`](crate::http::handler::Handler) writes its
/// response through.
///
/// Everything is buffered in memory; the connection puts it on the wire only
/// after the handler returns. Status and headers are frozen ("committed") by
/// the first of `write_header`, a body write, or `flush`. A handler that
/// never sets a status answers 200.
///
/// Body writes go through [`std::io::Write`], so `write!` and `write_all`
/// work directly.
#[derive(Debug, Default)]
pub struct ResponseWriter {
    status: Option<StatusCode>,
    headers: Vec<(String, String)>,
    body: BytesMut,
    committed: bool,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a response header.
    ///
    /// Ignored once the header is committed.
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if self.committed {
            tracing::warn!(header = %key, "Header set after response was committed; ignoring");
            return;
        }
        set_header(&mut self.headers, key, value.into());
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        header_value(&self.headers, key)
    }

    /// Sets the status and commits the header. Only the first call counts.
    pub fn write_header(&mut self, status: StatusCode) {
        if self.committed {
            tracing::warn!(
                status = status.as_u16(),
                "Superfluous write_header call; status already committed"
            );
            return;
        }
        self.status = Some(status);
        self.committed = true;
    }

    /// Status the response will carry, if one has been committed.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    /// Writes a prepared response: its headers, status and body.
    pub fn send(&mut self, response: Response) -> io::Result<()> {
        for (k, v) in response.headers {
            self.set_header(k, v);
        }
        self.write_header(response.status);
        io::Write::write_all(self, &response.body)
    }

    /// Serializes the buffered response for a request of version `version`.
    pub fn finish(mut self, version: Version) -> Bytes {
        let status = *self.status.get_or_insert(StatusCode::OK);
        let mut buf = BytesMut::with_capacity(128 + self.body.len());
        write_message(&mut buf, version, status, &self.headers, &self.body);
        buf.freeze()
    }

    fn commit(&mut self) {
        if !self.committed {
            self.status = Some(StatusCode::OK);
            self.committed = true;
        }
    }
}

impl io::Write for ResponseWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.commit();
        self.body.extend_from_slice(data);
        Ok(data.len())
    }

    /// Commits the header. Bytes still reach the client only when the
    /// handler returns.
    fn flush(&mut self) -> io::Result<()> {
        self.commit();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn body_write_commits_default_status() {
        let mut w = ResponseWriter::new();
        w.write_all(b"hi").unwrap();
        w.write_header(StatusCode::NOT_FOUND);

        assert_eq!(w.status(), Some(StatusCode::OK));
    }

    #[test]
    fn finish_frames_body() {
        let mut w = ResponseWriter::new();
        w.write_all(b"ok").unwrap();
        let out = w.finish(Version::HTTP_11);

        assert_eq!(
            &out[..],
            b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok"
        );
    }
}
