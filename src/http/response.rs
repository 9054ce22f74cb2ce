/// HTTP status code.
///
/// Any code in `100..=999` can be carried; the common ones have constants
/// and a known reason phrase:
/// - `OK` (200): Request successful
/// - `CREATED` (201): Resource created successfully
/// - `NO_CONTENT` (204): Successful request with no content
/// - `BAD_REQUEST` (400): Malformed request
/// - `NOT_FOUND` (404): No route for the request
/// - `METHOD_NOT_ALLOWED` (405): HTTP method not supported
/// - `INTERNAL_SERVER_ERROR` (500): Handler failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(u16);

impl StatusCode {
    pub const CONTINUE: StatusCode = StatusCode(100);
    pub const OK: StatusCode = StatusCode(200);
    pub const CREATED: StatusCode = StatusCode(201);
    pub const NO_CONTENT: StatusCode = StatusCode(204);
    pub const NOT_MODIFIED: StatusCode = StatusCode(304);
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const METHOD_NOT_ALLOWED: StatusCode = StatusCode(405);
    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode(500);

    /// Builds a status code from its numeric value.
    ///
    /// Returns `None` outside `100..=999`, which cannot be framed as a
    /// three-digit status.
    ///
    /// # Example
    ///
    /// ```
    /// # use muxline::http::response::StatusCode;
    /// assert_eq!(StatusCode::from_u16(404), Some(StatusCode::NOT_FOUND));
    /// assert_eq!(StatusCode::from_u16(42), None);
    /// ```
    pub fn from_u16(code: u16) -> Option<Self> {
        (100..=999).contains(&code).then_some(StatusCode(code))
    }

    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use muxline::http::response::StatusCode;
    /// assert_eq!(StatusCode::OK.as_u16(), 200);
    /// assert_eq!(StatusCode::NOT_FOUND.as_u16(), 404);
    /// ```
    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// Returns the standard HTTP reason phrase for this status code.
    ///
    /// Unknown codes get an empty phrase; the status line stays well formed.
    ///
    /// # Example
    ///
    /// ```
    /// # use muxline::http::response::StatusCode;
    /// assert_eq!(StatusCode::OK.reason_phrase(), "OK");
    /// assert_eq!(StatusCode::NOT_FOUND.reason_phrase(), "Not Found");
    /// ```
    pub fn reason_phrase(&self) -> &'static str {
        match self.0 {
            100 => "Continue",
            200 => "OK",
            201 => "Created",
            202 => "Accepted",
            204 => "No Content",
            301 => "Moved Permanently",
            302 => "Found",
            304 => "Not Modified",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            414 => "URI Too Long",
            500 => "Internal Server Error",
            501 => "Not Implemented",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            504 => "Gateway Timeout",
            _ => "",
        }
    }

    /// Whether a response with this status may carry a body.
    pub fn allows_body(&self) -> bool {
        !(self.is_informational() || self.0 == 204 || self.0 == 304)
    }

    pub fn is_informational(&self) -> bool {
        (100..200).contains(&self.0)
    }
}

/// A complete HTTP response prepared up front.
///
/// Used for the responses the connection sends on its own (bad request, not
/// found, internal error) and by handlers that prefer to build a response
/// whole and hand it to `ResponseWriter::send`.
#[derive(Debug, Clone)]
pub struct Response {
    /// The HTTP status code
    pub status: StatusCode,
    /// Headers in the order they will be written
    pub headers: Vec<(String, String)>,
    /// Response body as bytes
    pub body: Vec<u8>,
}

/// Builder for constructing HTTP responses in a fluent style.
///
/// # Example
///
/// ```ignore
/// let response = ResponseBuilder::new(StatusCode::OK)
///     .header("Content-Type", "application/json")
///     .body(b"{}".to_vec())
///     .build();
/// ```
pub struct ResponseBuilder {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl ResponseBuilder {
    /// Creates a new response builder with the specified status code.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Adds or replaces a header. Names compare case-insensitively.
    ///
    /// # Example
    ///
    /// ```ignore
    /// builder.header("Content-Type", "text/plain")
    ///     .header("Cache-Control", "no-cache")
    /// ```
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        set_header(&mut self.headers, key.into(), value.into());
        self
    }

    /// Sets the response body.
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn build(self) -> Response {
        Response {
            status: self.status,
            headers: self.headers,
            body: self.body,
        }
    }
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        ResponseBuilder::new(status).build()
    }

    /// Creates a simple 200 OK response with the given body.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        ResponseBuilder::new(StatusCode::OK)
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body)
            .build()
    }

    /// Creates a 400 Bad Request response.
    pub fn bad_request() -> Self {
        Self::plain(StatusCode::BAD_REQUEST)
    }

    /// Creates a 404 Not Found response.
    pub fn not_found() -> Self {
        Self::plain(StatusCode::NOT_FOUND)
    }

    /// Creates a 500 Internal Server Error response.
    pub fn internal_error() -> Self {
        Self::plain(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Looks up a header value by name, ignoring ASCII case.
    pub fn header(&self, key: &str) -> Option<&str> {
        header_value(&self.headers, key)
    }

    fn plain(status: StatusCode) -> Self {
        let body = format!("{} {}", status.as_u16(), status.reason_phrase());
        ResponseBuilder::new(status)
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body)
            .build()
    }
}

pub(crate) fn header_value<'a>(headers: &'a [(String, String)], key: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_str())
}

pub(crate) fn set_header(headers: &mut Vec<(String, String)>, key: String, value: String) {
    match headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&key)) {
        Some(entry) => entry.1 = value,
        None => headers.push((key, value)),
    }
}
