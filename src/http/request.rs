use std::fmt;
use std::net::SocketAddr;

/// HTTP request methods.
///
/// The common verbs get their own variant. Any other token is kept verbatim
/// in [`Method::Extension`], so parsing never rejects a method by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// POST - Create or submit data
    POST,
    /// PUT - Replace a resource
    PUT,
    /// DELETE - Delete a resource
    DELETE,
    /// HEAD - Like GET but without the response body
    HEAD,
    /// OPTIONS - Describe communication options
    OPTIONS,
    /// PATCH - Partial modification of a resource
    PATCH,
    /// Any other method token, byte-exact
    Extension(String),
}

impl Method {
    /// Parses an HTTP method token.
    ///
    /// Matching is case-sensitive. Unknown tokens become [`Method::Extension`].
    ///
    /// # Example
    ///
    /// ```
    /// # use muxline::http::request::Method;
    /// assert_eq!(Method::parse("GET"), Method::GET);
    /// assert_eq!(Method::parse("get"), Method::Extension("get".to_string()));
    /// ```
    pub fn parse(s: &str) -> Self {
        match s {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "DELETE" => Method::DELETE,
            "HEAD" => Method::HEAD,
            "OPTIONS" => Method::OPTIONS,
            "PATCH" => Method::PATCH,
            other => Method::Extension(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
            Method::OPTIONS => "OPTIONS",
            Method::PATCH => "PATCH",
            Method::Extension(token) => token,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Protocol version from the request line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Version {
    pub const HTTP_09: Version = Version { major: 0, minor: 9 };
    pub const HTTP_10: Version = Version { major: 1, minor: 0 };
    pub const HTTP_11: Version = Version { major: 1, minor: 1 };

    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl Default for Version {
    fn default() -> Self {
        Version::HTTP_11
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP/{}.{}", self.major, self.minor)
    }
}

/// A parsed request line.
///
/// Produced once per connection by the request line parser. Header fields and
/// the body are not part of this value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// The HTTP method (GET, POST, etc.)
    pub method: Method,
    /// The request target exactly as sent, query included (e.g. "/search?q=rust")
    pub target: String,
    /// Protocol version
    pub version: Version,
    /// Address of the client, when known
    pub remote_addr: Option<SocketAddr>,
}

/// Builder for constructing Request objects.
pub struct RequestBuilder {
    method: Option<Method>,
    target: Option<String>,
    version: Version,
    remote_addr: Option<SocketAddr>,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self {
            method: None,
            target: None,
            version: Version::default(),
            remote_addr: None,
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn build(self) -> Result<Request, &'static str> {
        let method = self.method.ok_or("method missing")?;
        let target = self.target.ok_or("target missing")?;

        if method.as_str().is_empty() {
            return Err("method empty");
        }
        if target.is_empty() {
            return Err("target empty");
        }

        Ok(Request {
            method,
            target,
            version: self.version,
            remote_addr: self.remote_addr,
        })
    }
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Request {
    /// Path component of the target, without the query string.
    ///
    /// For an absolute-form target (`http://host/path`) this is the path part
    /// of the URL.
    pub fn path(&self) -> &str {
        let target = match self.absolute_path_start() {
            Some(start) => &self.target[start..],
            None if self.is_absolute_form() => return "/",
            None => &self.target,
        };

        match target.find('?') {
            Some(idx) => &target[..idx],
            None => target,
        }
    }

    /// Query string without the leading `?`, if any.
    pub fn query(&self) -> Option<&str> {
        self.target.split_once('?').map(|(_, q)| q)
    }

    /// Host named by an absolute-form target, lower-cased.
    ///
    /// Returns `None` for origin-form targets such as `/index.html`; those
    /// carry their host in a header, which this crate does not parse.
    pub fn host(&self) -> Option<String> {
        if !self.is_absolute_form() {
            return None;
        }

        let url = url::Url::parse(&self.target).ok()?;
        url.host_str().map(|h| h.to_ascii_lowercase())
    }

    fn is_absolute_form(&self) -> bool {
        self.target.starts_with("http://") || self.target.starts_with("https://")
    }

    fn absolute_path_start(&self) -> Option<usize> {
        if !self.is_absolute_form() {
            return None;
        }
        let after_scheme = self.target.find("://")? + 3;
        let rest = &self.target[after_scheme..];
        match rest.find(['/', '?']) {
            Some(idx) if rest.as_bytes()[idx] == b'/' => Some(after_scheme + idx),
            _ => None,
        }
    }
}
