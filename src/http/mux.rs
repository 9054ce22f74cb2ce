//! Route table.
//!
//! Maps patterns to handlers and picks the handler for a request.
//!
//! # Patterns
//! - `/exact` matches only that path
//! - `/prefix/` (trailing slash) matches every path under it
//! - `host/...` (no leading slash) is host-qualified and only matches
//!   requests for that host
//!
//! # Matching
//! - An exact match wins outright
//! - Otherwise the longest `/`-terminated pattern that prefixes the target wins
//! - Host-qualified patterns are tried first, and only when any exist
//! - No match is a normal outcome (`None`), answered with 404 by the connection

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::http::handler::{Handler, HandlerFunc};
use crate::http::request::Request;
use crate::http::writer::ResponseWriter;

/// Registration failures. Both are programmer errors, expected only while
/// the table is being set up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MuxError {
    InvalidRegistration(String),
    DuplicateRegistration(String),
}

impl fmt::Display for MuxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MuxError::InvalidRegistration(pattern) => {
                write!(f, "invalid pattern {:?}", pattern)
            }
            MuxError::DuplicateRegistration(pattern) => {
                write!(f, "multiple registrations for {}", pattern)
            }
        }
    }
}

impl std::error::Error for MuxError {}

/// A registered (pattern, handler) pair.
#[derive(Clone)]
pub struct MuxEntry {
    pattern: String,
    handler: Arc<dyn Handler>,
}

impl MuxEntry {
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    pub fn serve(&self, w: &mut ResponseWriter, req: &Request) {
        self.handler.serve(w, req)
    }

    fn is_prefix(&self) -> bool {
        self.pattern.ends_with('/')
    }
}

impl fmt::Debug for MuxEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MuxEntry")
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct Routes {
    /// Every pattern, for exact matches and duplicate detection.
    entries: HashMap<String, MuxEntry>,
    /// `/`-terminated patterns, longest first.
    prefixes: Vec<MuxEntry>,
    hosts: bool,
}

impl Routes {
    fn lookup(&self, target: &str) -> Option<&MuxEntry> {
        if let Some(entry) = self.entries.get(target) {
            return Some(entry);
        }

        self.prefixes
            .iter()
            .find(|entry| target.starts_with(entry.pattern.as_str()))
    }
}

/// A concurrent route table.
///
/// Lookups take a shared lock and run in parallel; registration takes the
/// exclusive lock. Register everything before the server starts accepting;
/// a registration racing with traffic is still safe, it just may or may not
/// be seen by requests already in flight.
#[derive(Default)]
pub struct ServeMux {
    routes: RwLock<Routes>,
}

static DEFAULT_MUX: OnceLock<Arc<ServeMux>> = OnceLock::new();

impl ServeMux {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide default table.
    ///
    /// Created empty on first use. Populate it during start-up, before any
    /// [`Server`](crate::server::Server) built without its own table starts
    /// serving.
    pub fn global() -> Arc<ServeMux> {
        Arc::clone(DEFAULT_MUX.get_or_init(|| Arc::new(ServeMux::new())))
    }

    /// Registers `handler` for `pattern`.
    pub fn handle<H: Handler>(&self, pattern: &str, handler: H) -> Result<(), MuxError> {
        self.handle_shared(pattern, Arc::new(handler))
    }

    /// Registers a function or closure for `pattern`.
    pub fn handle_func<F>(&self, pattern: &str, f: F) -> Result<(), MuxError>
    where
        F: Fn(&mut ResponseWriter, &Request) + Send + Sync + 'static,
    {
        self.handle(pattern, HandlerFunc::new(f))
    }

    /// Registers an already shared handler, so one handler can serve several
    /// patterns.
    pub fn handle_shared(&self, pattern: &str, handler: Arc<dyn Handler>) -> Result<(), MuxError> {
        validate_pattern(pattern)?;

        let mut routes = self.write();

        if routes.entries.contains_key(pattern) {
            return Err(MuxError::DuplicateRegistration(pattern.to_string()));
        }

        let entry = MuxEntry {
            pattern: pattern.to_string(),
            handler,
        };

        if entry.is_prefix() {
            let idx = routes
                .prefixes
                .partition_point(|e| e.pattern.len() >= pattern.len());
            routes.prefixes.insert(idx, entry.clone());
        }

        if is_host_qualified(pattern) {
            routes.hosts = true;
        }

        routes.entries.insert(pattern.to_string(), entry);

        tracing::debug!(pattern = %pattern, "Route registered");
        Ok(())
    }

    /// Finds the handler for a request to `host` with path `path`.
    ///
    /// `path` must not carry a query string. `host` is compared as given;
    /// callers lower-case it.
    pub fn resolve(&self, host: Option<&str>, path: &str) -> Option<MuxEntry> {
        let routes = self.read();

        if routes.hosts {
            if let Some(host) = host.filter(|h| !h.is_empty()) {
                let qualified = format!("{}{}", host, path);
                if let Some(entry) = routes.lookup(&qualified) {
                    return Some(entry.clone());
                }
            }
        }

        routes.lookup(path).cloned()
    }

    pub fn has_host_patterns(&self) -> bool {
        self.read().hosts
    }

    /// Registered patterns, sorted.
    pub fn patterns(&self) -> Vec<String> {
        let mut patterns: Vec<String> = self.read().entries.keys().cloned().collect();
        patterns.sort();
        patterns
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Routes are only changed by `handle_shared`, which validates before it
    // mutates, so a poisoned lock still guards a consistent table.
    fn read(&self) -> RwLockReadGuard<'_, Routes> {
        self.routes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Routes> {
        self.routes.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ServeMux {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServeMux")
            .field("patterns", &self.patterns())
            .finish()
    }
}

/// Registers `handler` for `pattern` on the default table.
pub fn handle<H: Handler>(pattern: &str, handler: H) -> Result<(), MuxError> {
    ServeMux::global().handle(pattern, handler)
}

/// Registers a function or closure for `pattern` on the default table.
pub fn handle_func<F>(pattern: &str, f: F) -> Result<(), MuxError>
where
    F: Fn(&mut ResponseWriter, &Request) + Send + Sync + 'static,
{
    ServeMux::global().handle_func(pattern, f)
}

fn is_host_qualified(pattern: &str) -> bool {
    !pattern.starts_with('/')
}

fn validate_pattern(pattern: &str) -> Result<(), MuxError> {
    if pattern.is_empty() {
        return Err(MuxError::InvalidRegistration(pattern.to_string()));
    }

    // "example.com" alone names no path; "example.com/" is the host root.
    if is_host_qualified(pattern) && !pattern.contains('/') {
        return Err(MuxError::InvalidRegistration(pattern.to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_w: &mut ResponseWriter, _req: &Request) {}

    #[test]
    fn prefixes_stay_sorted_longest_first() {
        let mux = ServeMux::new();
        mux.handle_func("/a/", noop).unwrap();
        mux.handle_func("/a/b/c/", noop).unwrap();
        mux.handle_func("/a/b/", noop).unwrap();

        let routes = mux.read();
        let order: Vec<&str> = routes.prefixes.iter().map(|e| e.pattern()).collect();
        assert_eq!(order, vec!["/a/b/c/", "/a/b/", "/a/"]);
    }

    #[test]
    fn host_flag_tracks_host_patterns() {
        let mux = ServeMux::new();
        mux.handle_func("/x", noop).unwrap();
        assert!(!mux.has_host_patterns());

        mux.handle_func("example.com/", noop).unwrap();
        assert!(mux.has_host_patterns());
    }
}
