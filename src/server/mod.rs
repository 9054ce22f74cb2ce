//! Server lifecycle.
//!
//! [`Server`] holds the bind address and the route table, and owns the
//! accept loop in [`listener`].

pub mod listener;

use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::Config;
use crate::http::mux::ServeMux;
use crate::http::parser::LineReaderPool;

#[derive(Debug, Clone)]
pub struct Server {
    addr: String,
    mux: Option<Arc<ServeMux>>,
    pool: Arc<LineReaderPool>,
}

impl Server {
    /// A server for `addr` dispatching through the default route table.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            mux: None,
            pool: Arc::new(LineReaderPool::new()),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.listen_addr.clone())
    }

    /// Dispatches through `mux` instead of the default route table.
    pub fn with_mux(mut self, mux: Arc<ServeMux>) -> Self {
        self.mux = Some(mux);
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// The route table requests are dispatched through.
    pub fn mux(&self) -> Arc<ServeMux> {
        match &self.mux {
            Some(mux) => Arc::clone(mux),
            None => ServeMux::global(),
        }
    }

    /// Serves connections from an already bound listener.
    ///
    /// Runs until accepting fails and returns that error.
    pub async fn serve(&self, listener: TcpListener) -> anyhow::Result<()> {
        let mux = self.mux();
        tracing::info!(routes = ?mux.patterns(), "Serving");
        listener::run(listener, mux, Arc::clone(&self.pool)).await
    }

    /// Binds the configured address and serves on it.
    pub async fn listen_and_serve(&self) -> anyhow::Result<()> {
        let listener = listener::bind(&self.addr).await?;
        self.serve(listener).await
    }
}
