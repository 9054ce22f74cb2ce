use std::io::Write;

use muxline::config::Config;
use muxline::http::mux;
use muxline::http::request::Request;
use muxline::http::response::StatusCode;
use muxline::http::writer::ResponseWriter;
use muxline::server::Server;

const INDEX_HTML: &str = "<html>
<head>
  <style>body { background: black; }</style>
</head>
<body>
  <div>Hi</div>
</body>
</html>";

fn index(w: &mut ResponseWriter, _req: &Request) {
    w.set_header("Content-Type", "text/html; charset=utf-8");
    w.set_header("Set-Cookie", "myCookie=nice; path=/; HttpOnly");
    w.write_header(StatusCode::OK);
    if let Err(e) = w.write_all(INDEX_HTML.as_bytes()) {
        tracing::error!(error = %e, "Failed to write index page");
    }
}

fn status(w: &mut ResponseWriter, _req: &Request) {
    w.set_header("Content-Type", "text/plain; charset=utf-8");
    w.write_header(StatusCode::OK);
    if let Err(e) = w.write_all(b"ok") {
        tracing::error!(error = %e, "Failed to write status");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;

    mux::handle_func("/", index)?;
    mux::handle_func("/status", status)?;

    let server = Server::from_config(&cfg);

    tokio::select! {
        res = server.listen_and_serve() => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
