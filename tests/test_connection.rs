use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use muxline::http::connection::{Connection, ConnectionState};
use muxline::http::mux::ServeMux;
use muxline::http::parser::LineReaderPool;
use muxline::http::request::Request;
use muxline::http::response::StatusCode;
use muxline::http::writer::ResponseWriter;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

fn test_mux() -> Arc<ServeMux> {
    let mux = ServeMux::new();
    mux.handle_func("/status", |w: &mut ResponseWriter, _req: &Request| {
        w.write_header(StatusCode::OK);
        let _ = w.write_all(b"ok");
    })
    .unwrap();
    mux.handle_func("/echo/", |w: &mut ResponseWriter, req: &Request| {
        let _ = write!(w, "{} {} {}", req.method, req.target, req.version);
    })
    .unwrap();
    mux.handle_func("/panic", |w: &mut ResponseWriter, _req: &Request| {
        let _ = w.write_all(b"partial output");
        panic!("handler blew up");
    })
    .unwrap();
    mux.handle_func("127.0.0.1/local", |w: &mut ResponseWriter, _req: &Request| {
        let _ = w.write_all(b"local host route");
    })
    .unwrap();
    mux.handle_func("example.com/", |w: &mut ResponseWriter, _req: &Request| {
        let _ = w.write_all(b"example.com route");
    })
    .unwrap();
    Arc::new(mux)
}

async fn exchange(
    mux: Arc<ServeMux>,
    local: Option<SocketAddr>,
    input: &[u8],
) -> (anyhow::Result<()>, Vec<u8>) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let conn = Connection::new(server, mux, Arc::new(LineReaderPool::new()))
        .with_addrs(None, local);
    assert!(matches!(conn.state(), ConnectionState::Accepted));

    let task = tokio::spawn(conn.run());

    let (mut rd, mut wr) = tokio::io::split(client);
    wr.write_all(input).await.unwrap();
    wr.shutdown().await.unwrap();

    let mut out = Vec::new();
    rd.read_to_end(&mut out).await.unwrap();

    (task.await.unwrap(), out)
}

fn body_of(response: &[u8]) -> &[u8] {
    let idx = response
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("header terminator");
    &response[idx + 4..]
}

#[tokio::test]
async fn test_routed_request_gets_handler_response() {
    let (result, out) = exchange(
        test_mux(),
        None,
        b"GET /status HTTP/1.1\r\nHost: test\r\n\r\n",
    )
    .await;

    assert!(result.is_ok());
    assert!(out.starts_with(b"HTTP/1.1 200 OK\r\n"));
    assert_eq!(body_of(&out), b"ok");
}

#[tokio::test]
async fn test_handler_sees_parsed_request() {
    let (_, out) = exchange(test_mux(), None, b"PATCH /echo/x?y=1 HTTP/1.0\r\n\r\n").await;

    assert!(out.starts_with(b"HTTP/1.0 200 OK\r\n"));
    assert_eq!(body_of(&out), b"PATCH /echo/x?y=1 HTTP/1.0");
}

#[tokio::test]
async fn test_zero_bytes_closes_without_response() {
    let (result, out) = exchange(test_mux(), None, b"").await;

    assert!(result.is_ok());
    assert!(out.is_empty());
}

#[tokio::test]
async fn test_malformed_request_line_gets_400() {
    let (result, out) = exchange(test_mux(), None, b"BROKEN\r\n\r\n").await;

    assert!(result.is_ok());
    assert!(out.starts_with(b"HTTP/1.1 400 Bad Request\r\n"));
    assert_eq!(body_of(&out), b"400 Bad Request");
}

#[tokio::test]
async fn test_bad_version_gets_400() {
    let (_, out) = exchange(test_mux(), None, b"GET /status HTTP/one.one\r\n\r\n").await;

    assert!(out.starts_with(b"HTTP/1.1 400 "));
}

#[tokio::test]
async fn test_unrouted_request_gets_404() {
    let (result, out) = exchange(test_mux(), None, b"GET /missing HTTP/1.1\r\n\r\n").await;

    assert!(result.is_ok());
    assert!(out.starts_with(b"HTTP/1.1 404 Not Found\r\n"));
}

#[tokio::test]
async fn test_panicking_handler_gets_500_and_no_partial_output() {
    let (result, out) = exchange(test_mux(), None, b"GET /panic HTTP/1.1\r\n\r\n").await;

    assert!(result.is_ok());
    assert!(out.starts_with(b"HTTP/1.1 500 Internal Server Error\r\n"));
    assert!(!String::from_utf8_lossy(&out).contains("partial output"));
}

#[tokio::test]
async fn test_host_route_uses_local_address() {
    let local: SocketAddr = "127.0.0.1:8080".parse().unwrap();

    let (_, out) = exchange(test_mux(), Some(local), b"GET /local HTTP/1.1\r\n\r\n").await;
    assert_eq!(body_of(&out), b"local host route");

    let (_, out) = exchange(test_mux(), None, b"GET /local HTTP/1.1\r\n\r\n").await;
    assert!(out.starts_with(b"HTTP/1.1 404 "));
}

#[tokio::test]
async fn test_host_route_uses_absolute_form_target() {
    let (_, out) = exchange(
        test_mux(),
        None,
        b"GET http://EXAMPLE.com/anything HTTP/1.1\r\n\r\n",
    )
    .await;

    assert_eq!(body_of(&out), b"example.com route");
}

#[tokio::test]
async fn test_host_route_uses_bracketed_ipv6_local_address() {
    let mux = ServeMux::new();
    mux.handle_func("[::1]/", |w: &mut ResponseWriter, _req: &Request| {
        let _ = w.write_all(b"ipv6 loopback route");
    })
    .unwrap();
    let mux = Arc::new(mux);
    let local: SocketAddr = "[::1]:80".parse().unwrap();

    let (_, out) = exchange(mux.clone(), Some(local), b"GET /x HTTP/1.1\r\n\r\n").await;
    assert!(out.starts_with(b"HTTP/1.1 200 OK\r\n"));
    assert_eq!(body_of(&out), b"ipv6 loopback route");

    let (_, out) = exchange(mux, None, b"GET http://[::1]/x HTTP/1.1\r\n\r\n").await;
    assert!(out.starts_with(b"HTTP/1.1 200 OK\r\n"));
    assert_eq!(body_of(&out), b"ipv6 loopback route");
}

#[tokio::test]
async fn test_unread_headers_are_drained_while_client_stays_open() {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let conn = Connection::new(server, test_mux(), Arc::new(LineReaderPool::new()));
    let task = tokio::spawn(conn.run());

    let (mut rd, mut wr) = tokio::io::split(client);
    wr.write_all(b"GET /status HTTP/1.1\r\nHost: x\r\nAccept: */*\r\n\r\n")
        .await
        .unwrap();

    // The write half stays open: the connection must give up draining on
    // its own rather than wait for our EOF.
    let mut out = Vec::new();
    rd.read_to_end(&mut out).await.unwrap();

    assert!(out.starts_with(b"HTTP/1.1 200 OK\r\n"));
    assert_eq!(body_of(&out), b"ok");

    let finished = tokio::time::timeout(Duration::from_secs(2), task).await;
    assert!(matches!(finished, Ok(Ok(Ok(())))));
    drop(wr);
}
