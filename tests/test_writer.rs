use std::io::Write;

use muxline::http::request::Version;
use muxline::http::response::{Response, StatusCode};
use muxline::http::writer::{response_version, ResponseWriter};

fn split_response(bytes: &[u8]) -> (String, Vec<u8>) {
    let idx = bytes
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("header terminator");
    let head = String::from_utf8(bytes[..idx].to_vec()).unwrap();
    (head, bytes[idx + 4..].to_vec())
}

#[test]
fn test_writer_defaults_to_200() {
    let w = ResponseWriter::new();
    let (head, body) = split_response(&w.finish(Version::HTTP_11));

    assert!(head.starts_with("HTTP/1.1 200 OK"));
    assert!(head.contains("Content-Length: 0"));
    assert!(body.is_empty());
}

#[test]
fn test_writer_status_and_body() {
    let mut w = ResponseWriter::new();
    w.set_header("Content-Type", "text/plain");
    w.write_header(StatusCode::NOT_FOUND);
    w.write_all(b"nothing here").unwrap();

    let (head, body) = split_response(&w.finish(Version::HTTP_11));

    assert!(head.starts_with("HTTP/1.1 404 Not Found\r\n"));
    assert!(head.contains("Content-Type: text/plain"));
    assert!(head.contains("Content-Length: 12"));
    assert!(head.contains("Connection: close"));
    assert_eq!(body, b"nothing here");
}

#[test]
fn test_writer_header_is_sent_once() {
    let mut w = ResponseWriter::new();
    w.write_header(StatusCode::CREATED);
    w.write_all(b"one ").unwrap();
    w.write_header(StatusCode::INTERNAL_SERVER_ERROR);
    w.write_all(b"two").unwrap();

    let bytes = w.finish(Version::HTTP_11);
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    assert_eq!(text.matches("HTTP/1.1").count(), 1);
    assert!(text.starts_with("HTTP/1.1 201 Created"));
    assert!(text.ends_with("\r\n\r\none two"));
}

#[test]
fn test_writer_headers_frozen_after_first_write() {
    let mut w = ResponseWriter::new();
    w.set_header("X-Early", "yes");
    write!(w, "body").unwrap();
    w.set_header("X-Late", "no");

    assert_eq!(w.header("X-Early"), Some("yes"));
    assert_eq!(w.header("X-Late"), None);
}

#[test]
fn test_writer_flush_commits_header() {
    let mut w = ResponseWriter::new();
    assert!(!w.is_committed());

    w.flush().unwrap();

    assert!(w.is_committed());
    assert_eq!(w.status(), Some(StatusCode::OK));
}

#[test]
fn test_writer_reports_write_count() {
    let mut w = ResponseWriter::new();

    assert_eq!(w.write(b"abc").unwrap(), 3);
    assert_eq!(w.write(b"").unwrap(), 0);
    assert_eq!(w.body_len(), 3);
}

#[test]
fn test_writer_send_prepared_response() {
    let mut w = ResponseWriter::new();
    w.send(Response::ok("ready")).unwrap();

    let (head, body) = split_response(&w.finish(Version::HTTP_11));

    assert!(head.starts_with("HTTP/1.1 200 OK"));
    assert!(head.contains("Content-Type: text/plain; charset=utf-8"));
    assert_eq!(body, b"ready");
}

#[test]
fn test_writer_handler_set_connection_header_is_kept() {
    let mut w = ResponseWriter::new();
    w.set_header("Connection", "close");
    w.write_all(b"x").unwrap();

    let text = String::from_utf8(w.finish(Version::HTTP_11).to_vec()).unwrap();

    assert_eq!(text.matches("Connection:").count(), 1);
}

#[test]
fn test_response_version_selection() {
    assert_eq!(response_version(Version::HTTP_10), Version::HTTP_10);
    assert_eq!(response_version(Version::HTTP_11), Version::HTTP_11);
    assert_eq!(response_version(Version::HTTP_09), Version::HTTP_11);
    assert_eq!(response_version(Version::new(2, 0)), Version::HTTP_11);
}
