//! End-to-end tests: slog statements through the drain to a scripted intake endpoint.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use slog::{error, info, o, Drain, OwnedKVList, Record};
use slog_datadog::error::Error;
use slog_datadog::format::Formatter;
use slog_datadog::logger::Builder;

struct CapturedRequest {
    request_line: String,
    api_key: String,
    content_type: String,
    body: String,
}

fn read_request(stream: &mut TcpStream) -> CapturedRequest {
    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));

    let mut request_line = String::new();
    reader.read_line(&mut request_line).expect("read request line");

    let mut api_key = String::new();
    let mut content_type = String::new();
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).expect("read header");
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            match key.trim().to_lowercase().as_str() {
                "dd-api-key" => api_key = value.trim().to_string(),
                "content-type" => content_type = value.trim().to_string(),
                "content-length" => content_length = value.trim().parse().unwrap_or(0),
                _ => {}
            }
        }
    }

    let mut body = vec![0u8; content_length];
    if content_length > 0 {
        reader.read_exact(&mut body).expect("read body");
    }

    CapturedRequest {
        request_line: request_line.trim().to_string(),
        api_key,
        content_type,
        body: String::from_utf8_lossy(&body).to_string(),
    }
}

// Serves the given status codes to successive requests and hands every captured request back
// over the channel.
fn spawn_intake(statuses: Vec<(u16, &'static str)>) -> (SocketAddr, mpsc::Receiver<CapturedRequest>) {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral listener");
    let addr = listener.local_addr().expect("listener has address");
    let (tx, rx) = mpsc::channel();

    std::thread::spawn(move || {
        for (status, body) in statuses {
            let Ok((mut stream, _)) = listener.accept() else {
                break;
            };
            let captured = read_request(&mut stream);
            let response = format!(
                "HTTP/1.1 {} X\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes());
            let _ = tx.send(captured);
        }
    });

    (addr, rx)
}

// Keeps the drain's failures observable instead of panicking the logging thread.
struct CaptureErr<D: Drain> {
    drain: D,
    tx: mpsc::Sender<D::Err>,
}

impl<D: Drain> Drain for CaptureErr<D> {
    type Ok = ();
    type Err = slog::Never;

    fn log(&self, record: &Record, values: &OwnedKVList) -> Result<(), slog::Never> {
        if let Err(err) = self.drain.log(record, values) {
            let _ = self.tx.send(err);
        }
        Ok(())
    }

    fn is_enabled(&self, level: slog::Level) -> bool {
        self.drain.is_enabled(level)
    }
}

fn root_logger(addr: SocketAddr) -> (slog::Logger, mpsc::Receiver<Error>) {
    let datadog_drain = Builder::new("it-api-key")
        .base_url(format!("http://{}", addr))
        .service("webshop")
        .host("fe-1")
        .retry_delay(Duration::from_millis(25))
        .build()
        .expect("build failed");

    let (err_tx, err_rx) = mpsc::channel();
    let drain = slog_async::Async::new(CaptureErr {
        drain: datadog_drain,
        tx: err_tx,
    })
    .build()
    .fuse();

    (slog::Logger::root(drain, o!("application" => "it")), err_rx)
}

fn recv(rx: &mpsc::Receiver<CapturedRequest>) -> CapturedRequest {
    rx.recv_timeout(Duration::from_secs(5)).expect("expected a request")
}

#[test]
fn ships_log_statements_to_the_intake_endpoint() {
    let (addr, rx) = spawn_intake(vec![(202, "{}")]);
    let (log, err_rx) = root_logger(addr);

    info!(log, "user logged in"; "user" => "alice");

    let request = recv(&rx);
    assert_eq!(
        request.request_line,
        "POST /v1/input?service=webshop&ddsource=rust&host=fe-1 HTTP/1.1"
    );
    assert_eq!(request.api_key, "it-api-key");
    assert_eq!(request.content_type, "application/json");

    let json: serde_json::Value = serde_json::from_str(&request.body).expect("body is not JSON");
    assert_eq!(json["message"], "user logged in");
    assert_eq!(json["status"], "info");
    assert_eq!(json["user"], "alice");
    assert_eq!(json["application"], "it");

    assert!(err_rx.recv_timeout(Duration::from_millis(200)).is_err());
}

#[test]
fn surfaces_terminal_rejections_to_the_host() {
    let (addr, rx) = spawn_intake(vec![
        (500, "denied"),
        (500, "denied"),
        (500, "denied"),
        (500, "denied"),
    ]);
    let (log, err_rx) = root_logger(addr);

    error!(log, "disk full");

    for _ in 0..4 {
        recv(&rx);
    }
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());

    let err = err_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("expected a drain error");
    match err {
        Error::Rejected { status, body } => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(body, "denied");
        }
        other => panic!("expected Rejected, got: {other}"),
    }
}

struct BrokenFormatter;

impl Formatter for BrokenFormatter {
    fn format(&self, _record: &Record, _values: &OwnedKVList) -> Result<Vec<u8>, Error> {
        Err(Error::Format(slog::Error::Other))
    }
}

#[test]
fn formatting_failures_skip_delivery() {
    let (addr, rx) = spawn_intake(vec![(202, "")]);

    let datadog_drain = Builder::new("it-api-key")
        .base_url(format!("http://{}", addr))
        .formatter(BrokenFormatter)
        .build()
        .expect("build failed");

    let (err_tx, err_rx) = mpsc::channel();
    let drain = slog_async::Async::new(CaptureErr {
        drain: datadog_drain,
        tx: err_tx,
    })
    .build()
    .fuse();
    let log = slog::Logger::root(drain, o!());

    info!(log, "never serialized");

    let err = err_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("expected a drain error");
    assert!(matches!(err, Error::Format(_)), "got: {err}");
    // the record never went out
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
}
