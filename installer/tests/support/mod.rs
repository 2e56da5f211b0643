//! Test support utilities for installer integration tests.
//!
//! Provides a loopback HTTP server that answers every connection with a
//! canned response and records the raw request text, plus helpers for
//! building fetchers that talk to it directly.

use pantry_installer::fetch::HttpFetcher;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

const PROXY_VARS: [&str; 6] = [
    "HTTP_PROXY",
    "http_proxy",
    "HTTPS_PROXY",
    "https_proxy",
    "ALL_PROXY",
    "all_proxy",
];

/// Format a complete HTTP/1.1 response with a body and `Connection: close`.
pub fn http_response(status_line: &str, body: &[u8]) -> Vec<u8> {
    let mut response = format!(
        "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n",
        body.len()
    )
    .into_bytes();
    response.extend_from_slice(body);
    response
}

/// A loopback server serving one canned response to every request.
pub struct CannedServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl CannedServer {
    /// Start serving `response` on an ephemeral loopback port.
    pub fn start(response: Vec<u8>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback listener");
        let addr = listener.local_addr().expect("listener address");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                answer(stream, &response, &recorded);
            }
        });
        Self { addr, requests }
    }

    /// Absolute URL for `path` on this server.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Raw request heads received so far, lower-cased.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("request log").clone()
    }
}

fn answer(stream: TcpStream, response: &[u8], recorded: &Mutex<Vec<String>>) {
    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
    let mut head = String::new();
    loop {
        let mut line = String::new();
        let read = reader.read_line(&mut line).unwrap_or(0);
        if read == 0 || line == "\r\n" {
            break;
        }
        head.push_str(&line);
    }
    recorded
        .lock()
        .expect("request log")
        .push(head.to_ascii_lowercase());
    let mut stream = stream;
    let _ = stream.write_all(response);
    let _ = stream.flush();
}

/// Build a fetcher that ignores proxy settings from the environment so it
/// reaches the loopback server directly.
pub fn loopback_fetcher() -> HttpFetcher {
    temp_env::with_vars_unset(PROXY_VARS, || HttpFetcher::new(Duration::from_secs(10)))
}
