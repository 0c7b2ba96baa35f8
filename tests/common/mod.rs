// Minimal HTTP/1.1 stub shared by the REST-facing integration tests.

#![allow(dead_code)]

use serde_json::Value;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    /// Path including the query string.
    pub target: String,
    pub request_line: String,
    pub body: String,
}

impl Request {
    pub fn path(&self) -> &str {
        self.target.split('?').next().unwrap_or_default()
    }
}

/// Reads one request: headers up to the blank line, then `content-length` bytes.
pub async fn read_request(socket: &mut TcpStream) -> Request {
    let mut raw = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client hung up before sending headers");
        raw.extend_from_slice(&chunk[..n]);
        if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&raw[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    while raw.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client hung up mid-body");
        raw.extend_from_slice(&chunk[..n]);
    }

    let request_line = head.lines().next().unwrap_or_default().to_string();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default().to_string();

    Request {
        method,
        target,
        request_line,
        body: String::from_utf8_lossy(&raw[header_end..header_end + content_length]).to_string(),
    }
}

/// Writes a JSON response and closes the connection.
pub async fn respond(socket: &mut TcpStream, status: &str, body: &Value) {
    let payload = body.to_string();
    let response = format!(
        "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        status,
        payload.len(),
        payload
    );
    socket.write_all(response.as_bytes()).await.unwrap();
    socket.shutdown().await.unwrap();
}
