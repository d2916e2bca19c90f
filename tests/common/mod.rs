//! Shared utilities for integration testing.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Start a simple mock upstream that returns a fixed response.
#[allow(dead_code)]
pub async fn start_mock_upstream(addr: SocketAddr, response: &'static str) {
    let listener = TcpListener::bind(addr).await.unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;
                        let response_str = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            response.len(),
                            response
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });
}

/// Start a programmable mock upstream with async support.
#[allow(dead_code)]
pub async fn start_programmable_upstream<F, Fut>(addr: SocketAddr, f: F)
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await.unwrap();
    let f = std::sync::Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;
                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });
}

/// Start an upstream that echoes the request line and body back, for
/// asserting the proxy preserves method and body semantics.
#[allow(dead_code)]
pub async fn start_echo_upstream(addr: SocketAddr) {
    let listener = TcpListener::bind(addr).await.unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut raw = Vec::new();
                        let mut buf = [0u8; 4096];
                        // Read until the headers are complete, then drain
                        // the body per Content-Length.
                        let body_start = loop {
                            match socket.read(&mut buf).await {
                                Ok(0) => return,
                                Ok(n) => {
                                    raw.extend_from_slice(&buf[..n]);
                                    if let Some(pos) =
                                        raw.windows(4).position(|w| w == b"\r\n\r\n")
                                    {
                                        break pos + 4;
                                    }
                                }
                                Err(_) => return,
                            }
                        };

                        let head = String::from_utf8_lossy(&raw[..body_start]).to_string();
                        let content_length = head
                            .lines()
                            .find(|l| l.to_ascii_lowercase().starts_with("content-length:"))
                            .and_then(|l| l.split(':').nth(1))
                            .and_then(|v| v.trim().parse::<usize>().ok())
                            .unwrap_or(0);

                        while raw.len() - body_start < content_length {
                            match socket.read(&mut buf).await {
                                Ok(0) => break,
                                Ok(n) => raw.extend_from_slice(&buf[..n]),
                                Err(_) => break,
                            }
                        }

                        let method = head.split_whitespace().next().unwrap_or("").to_string();
                        let body = String::from_utf8_lossy(&raw[body_start..]).to_string();
                        let echo = format!("{} {}", method, body);

                        let response_str = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            echo.len(),
                            echo
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });
}

/// Poll `predicate` until it holds or the timeout elapses.
#[allow(dead_code)]
pub async fn wait_until<F: Fn() -> bool>(timeout: Duration, predicate: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if predicate() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

/// A reqwest client that neither pools nor proxies, so each request
/// observes the listener's current state.
#[allow(dead_code)]
pub fn test_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
