//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use api_gateway::{Gateway, GatewayConfig, RunningGateway};
use tempfile::NamedTempFile;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Parsed head of a request received by a mock backend.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
}

impl SeenRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

async fn read_head(socket: &mut TcpStream) -> Option<SeenRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let head = String::from_utf8_lossy(&buf).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split(' ');
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();
    let headers = lines
        .take_while(|l| !l.is_empty())
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    Some(SeenRequest {
        method,
        target,
        headers,
    })
}

async fn respond(socket: &mut TcpStream, status: u16, body: &str) {
    let reason = match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Start a mock backend that answers every request through `f`.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(SeenRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                if let Some(seen) = read_head(&mut socket).await {
                    let (status, body) = f(seen).await;
                    respond(&mut socket, status, &body).await;
                }
            });
        }
    });

    addr
}

/// Backend answering `<target>|<host>` for every request.
pub async fn start_echo_backend() -> SocketAddr {
    start_programmable_backend(|seen| async move {
        let host = seen.header("host").unwrap_or("-").to_string();
        (200, format!("{}|{}", seen.target, host))
    })
    .await
}

/// Backend that sleeps before answering.
pub async fn start_slow_backend(delay: Duration) -> SocketAddr {
    start_programmable_backend(move |_| async move {
        tokio::time::sleep(delay).await;
        (200, "slow".to_string())
    })
    .await
}

pub fn definitions_file(definitions: serde_json::Value) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(file, "{}", definitions).unwrap();
    file
}

/// A service definition proxying `listen_path` to `targets`.
pub fn service(
    name: &str,
    listen_path: &str,
    targets: &[String],
    strip_path: bool,
    plugins: serde_json::Value,
) -> serde_json::Value {
    serde_json::json!({
        "Name": name,
        "Active": true,
        "Proxy": {
            "listen_path": listen_path,
            "upstreams": {"strategy": "rr", "targets": targets},
            "strip_path": strip_path
        },
        "Plugins": plugins
    })
}

pub fn test_config() -> GatewayConfig {
    GatewayConfig {
        host: "127.0.0.1".into(),
        port: 0,
        grace_timeout: 2,
        ..GatewayConfig::default()
    }
}

/// Start a gateway on an ephemeral port serving `definitions`.
///
/// The returned file must outlive the gateway start.
pub async fn start_gateway(
    config: GatewayConfig,
    definitions: serde_json::Value,
) -> (RunningGateway, NamedTempFile) {
    let file = definitions_file(definitions);
    let gateway = Gateway::new(config, file.path())
        .with_post_shutdown_delay(Duration::ZERO)
        .start()
        .await
        .unwrap();
    (gateway, file)
}

pub fn url(gateway: &RunningGateway, path: &str) -> String {
    format!("http://{}{}", gateway.local_addr(), path)
}
