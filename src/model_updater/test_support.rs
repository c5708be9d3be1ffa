// Test doubles: a minimal HTTP responder for the reqwest-backed adapters
// and in-memory catalog/fetcher fakes for the engine.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use super::catalog::{parse_catalog_document, CatalogSource};
use super::model_downloader::{ArtifactFetcher, FetchOutcome};
use super::types::ArtifactDescriptor;
use crate::error::{Result, SyncError};

/// Serves `body` with `status` to every connection; returns the base URL.
pub(crate) async fn serve(status: &'static str, body: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let body = body.clone();
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let head = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    status,
                    body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&body).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    format!("http://{}", addr)
}

/// Accepts connections and reads the request, then stalls. With a `prefix`
/// the status line, headers and those body bytes go out first, announcing
/// a longer body than is ever sent.
pub(crate) async fn serve_stalled(prefix: Option<Vec<u8>>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let prefix = prefix.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                if let Some(prefix) = prefix {
                    let head = format!(
                        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n",
                        prefix.len() * 4
                    );
                    let _ = socket.write_all(head.as_bytes()).await;
                    let _ = socket.write_all(&prefix).await;
                    let _ = socket.flush().await;
                }
                // Keep the socket open without answering
                std::future::pending::<()>().await;
                drop(socket);
            });
        }
    });
    format!("http://{}", addr)
}

/// In-memory catalog. `None` entries make every fetch fail.
pub(crate) struct FakeCatalog {
    entries: Mutex<Option<Vec<ArtifactDescriptor>>>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeCatalog {
    pub(crate) fn new(records: Value) -> Self {
        Self {
            entries: Mutex::new(Some(parse_catalog_document("fake://catalog", records).unwrap())),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub(crate) fn unreachable() -> Self {
        let catalog = Self::new(Value::Array(Vec::new()));
        *catalog.entries.lock().unwrap() = None;
        catalog
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogSource for FakeCatalog {
    async fn fetch_catalog(&self) -> Result<Vec<ArtifactDescriptor>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.entries
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| SyncError::catalog("fake://catalog", "connection refused"))
    }
}

/// Writes the URL as file content; fails for the configured file stems.
pub(crate) struct FakeFetcher {
    requests: Mutex<Vec<String>>,
    failing: HashSet<String>,
}

impl FakeFetcher {
    pub(crate) fn new() -> Self {
        Self::failing_on(&[])
    }

    pub(crate) fn failing_on(names: &[&str]) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            failing: names.iter().map(|name| name.to_string()).collect(),
        }
    }

    /// File names passed to `fetch`, in call order.
    pub(crate) fn requested(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactFetcher for FakeFetcher {
    async fn fetch(
        &self,
        destination_dir: &Path,
        url: &str,
        file_name: &str,
        _expected_size_bytes: u64,
    ) -> Result<FetchOutcome> {
        self.requests.lock().unwrap().push(file_name.to_string());
        let target = destination_dir.join(file_name);
        if target.exists() {
            return Ok(FetchOutcome::AlreadyPresent(target));
        }
        let stem = file_name.split('.').next().unwrap_or(file_name);
        if self.failing.contains(stem) {
            return Err(SyncError::artifact_fetch(stem, "HTTP Status 404 Not Found"));
        }
        std::fs::create_dir_all(destination_dir).unwrap();
        std::fs::write(&target, url.as_bytes()).unwrap();
        Ok(FetchOutcome::Downloaded {
            path: target,
            size_bytes: url.len() as u64,
        })
    }
}
