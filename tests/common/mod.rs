//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crystal_proxy::config::ProxyConfig;
use crystal_proxy::http::{Framing, MessageBuffer};
use crystal_proxy::net::{ConnectionRegistry, DrainTimeout, Listener};
use crystal_proxy::routing::Classifier;
use crystal_proxy::ProxyServer;

/// A TCP backend that echoes every byte it receives.
#[derive(Clone)]
pub struct EchoBackend {
    pub addr: SocketAddr,
    pub accepted: Arc<AtomicUsize>,
    pub received: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
}

impl EchoBackend {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let backend = Self {
            addr: listener.local_addr().unwrap(),
            accepted: Arc::new(AtomicUsize::new(0)),
            received: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
        };

        let counters = backend.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counters.accepted.fetch_add(1, Ordering::SeqCst);
                let counters = counters.clone();
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    loop {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => break,
                            Ok(n) => {
                                counters.received.fetch_add(n, Ordering::SeqCst);
                                if socket.write_all(&buf[..n]).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    counters.closed.fetch_add(1, Ordering::SeqCst);
                });
            }
        });

        backend
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> usize {
        self.received.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

/// An HTTP backend that answers `200 OK` with the request body as its body.
pub async fn start_http_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = MessageBuffer::new(1 << 20);
                let mut chunk = [0u8; 4096];
                while !matches!(request.framing(), Ok(Framing::Complete { .. })) {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => {
                            if request.extend(&chunk[..n]).is_err() {
                                return;
                            }
                        }
                    }
                }

                let body = request.body();
                let mut response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                )
                .into_bytes();
                response.extend_from_slice(body);
                let _ = socket.write_all(&response).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// An address nothing listens on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn test_config(login: SocketAddr, game: SocketAddr, http: SocketAddr) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.backends.login = login.to_string();
    config.backends.game = game.to_string();
    config.backends.http = http.to_string();
    config.timeouts.connect_ms = 1000;
    config.timeouts.shutdown_drain_secs = 5;
    config
}

/// A proxy running on an ephemeral port.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub registry: Arc<ConnectionRegistry>,
    pub shutdown: CancellationToken,
    pub handle: JoinHandle<Result<(), DrainTimeout>>,
}

impl TestProxy {
    pub async fn start(config: ProxyConfig) -> Self {
        Self::launch(ProxyServer::new(&config), &config).await
    }

    pub async fn start_with_classifier(config: ProxyConfig, classifier: Arc<dyn Classifier>) -> Self {
        Self::launch(ProxyServer::with_classifier(&config, classifier), &config).await
    }

    async fn launch(server: ProxyServer, config: &ProxyConfig) -> Self {
        let listener = Listener::bind(&config.listener).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let registry = server.registry();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(server.run(listener, shutdown.clone()));

        Self {
            addr,
            registry,
            shutdown,
            handle,
        }
    }

    pub async fn connect(&self) -> TcpStream {
        TcpStream::connect(self.addr).await.unwrap()
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Non-pooled client so every request opens a fresh connection.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .pool_max_idle_per_host(0)
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Read until EOF, treating a reset as EOF.
pub async fn read_until_closed(stream: &mut TcpStream) -> Vec<u8> {
    let mut out = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut out)).await;
    out
}
