//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use breaker_gateway::config::{DependencyConfig, GatewayConfig};
use breaker_gateway::gateway::{Downstream, HttpDownstream};
use breaker_gateway::http::HttpServer;
use breaker_gateway::lifecycle::{startup, Shutdown};
use breaker_gateway::store::FlagStore;

/// Start a programmable backend; `f` picks the status and body per request.
/// Returns a counter of requests served.
pub async fn start_programmable_backend<F, Fut>(addr: SocketAddr, f: F) -> Arc<AtomicU32>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await.unwrap();
    let f = Arc::new(f);
    let served = Arc::new(AtomicU32::new(0));
    let counter = served.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    let counter = counter.clone();
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;

                        counter.fetch_add(1, Ordering::SeqCst);
                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
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

    served
}

/// Gateway config protecting a single `ServiceB` at `backend`.
pub fn gateway_config(gateway: SocketAddr, backend: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = gateway.to_string();
    config.dependencies = vec![DependencyConfig {
        name: "ServiceB".into(),
        target: format!("http://{}/hello", backend),
        breaker: None,
    }];
    config.breaker.open_cooldown_secs = 30;
    config.breaker.window_interval_secs = 0;
    config
}

/// Run a gateway over `store` until the returned coordinator fires.
pub async fn start_gateway(config: GatewayConfig, store: Arc<dyn FlagStore>) -> Shutdown {
    let downstream: Arc<dyn Downstream> = Arc::new(HttpDownstream::new(&config.downstream));
    let gateway = startup::assemble_gateway(&config, store, downstream);
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let server = HttpServer::new(config, gateway);
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
