//! End-to-end tests: gateway over HTTP against a programmable backend.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use breaker_gateway::config::GatewayConfig;
use breaker_gateway::lifecycle::startup;
use breaker_gateway::store::{flag_key, FlagStore, MemoryFlagStore};
use serde_json::Value;

mod common;

const REJECTED_BY: &str = "x-circuit-rejected-by";

fn addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

/// Point the config at a Redis port that refuses connections.
fn unreachable_store(config: &mut GatewayConfig) -> Arc<dyn FlagStore> {
    config.shared_store.url = "redis://127.0.0.1:1".into();
    config.shared_store.io_timeout_ms = 200;
    startup::build_flag_store(config).unwrap()
}

#[tokio::test]
async fn test_healthy_call_passes_through() {
    let backend = addr(29101);
    let gateway = addr(29102);
    let served = common::start_programmable_backend(backend, || async {
        (200, "Hello from Service B".to_string())
    })
    .await;

    let store = Arc::new(MemoryFlagStore::new());
    let shutdown = common::start_gateway(common::gateway_config(gateway, backend), store).await;
    let client = common::client();

    let res = client
        .get(format!("http://{}/call/ServiceB", gateway))
        .send()
        .await
        .expect("Gateway unreachable");
    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "Hello from Service B");

    let legacy = client
        .get(format!("http://{}/call-service-b", gateway))
        .send()
        .await
        .unwrap();
    assert_eq!(legacy.status(), 200);
    assert_eq!(served.load(Ordering::SeqCst), 2);

    let unknown = client
        .get(format!("http://{}/call/ServiceZ", gateway))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), 404);

    let health = client.get(format!("http://{}/health", gateway)).send().await.unwrap();
    assert_eq!(health.text().await.unwrap(), "ok");

    shutdown.trigger();
}

#[tokio::test]
async fn test_failures_trip_breaker_and_publish_flag() {
    let backend = addr(29111);
    let gateway = addr(29112);
    let served = common::start_programmable_backend(backend, || async {
        (500, "Service B Error".to_string())
    })
    .await;

    let store = Arc::new(MemoryFlagStore::new());
    let shutdown =
        common::start_gateway(common::gateway_config(gateway, backend), store.clone()).await;
    let client = common::client();
    let url = format!("http://{}/call/ServiceB", gateway);

    for _ in 0..3 {
        let res = client.get(&url).send().await.unwrap();
        assert_eq!(res.status(), 503);
        assert!(!res.headers().contains_key(REJECTED_BY));
        assert_eq!(res.text().await.unwrap(), "ServiceB is unavailable");
    }
    assert_eq!(store.get(&flag_key("ServiceB")).await.unwrap(), Some(true));

    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), 503);
    assert_eq!(res.headers()[REJECTED_BY], "shared");
    assert_eq!(res.text().await.unwrap(), "ServiceB is unavailable (circuit open)");
    assert_eq!(served.load(Ordering::SeqCst), 3, "Open circuit must not call the backend");

    shutdown.trigger();
}

#[tokio::test]
async fn test_instances_share_open_flag() {
    let backend = addr(29121);
    let gateway_a = addr(29122);
    let gateway_b = addr(29123);
    let served = common::start_programmable_backend(backend, || async {
        (500, "Service B Error".to_string())
    })
    .await;

    let store: Arc<dyn FlagStore> = Arc::new(MemoryFlagStore::new());
    let shutdown_a =
        common::start_gateway(common::gateway_config(gateway_a, backend), store.clone()).await;
    let shutdown_b =
        common::start_gateway(common::gateway_config(gateway_b, backend), store.clone()).await;
    let client = common::client();

    for _ in 0..3 {
        let res = client
            .get(format!("http://{}/call/ServiceB", gateway_a))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 503);
    }

    // B has never seen a failure but honours A's flag.
    let res = client
        .get(format!("http://{}/call/ServiceB", gateway_b))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 503);
    assert_eq!(res.headers()[REJECTED_BY], "shared");
    assert_eq!(served.load(Ordering::SeqCst), 3);

    shutdown_a.trigger();
    shutdown_b.trigger();
}

#[tokio::test]
async fn test_unreachable_store_falls_back_to_local_breaker() {
    let backend = addr(29131);
    let gateway = addr(29132);
    let healthy = Arc::new(AtomicBool::new(true));
    let flag = healthy.clone();
    let served = common::start_programmable_backend(backend, move || {
        let flag = flag.clone();
        async move {
            if flag.load(Ordering::SeqCst) {
                (200, "Hello from Service B".to_string())
            } else {
                (500, "Service B Error".to_string())
            }
        }
    })
    .await;

    let mut config = common::gateway_config(gateway, backend);
    let store = unreachable_store(&mut config);
    let shutdown = common::start_gateway(config, store).await;
    let client = common::client();
    let url = format!("http://{}/call/ServiceB", gateway);

    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), 200, "Store outage must not block traffic");

    // S, F, F reaches 2/3 failures at the minimum volume.
    healthy.store(false, Ordering::SeqCst);
    for _ in 0..2 {
        let res = client.get(&url).send().await.unwrap();
        assert_eq!(res.status(), 503);
        assert!(!res.headers().contains_key(REJECTED_BY));
    }

    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), 503);
    assert_eq!(res.headers()[REJECTED_BY], "local");
    assert_eq!(served.load(Ordering::SeqCst), 3);

    shutdown.trigger();
}

#[tokio::test]
async fn test_probe_recovery_clears_flag() {
    let backend = addr(29141);
    let gateway = addr(29142);
    let healthy = Arc::new(AtomicBool::new(false));
    let flag = healthy.clone();
    common::start_programmable_backend(backend, move || {
        let flag = flag.clone();
        async move {
            if flag.load(Ordering::SeqCst) {
                (200, "Hello from Service B".to_string())
            } else {
                (500, "Service B Error".to_string())
            }
        }
    })
    .await;

    let mut config = common::gateway_config(gateway, backend);
    config.breaker.open_cooldown_secs = 1;
    config.breaker.half_open_max_probes = 1;
    config.shared_store.lease_secs = 1;
    let store = Arc::new(MemoryFlagStore::new());
    let shutdown = common::start_gateway(config, store.clone()).await;
    let client = common::client();
    let url = format!("http://{}/call/ServiceB", gateway);

    for _ in 0..3 {
        client.get(&url).send().await.unwrap();
    }
    assert_eq!(store.get(&flag_key("ServiceB")).await.unwrap(), Some(true));

    healthy.store(true, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(1200)).await;

    // Lease has lapsed and the cooldown has elapsed: one probe is admitted.
    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(store.get(&flag_key("ServiceB")).await.unwrap(), Some(false));

    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), 200);

    shutdown.trigger();
}

#[tokio::test]
async fn test_admin_breakers_requires_key() {
    let backend = addr(29151);
    let gateway = addr(29152);
    common::start_programmable_backend(backend, || async {
        (200, "Hello from Service B".to_string())
    })
    .await;

    let mut config = common::gateway_config(gateway, backend);
    config.admin.enabled = true;
    config.admin.api_key = "test-key".into();
    let shutdown = common::start_gateway(config, Arc::new(MemoryFlagStore::new())).await;
    let client = common::client();
    let url = format!("http://{}/admin/breakers", gateway);

    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), 401);

    let res = client
        .get(&url)
        .bearer_auth("wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);

    let res = client.get(&url).bearer_auth("test-key").send().await.unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body[0]["name"], "ServiceB");
    assert_eq!(body[0]["breaker"]["state"], "closed");
    assert_eq!(body[0]["shared_flag"]["known"], false);

    let res = client
        .get(format!("http://{}/admin/status", gateway))
        .bearer_auth("test-key")
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["dependencies"], 1);

    shutdown.trigger();
}

#[tokio::test]
async fn test_timeouts_trip_breaker_across_window_rollovers() {
    let backend = addr(29161);
    let gateway = addr(29162);
    let served = common::start_programmable_backend(backend, || async {
        tokio::time::sleep(Duration::from_secs(3)).await;
        (200, "too late".to_string())
    })
    .await;

    // Every attempt outlives its one-second window.
    let mut config = common::gateway_config(gateway, backend);
    config.downstream.request_timeout_ms = 1000;
    config.breaker.window_interval_secs = 1;
    let store = unreachable_store(&mut config);
    let shutdown = common::start_gateway(config, store).await;
    let client = common::client();
    let url = format!("http://{}/call/ServiceB", gateway);

    for _ in 0..3 {
        let res = client.get(&url).send().await.unwrap();
        assert_eq!(res.status(), 503);
        assert!(!res.headers().contains_key(REJECTED_BY));
        assert_eq!(res.text().await.unwrap(), "ServiceB is unavailable");
    }

    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), 503);
    assert_eq!(res.headers()[REJECTED_BY], "local");
    assert_eq!(served.load(Ordering::SeqCst), 3);

    shutdown.trigger();
}

#[tokio::test]
async fn test_refused_connections_trip_breaker() {
    // Nothing listens on the backend port.
    let backend = addr(29171);
    let gateway = addr(29172);

    let mut config = common::gateway_config(gateway, backend);
    let store = unreachable_store(&mut config);
    let shutdown = common::start_gateway(config, store).await;
    let client = common::client();
    let url = format!("http://{}/call/ServiceB", gateway);

    for _ in 0..3 {
        let res = client.get(&url).send().await.unwrap();
        assert_eq!(res.status(), 503);
        assert_eq!(res.text().await.unwrap(), "ServiceB is unavailable");
    }

    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), 503);
    assert_eq!(res.headers()[REJECTED_BY], "local");

    shutdown.trigger();
}

#[tokio::test]
async fn test_oversized_healthy_body_does_not_trip() {
    let backend = addr(29181);
    let gateway = addr(29182);
    let served = common::start_programmable_backend(backend, || async {
        (200, "x".repeat(4096))
    })
    .await;

    let mut config = common::gateway_config(gateway, backend);
    config.downstream.max_body_bytes = 1024;
    let store = Arc::new(MemoryFlagStore::new());
    let shutdown = common::start_gateway(config, store.clone()).await;
    let client = common::client();
    let url = format!("http://{}/call/ServiceB", gateway);

    for _ in 0..4 {
        let res = client.get(&url).send().await.unwrap();
        assert_eq!(res.status(), 502);
        assert!(!res.headers().contains_key(REJECTED_BY));
    }
    assert_eq!(served.load(Ordering::SeqCst), 4);
    assert_eq!(store.get(&flag_key("ServiceB")).await.unwrap(), None);

    shutdown.trigger();
}
