//! Intake → dispatcher → backend, without the HTTP front end.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use lb_proxy::config::schema::TimeoutConfig;
use lb_proxy::dispatch::{intake_queue, DispatchError, Dispatcher, IntakeQueue};
use lb_proxy::load_balancer::pool::ServerPool;
use lb_proxy::load_balancer::Strategy;
use lb_proxy::metrics::{MemoryStore, MetricsRecorder, MetricsStore, StatsAggregator, StoreError};
use lb_proxy::upstream::{BackendClient, ForwardError};

mod common;

struct Harness {
    queue: IntakeQueue,
    recorder: MetricsRecorder,
    stats: StatsAggregator,
    client: BackendClient,
    pool: Arc<ServerPool>,
    _shutdown: broadcast::Sender<()>,
}

fn start(algorithm: &str, backends: &[&common::StubBackend], forward_ms: u64) -> Harness {
    start_with_store(algorithm, backends, forward_ms, Arc::new(MemoryStore::new(1000)))
}

fn start_with_store(
    algorithm: &str,
    backends: &[&common::StubBackend],
    forward_ms: u64,
    store: Arc<dyn MetricsStore>,
) -> Harness {
    let config = common::proxy_config(algorithm, backends);
    let pool = Arc::new(ServerPool::from_config(&config.pool).unwrap());
    let recorder = MetricsRecorder::new(store.clone());
    let timeouts = TimeoutConfig {
        forward_ms,
        ping_ms: 500,
    };
    let client = BackendClient::new(&timeouts, recorder.clone());
    let (queue, receiver) = intake_queue(16);
    let (shutdown, shutdown_rx) = broadcast::channel(1);

    let dispatcher = Dispatcher::new(
        pool.clone(),
        Strategy::from_name(pool.strategy_name(), 0),
        client.clone(),
        recorder.clone(),
    );
    tokio::spawn(dispatcher.run(receiver, shutdown_rx));

    Harness {
        queue,
        recorder,
        stats: StatsAggregator::new(store),
        client,
        pool,
        _shutdown: shutdown,
    }
}

async fn send(queue: &IntakeQueue, path: &'static str) -> Result<String, DispatchError> {
    let response = queue
        .dispatch(
            "test",
            Method::GET,
            Uri::from_static(path),
            HeaderMap::new(),
            Bytes::new(),
        )
        .await?;
    assert_eq!(response.status, StatusCode::OK);
    Ok(String::from_utf8(response.body.to_vec()).unwrap())
}

#[tokio::test]
async fn test_round_robin_alternates_starting_at_second_backend() {
    let a = common::start_backend("A").await;
    let b = common::start_backend("B").await;
    let harness = start("Round Robin", &[&a, &b], 2000);

    let mut order = Vec::new();
    for _ in 0..4 {
        order.push(send(&harness.queue, "/").await.unwrap());
    }
    assert_eq!(order, vec!["B", "A", "B", "A"]);
    assert_eq!(a.hits(), 2);
    assert_eq!(b.hits(), 2);

    // metrics are written after completion; give the dispatcher a moment
    tokio::time::sleep(Duration::from_millis(50)).await;
    let snapshot = harness.stats.snapshot().await.unwrap();
    assert_eq!(snapshot.servers["A"].request_count, 2);
    assert_eq!(snapshot.servers["B"].request_count, 2);
    assert!(snapshot.servers["A"].avg_latency_ms > 0.0);
    assert!(snapshot.proxy_avg_added_latency_ms > 0.0);
    assert_eq!(snapshot.active_servers, 0);
}

#[tokio::test]
async fn test_url_hash_is_sticky() {
    let a = common::start_backend("A").await;
    let b = common::start_backend("B").await;
    let c = common::start_backend("C").await;
    let harness = start("url hash", &[&a, &b, &c], 2000);

    let first = send(&harness.queue, "/users/42?tab=profile").await.unwrap();
    for _ in 0..5 {
        assert_eq!(send(&harness.queue, "/users/42?tab=profile").await.unwrap(), first);
    }
}

#[tokio::test]
async fn test_timeout_completes_and_releases_gauge() {
    let slow = common::start_slow_backend("slow", Duration::from_millis(500)).await;
    let harness = start("round robin", &[&slow], 100);

    let err = send(&harness.queue, "/").await.unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Forward {
            source: ForwardError::Timeout(_),
            ..
        }
    ));
    assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);

    assert_eq!(harness.recorder.active_connections("slow").await.unwrap(), 0);
    let snapshot = harness.stats.snapshot().await.unwrap();
    assert_eq!(snapshot.servers["slow"].request_count, 0);
    assert_eq!(snapshot.servers["slow"].active_connections, 0);
}

#[tokio::test]
async fn test_connection_refused_is_bad_gateway() {
    let addr = common::closed_addr().await;
    let mut config = common::proxy_config("random", &[]);
    config.pool.backends.push(lb_proxy::config::BackendConfig {
        name: "gone".into(),
        address: addr.to_string(),
        weight: 1.0,
    });
    let pool = ServerPool::from_config(&config.pool).unwrap();
    let recorder = MetricsRecorder::new(Arc::new(MemoryStore::new(10)));
    let client = BackendClient::new(&TimeoutConfig::default(), recorder.clone());

    let err = client
        .forward(&pool.backends()[0], Method::GET, &HeaderMap::new(), Bytes::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "connect");
    assert_eq!(recorder.active_connections("gone").await.unwrap(), 0);
}

#[tokio::test]
async fn test_concurrent_forwards_leave_gauge_at_zero() {
    let backend = common::start_slow_backend("busy", Duration::from_millis(20)).await;
    let harness = start("round robin", &[&backend], 2000);
    let target = harness.pool.backends()[0].clone();

    let mut tasks = Vec::new();
    for _ in 0..50 {
        let client = harness.client.clone();
        let target = target.clone();
        tasks.push(tokio::spawn(async move {
            client
                .forward(&target, Method::POST, &HeaderMap::new(), Bytes::from_static(b"job"))
                .await
        }));
    }
    for task in tasks {
        let response = task.await.unwrap().unwrap();
        assert_eq!(response.body, Bytes::from_static(b"busy"));
    }

    assert_eq!(backend.hits(), 50);
    assert_eq!(harness.recorder.active_connections("busy").await.unwrap(), 0);
}

#[tokio::test]
async fn test_least_response_time_prefers_fast_backend() {
    let slow = common::start_slow_backend("slow", Duration::from_millis(60)).await;
    let fast = common::start_backend("fast").await;
    let harness = start("least response time", &[&slow, &fast], 2000);

    // no samples yet: every average is 0 and the first backend wins
    assert_eq!(send(&harness.queue, "/").await.unwrap(), "slow");
    tokio::time::sleep(Duration::from_millis(20)).await;
    // slow now averages ~60ms while fast still reads 0
    assert_eq!(send(&harness.queue, "/").await.unwrap(), "fast");
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(send(&harness.queue, "/").await.unwrap(), "fast");
}

/// Store whose calls never finish.
struct StalledStore;

#[async_trait]
impl MetricsStore for StalledStore {
    async fn increment_counter(&self, _: &str) -> Result<i64, StoreError> {
        std::future::pending().await
    }
    async fn increment_gauge(&self, _: &str) -> Result<i64, StoreError> {
        std::future::pending().await
    }
    async fn decrement_gauge(&self, _: &str) -> Result<i64, StoreError> {
        std::future::pending().await
    }
    async fn push_sample(&self, _: &str, _: f64) -> Result<(), StoreError> {
        std::future::pending().await
    }
    async fn read_counter(&self, _: &str) -> Result<i64, StoreError> {
        std::future::pending().await
    }
    async fn read_list(&self, _: &str) -> Result<Vec<f64>, StoreError> {
        std::future::pending().await
    }
    async fn scan_keys(&self, _: &str) -> Result<Vec<String>, StoreError> {
        std::future::pending().await
    }
    async fn ping(&self) -> Result<(), StoreError> {
        std::future::pending().await
    }
}

/// Store that rejects every write and reads through to an in-memory store.
struct ReadOnlyStore {
    inner: MemoryStore,
}

fn refused() -> StoreError {
    StoreError::Address {
        address: "metrics".into(),
        reason: "writes refused".into(),
    }
}

#[async_trait]
impl MetricsStore for ReadOnlyStore {
    async fn increment_counter(&self, _: &str) -> Result<i64, StoreError> {
        Err(refused())
    }
    async fn increment_gauge(&self, _: &str) -> Result<i64, StoreError> {
        Err(refused())
    }
    async fn decrement_gauge(&self, _: &str) -> Result<i64, StoreError> {
        Err(refused())
    }
    async fn push_sample(&self, _: &str, _: f64) -> Result<(), StoreError> {
        Err(refused())
    }
    async fn read_counter(&self, key: &str) -> Result<i64, StoreError> {
        self.inner.read_counter(key).await
    }
    async fn read_list(&self, key: &str) -> Result<Vec<f64>, StoreError> {
        self.inner.read_list(key).await
    }
    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        self.inner.scan_keys(pattern).await
    }
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_stalled_store_does_not_block_dispatch() {
    let a = common::start_backend("A").await;
    let harness = start_with_store("least connections", &[&a], 2000, Arc::new(StalledStore));

    for _ in 0..3 {
        let body = tokio::time::timeout(Duration::from_secs(5), send(&harness.queue, "/"))
            .await
            .expect("dispatch stalled behind the metrics store")
            .unwrap();
        assert_eq!(body, "A");
    }
    assert_eq!(a.hits(), 3);
}

#[tokio::test]
async fn test_failing_store_still_answers() {
    let a = common::start_backend("A").await;
    let store = Arc::new(ReadOnlyStore {
        inner: MemoryStore::new(10),
    });
    let harness = start_with_store("round robin", &[&a], 2000, store.clone());

    assert_eq!(send(&harness.queue, "/").await.unwrap(), "A");
    assert_eq!(send(&harness.queue, "/").await.unwrap(), "A");

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(harness.recorder.active_connections("A").await.unwrap(), 0);
    assert!(store.inner.scan_keys("*").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_non_http_reply_is_protocol_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = socket.write_all(b"THIS IS NOT HTTP\r\n\r\n").await;
                let _ = socket.shutdown().await;
            });
        }
    });

    let mut config = common::proxy_config("round robin", &[]);
    config.pool.backends.push(lb_proxy::config::BackendConfig {
        name: "garbled".into(),
        address: addr.to_string(),
        weight: 1.0,
    });
    let pool = ServerPool::from_config(&config.pool).unwrap();
    let recorder = MetricsRecorder::new(Arc::new(MemoryStore::new(10)));
    let client = BackendClient::new(&TimeoutConfig::default(), recorder.clone());

    let err = client
        .forward(&pool.backends()[0], Method::GET, &HeaderMap::new(), Bytes::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ForwardError::Protocol(_)), "got {err}");
    assert_eq!(err.kind(), "protocol");
    assert_eq!(recorder.active_connections("garbled").await.unwrap(), 0);
}

#[tokio::test]
async fn test_pings_reuse_one_connection() {
    use std::collections::HashSet;
    use std::net::SocketAddr;
    use std::sync::Mutex;

    use axum::extract::ConnectInfo;
    use axum::routing::get;
    use axum::Router;

    let peers = Arc::new(Mutex::new(HashSet::new()));
    let seen = peers.clone();
    let app = Router::new().route(
        "/",
        get(move |ConnectInfo(peer): ConnectInfo<SocketAddr>| {
            let seen = seen.clone();
            async move {
                seen.lock().unwrap().insert(peer);
                "x".repeat(16 * 1024)
            }
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .unwrap();
    });

    let mut config = common::proxy_config("round robin", &[]);
    config.pool.backends.push(lb_proxy::config::BackendConfig {
        name: "pinged".into(),
        address: addr.to_string(),
        weight: 1.0,
    });
    let pool = ServerPool::from_config(&config.pool).unwrap();
    let recorder = MetricsRecorder::new(Arc::new(MemoryStore::new(10)));
    let client = BackendClient::new(&TimeoutConfig::default(), recorder);

    for _ in 0..5 {
        assert!(client.ping(&pool.backends()[0]).await);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    // an unread body closes its connection, so five pings would mean five peers
    assert!(peers.lock().unwrap().len() < 5);
}
