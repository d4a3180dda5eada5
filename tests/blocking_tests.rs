//! Integration tests for the blocking client.
//!
//! The mock server needs a runtime, while the blocking client must not run on
//! one, so every client call happens inside `spawn_blocking`.

use neo_tariff::retry::Backoff;
use neo_tariff::{BlockingClient, ClientConfig, Error, HtsSearchParams};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(base_url: &str, max_retries: u32) -> BlockingClient {
    let config = ClientConfig::builder()
        .api_key("test-key")
        .base_url(base_url)
        .max_retries(max_retries)
        .backoff(Backoff {
            initial: Duration::from_millis(1),
            max: Duration::from_millis(10),
        })
        .build()
        .unwrap();
    BlockingClient::new(config).unwrap()
}

fn versions_body() -> Value {
    json!({
        "success": true,
        "data": [{"source_id": 1, "year": 2025, "version": 1, "is_active": true}]
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn test_blocking_versions_list() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/versions"))
        .and(header("x-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(versions_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let uri = mock_server.uri();
    let versions = tokio::task::spawn_blocking(move || {
        let client = client_for(&uri, 2);
        client.versions().list().unwrap().into_data().unwrap()
    })
    .await
    .unwrap();

    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].year, Some(2025));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_blocking_search_params() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/hts"))
        .and(query_param("code", "7208"))
        .and(query_param("hts_year", "2025"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [{"hts_code": "7208100000", "description": "Flat-rolled"}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let uri = mock_server.uri();
    let items = tokio::task::spawn_blocking(move || {
        let client = client_for(&uri, 0);
        let params = HtsSearchParams::code("7208").revision(2025, 1);
        client.search().hts(&params).unwrap().into_data().unwrap()
    })
    .await
    .unwrap();

    assert_eq!(items[0].hts_code, "7208100000");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_blocking_retries_then_succeeds() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/versions"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/versions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(versions_body()))
        .mount(&mock_server)
        .await;

    let uri = mock_server.uri();
    let result = tokio::task::spawn_blocking(move || {
        let client = client_for(&uri, 2);
        client.versions().list().map(|envelope| envelope.success)
    })
    .await
    .unwrap();

    assert!(result.is_ok());
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_blocking_persistent_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/versions"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "success": false,
            "errors": [{"code": "INTERNAL", "message": "database unavailable"}]
        })))
        .expect(2)
        .mount(&mock_server)
        .await;

    let uri = mock_server.uri();
    let err = tokio::task::spawn_blocking(move || {
        let client = client_for(&uri, 1);
        client.versions().list().map(|envelope| envelope.success)
    })
    .await
    .unwrap()
    .unwrap_err();

    match err {
        Error::Server(failure) => {
            assert_eq!(failure.status.as_u16(), 500);
            assert_eq!(failure.message, "database unavailable");
        }
        other => panic!("Expected Server, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_blocking_retry_after_sleeps() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/versions"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0.2"))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/versions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(versions_body()))
        .mount(&mock_server)
        .await;

    let uri = mock_server.uri();
    let elapsed = tokio::task::spawn_blocking(move || {
        let client = client_for(&uri, 1);
        let start = Instant::now();
        client.versions().list().unwrap();
        start.elapsed()
    })
    .await
    .unwrap();

    assert!(elapsed >= Duration::from_millis(200));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_blocking_connection_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let err = tokio::task::spawn_blocking(move || {
        let client = client_for(&format!("http://127.0.0.1:{}", port), 1);
        client.versions().list().map(|envelope| envelope.success)
    })
    .await
    .unwrap()
    .unwrap_err();

    assert!(matches!(err, Error::Connection { attempts: 2, .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_blocking_close() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(versions_body()))
        .expect(0)
        .mount(&mock_server)
        .await;

    let uri = mock_server.uri();
    let (first, second) = tokio::task::spawn_blocking(move || {
        let client = client_for(&uri, 0);
        client.close();
        client.close();
        let clone = client.clone();
        let first = client.versions().list().map(|envelope| envelope.success);
        let second = clone.versions().list().map(|envelope| envelope.success);
        (first, second)
    })
    .await
    .unwrap();

    assert!(matches!(first, Err(Error::Closed)));
    assert!(matches!(second, Err(Error::Closed)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_blocking_client_shared_across_threads() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/versions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(versions_body())
                .set_delay(Duration::from_millis(20)),
        )
        .expect(4)
        .mount(&mock_server)
        .await;

    let uri = mock_server.uri();
    let successes = tokio::task::spawn_blocking(move || {
        let client = client_for(&uri, 0);
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| client.versions().list().map(|envelope| envelope.success)))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap().unwrap())
                .filter(|success| *success)
                .count()
        })
    })
    .await
    .unwrap();

    assert_eq!(successes, 4);
}

#[derive(Clone, Default)]
struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_blocking_retry_warning_names_the_call() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/versions"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/versions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(versions_body()))
        .mount(&mock_server)
        .await;

    let uri = mock_server.uri();
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    tokio::task::spawn_blocking(move || {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            let client = client_for(&uri, 1);
            client.versions().list().unwrap();
        });
    })
    .await
    .unwrap();

    let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    assert!(output.contains("Retryable status, retrying after delay"), "{output}");
    assert!(output.contains("method=GET"), "{output}");
    assert!(output.contains("path=/versions"), "{output}");
}
