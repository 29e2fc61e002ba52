//! End-to-end sync against a local stand-in for the data API.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tempfile::tempdir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use pocketledger_core::sync::{DrainStatus, WriteOptions};
use pocketledger_storage_sqlite::LocalStore;
use pocketledger_sync_agent::config::AgentConfig;
use pocketledger_sync_agent::runtime::{local_status, AgentRuntime};

#[derive(Default)]
struct ApiState {
    document: Option<Value>,
    posted: Vec<(Option<String>, Value)>,
    post_statuses: VecDeque<u16>,
}

struct Request {
    method: String,
    authorization: Option<String>,
    body: Vec<u8>,
}

async fn read_request(stream: &mut tokio::net::TcpStream) -> Option<Request> {
    let mut buffer = Vec::new();
    let header_end = loop {
        let mut chunk = [0_u8; 2048];
        let read = stream.read(&mut chunk).await.ok()?;
        if read == 0 {
            return None;
        }
        buffer.extend_from_slice(&chunk[..read]);
        if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let mut lines = head.lines();
    let method = lines.next()?.split_whitespace().next()?.to_string();
    let headers: HashMap<String, String> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();
    let content_length = headers
        .get("content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buffer[header_end + 4..].to_vec();
    while body.len() < content_length {
        let mut chunk = [0_u8; 2048];
        let read = stream.read(&mut chunk).await.ok()?;
        if read == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..read]);
    }

    Some(Request {
        method,
        authorization: headers.get("authorization").cloned(),
        body,
    })
}

async fn respond(stream: &mut tokio::net::TcpStream, status: u16, body: &str) {
    let response = format!(
        "HTTP/1.1 {} Status\r\nContent-Type: application/json\r\n\
         Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.flush().await;
}

const UNAUTHORIZED_BODY: &str = r#"{"code":"UNAUTHORIZED","message":"missing token"}"#;
const NOT_FOUND_BODY: &str = r#"{"code":"NOT_FOUND","message":"none"}"#;
const INTERNAL_BODY: &str = r#"{"code":"INTERNAL","message":"try later"}"#;

async fn handle_connection(mut stream: tokio::net::TcpStream, state: Arc<Mutex<ApiState>>) {
    let Some(request) = read_request(&mut stream).await else {
        return;
    };
    if request.authorization.is_none() {
        respond(&mut stream, 401, UNAUTHORIZED_BODY).await;
        return;
    }

    let mut state = state.lock().await;
    if request.method == "GET" {
        match state.document.clone() {
            Some(doc) => respond(&mut stream, 200, &doc.to_string()).await,
            None => respond(&mut stream, 404, NOT_FOUND_BODY).await,
        }
        return;
    }

    let status = state.post_statuses.pop_front().unwrap_or(200);
    let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
    state.posted.push((request.authorization.clone(), body.clone()));
    if status < 300 {
        state.document = Some(body);
        respond(&mut stream, status, "{}").await;
    } else {
        respond(&mut stream, status, INTERNAL_BODY).await;
    }
}

/// Serves `GET`/`POST /api/data` from memory. Unauthenticated requests get a
/// 401, which is all the connectivity probe needs.
async fn start_api(state: Arc<Mutex<ApiState>>) -> (String, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");

    let handle = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(handle_connection(stream, Arc::clone(&state)));
        }
    });

    (format!("http://{}/", addr), handle)
}

fn setup(api_url: String) -> (tempfile::TempDir, Arc<LocalStore>, AgentRuntime) {
    let dir = tempdir().expect("tempdir");
    let store = Arc::new(LocalStore::open(&dir.path().to_string_lossy()).expect("open store"));
    let config = AgentConfig {
        api_url: Some(api_url),
        data_dir: dir.path().to_path_buf(),
        probe_interval: Duration::from_millis(100),
        retry_while_pending: false,
    };
    let runtime = AgentRuntime::with_store(&config, Arc::clone(&store)).expect("runtime");
    (dir, store, runtime)
}

async fn wait_for_empty_queue(store: &LocalStore) {
    for _ in 0..100 {
        if local_status(store).expect("status").pending_changes == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("queue was not drained in time");
}

#[tokio::test]
async fn offline_write_is_delivered_once_the_api_is_reachable() {
    let state = Arc::new(Mutex::new(ApiState::default()));
    let (api_url, server) = start_api(Arc::clone(&state)).await;
    let (_dir, store, runtime) = setup(api_url);
    store.credentials().store("token-a");

    let doc = json!({"accounts": [{"id": "checking", "balance": 120}]});
    let engine = runtime.engine();
    let delivered = engine
        .write(doc.clone(), Some("token-a"), WriteOptions::default())
        .await
        .expect("write");
    assert!(!delivered);
    assert_eq!(local_status(&store).expect("status").pending_changes, 1);
    assert!(state.lock().await.posted.is_empty());

    runtime.start().await;
    wait_for_empty_queue(&store).await;
    runtime.stop().await;

    {
        let state = state.lock().await;
        assert_eq!(state.posted.len(), 1);
        assert_eq!(state.posted[0].0.as_deref(), Some("Bearer token-a"));
        assert_eq!(state.posted[0].1, doc);
    }

    assert!(runtime.network().is_online());
    let read = engine.read(Some("token-a")).await.expect("read");
    assert_eq!(read, Some(doc));
    server.abort();
}

#[tokio::test]
async fn drain_halts_on_rejection_and_resumes_in_order() {
    let state = Arc::new(Mutex::new(ApiState::default()));
    state.lock().await.post_statuses.push_back(500);
    let (api_url, server) = start_api(Arc::clone(&state)).await;
    let (_dir, store, runtime) = setup(api_url);
    store.credentials().store("token-b");

    let engine = runtime.engine();
    let first = json!({"version": 1});
    let second = json!({"version": 2});
    for doc in [&first, &second] {
        engine
            .write(doc.clone(), Some("token-b"), WriteOptions::default())
            .await
            .expect("write");
    }

    let report = runtime.drain_now().await;
    assert_eq!(report.status, DrainStatus::Halted);
    assert_eq!(report.replayed, 0);
    assert_eq!(report.remaining, 2);

    let pending = engine.pending_changes().expect("pending");
    assert_eq!(pending[0].payload, first);
    assert_eq!(pending[0].attempt_count, 1);
    assert!(pending[0]
        .last_error
        .as_deref()
        .is_some_and(|reason| reason.contains("500")));
    assert_eq!(pending[1].attempt_count, 0);

    let report = runtime.drain_now().await;
    assert_eq!(report.status, DrainStatus::Completed);
    assert_eq!(report.replayed, 2);
    assert_eq!(report.remaining, 0);

    let state = state.lock().await;
    let posted: Vec<&Value> = state.posted.iter().map(|(_, body)| body).collect();
    assert_eq!(posted, vec![&first, &first, &second]);
    assert_eq!(state.document.as_ref(), Some(&second));
    assert_eq!(
        engine.cached_snapshot().expect("cache").map(|s| s.data),
        Some(second.clone())
    );
    server.abort();
}
