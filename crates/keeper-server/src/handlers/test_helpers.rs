use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use keeper_core::backend::{Backend, MemoryBackend};
use keeper_core::block_id::BlockId;
use keeper_core::ingest;
use tower::ServiceExt;

use crate::state::AppState;

/// Create a wired-up router over an in-memory backend with live writer
/// threads. The writers outlive the test; everything they consume lands in
/// the shared backend the test also holds.
pub fn setup_app() -> (Router, Arc<dyn Backend>) {
    let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
    let (_writers, dispatcher) = ingest::start(Arc::clone(&backend)).expect("start writer threads");
    let state = AppState::new(Arc::clone(&backend), dispatcher);
    (super::router(state), backend)
}

pub async fn get(router: Router, path: &str) -> axum::response::Response {
    let req = Request::builder()
        .method("GET")
        .uri(path)
        .body(Body::empty())
        .unwrap();
    router.oneshot(req).await.unwrap()
}

pub async fn get_with_header(
    router: Router,
    path: &str,
    name: &str,
    value: &str,
) -> axum::response::Response {
    let req = Request::builder()
        .method("GET")
        .uri(path)
        .header(name, value)
        .body(Body::empty())
        .unwrap();
    router.oneshot(req).await.unwrap()
}

pub async fn post_json(
    router: Router,
    path: &str,
    body: serde_json::Value,
) -> axum::response::Response {
    post_raw(router, path, serde_json::to_vec(&body).unwrap()).await
}

pub async fn post_raw(router: Router, path: &str, body: Vec<u8>) -> axum::response::Response {
    let req = Request::builder()
        .method("POST")
        .uri(path)
        .header("Content-Type", "application/json")
        .body(Body::from(body))
        .unwrap();
    router.oneshot(req).await.unwrap()
}

/// Read the full response body.
pub async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("collect body")
        .to_vec()
}

/// Read the full response body as JSON.
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).expect("parse body as JSON")
}

pub fn assert_status(response: &axum::response::Response, expected: StatusCode) {
    assert_eq!(
        response.status(),
        expected,
        "expected {expected}, got {}",
        response.status()
    );
}

/// Writes are acknowledged at enqueue time, so tests poll for the durable
/// effect instead of assuming it is immediate.
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 5s");
}

pub async fn wait_for_block(backend: &Arc<dyn Backend>, id: &BlockId) {
    let backend = Arc::clone(backend);
    let id = *id;
    wait_until(move || backend.get_block(&id).is_ok()).await;
}
