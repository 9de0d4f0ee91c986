//! End-to-end HTTP surface tests, exercising the router the way a real
//! client and a real renderer would: GET submissions, a stub renderer
//! process driving order status through the real admission loop, and POST
//! uploads simulating the renderer's callback.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tower::ServiceExt;

use gis_map_server::buffer::Buffer;
use gis_map_server::error::ReplyStatus;
use gis_map_server::frontend::{app, AppState, Templates};
use gis_map_server::scheduler::{Scheduler, SchedulerHandle};
use gis_map_server::types::OrderId;

fn write_templates(dir: &Path) -> PathBuf {
    let html_dir = dir.join("html");
    std::fs::create_dir_all(&html_dir).unwrap();
    std::fs::write(html_dir.join("start_page.html"), "start at ADDRESS:PORT").unwrap();
    std::fs::write(
        html_dir.join("order_request.html"),
        "order ORDERID pin PIN_CODE at ADDRESS:PORT",
    )
    .unwrap();
    html_dir
}

/// A fake renderer: a shell script that ignores its argv (the real renderer
/// parses `-u/-o/-x/...`) and exits with a fixed code, driving the order
/// status the same way a real renderer process would, without needing the
/// actual `gis-buffer-renderer` binary.
fn renderer_stub(dir: &Path, exit_code: i32) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("renderer_stub.sh");
    std::fs::write(&path, format!("#!/bin/sh\nexit {exit_code}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

async fn build_app(dir: &Path, slots: usize, max_buffer: u64, renderer_exit: i32) -> (Router, SchedulerHandle) {
    let html_dir = write_templates(dir);
    let templates = Templates::load(&html_dir).unwrap();
    let renderer_path = renderer_stub(dir, renderer_exit);

    let scheduler = Scheduler::spawn(
        slots,
        renderer_path,
        "http://127.0.0.1:9999".to_string(),
        "0".to_string(),
    );
    let buffer = Arc::new(Mutex::new(Buffer::new(max_buffer)));

    let state = AppState {
        scheduler: scheduler.clone(),
        buffer,
        templates,
        server_address: "127.0.0.1".to_string(),
        server_port: 9999,
    };

    (app(state), scheduler)
}

/// Parses the `gis`-agent plaintext submission reply: `orderId=<n>,
/// pincode=<p>`.
fn parse_plain(body: &str) -> (u64, String) {
    let mut parts = body.splitn(2, ", ");
    let order_part = parts.next().expect("missing orderId segment");
    let pin_part = parts.next().expect("missing pincode segment");
    let id: u64 = order_part
        .trim_start_matches("orderId=")
        .parse()
        .expect("orderId should be numeric");
    let pincode = pin_part.trim_start_matches("pincode=").to_string();
    (id, pincode)
}

async fn submit(router: &Router, query: &str) -> (u64, String) {
    let req = Request::builder()
        .uri(query)
        .header("agent", "gis-test-client")
        .body(Body::empty())
        .unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    parse_plain(std::str::from_utf8(&body).unwrap())
}

fn upload_req(order_id: u64, content_type: &str, payload: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/")
        .header("orderId", order_id.to_string())
        .header("content-type", content_type)
        .header("content-length", payload.len().to_string())
        .body(Body::from(payload))
        .unwrap()
}

/// Happy path: submit, let the stub renderer exit 200, upload the
/// artifact, retrieve it back byte-for-byte with the right content type.
#[tokio::test]
async fn happy_path_round_trip() {
    let tmp = TempDir::new().unwrap();
    let (router, scheduler) = build_app(tmp.path(), 1, 1_000_000, 200).await;

    let (order_id, pincode) = submit(
        &router,
        "/?lat=60.0&lon=30.0&scale=10&w=256&h=256&format=image%2Fpng",
    )
    .await;

    let mut reached_ready = false;
    for _ in 0..50 {
        let status = scheduler
            .check(OrderId(order_id), pincode.clone(), Duration::from_millis(200))
            .await
            .unwrap();
        if status == ReplyStatus::Ready {
            reached_ready = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(reached_ready, "order never reached Ready via the admission loop");

    let image_bytes = vec![0xABu8; 8192];
    let resp = router
        .clone()
        .oneshot(upload_req(order_id, "image/png", image_bytes.clone()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let retrieve_req = Request::builder()
        .uri(format!("/?orderId={order_id}&pincode={pincode}"))
        .body(Body::empty())
        .unwrap();
    let resp = router.oneshot(retrieve_req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get("content-type").unwrap(), "image/png");
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body.as_ref(), image_bytes.as_slice());
}

/// Identical params collapse to the same order id and pincode.
#[tokio::test]
async fn duplicate_submission_dedups() {
    let tmp = TempDir::new().unwrap();
    let (router, _scheduler) = build_app(tmp.path(), 1, 1_000_000, 500).await;

    let query = "/?lat=61.0&lon=31.0&scale=12&w=128&h=128&format=image%2Fpng";
    let (id1, pin1) = submit(&router, query).await;
    let (id2, pin2) = submit(&router, query).await;

    assert_eq!(id1, id2);
    assert_eq!(pin1, pin2);
}

/// Boundary: CHECK with a wrong pincode returns INVALID_PARAM (400),
/// never leaking the real status.
#[tokio::test]
async fn wrong_pincode_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let (router, _scheduler) = build_app(tmp.path(), 1, 1_000_000, 500).await;

    let (order_id, _pincode) = submit(
        &router,
        "/?lat=10.0&lon=20.0&scale=5&w=64&h=64&format=image%2Fpng",
    )
    .await;

    let bad_req = Request::builder()
        .uri(format!("/?orderId={order_id}&pincode=WRONG1"))
        .body(Body::empty())
        .unwrap();
    let resp = router.oneshot(bad_req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

/// A 500B upload evicts a prior 700B one out of a 1000B buffer; the
/// evicted order's subsequent CHECK returns INVALID_PARAM.
#[tokio::test]
async fn eviction_invalidates_subsequent_check() {
    let tmp = TempDir::new().unwrap();
    let (router, _scheduler) = build_app(tmp.path(), 2, 1000, 500).await;

    let (id1, pin1) = submit(&router, "/?lat=1&lon=2&scale=1&w=1&h=1&format=image%2Fpng").await;
    let (id2, _pin2) = submit(&router, "/?lat=3&lon=4&scale=2&w=2&h=2&format=image%2Fpng").await;

    let resp1 = router
        .clone()
        .oneshot(upload_req(id1, "image/png", vec![1u8; 700]))
        .await
        .unwrap();
    assert_eq!(resp1.status(), StatusCode::OK);

    let resp2 = router
        .clone()
        .oneshot(upload_req(id2, "image/png", vec![1u8; 500]))
        .await
        .unwrap();
    assert_eq!(resp2.status(), StatusCode::OK);

    let check_req = Request::builder()
        .uri(format!("/?orderId={id1}&pincode={pin1}"))
        .body(Body::empty())
        .unwrap();
    let resp = router.oneshot(check_req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

/// A submission missing a required key is rejected without creating an
/// order, surfaced to the client as INVALID_PARAM.
#[tokio::test]
async fn malformed_submission_is_invalid_param() {
    let tmp = TempDir::new().unwrap();
    let (router, _scheduler) = build_app(tmp.path(), 1, 1_000_000, 500).await;

    let req = Request::builder()
        .uri("/?lat=not-a-number&lon=30.0&scale=10&w=256&h=256&format=image%2Fpng")
        .header("agent", "gis-test-client")
        .body(Body::empty())
        .unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

/// `GET /` with no query parameters serves the start page, substituting the
/// bound address and port.
#[tokio::test]
async fn empty_query_serves_start_page() {
    let tmp = TempDir::new().unwrap();
    let (router, _scheduler) = build_app(tmp.path(), 1, 1_000_000, 500).await;

    let req = Request::builder().uri("/").body(Body::empty()).unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let text = std::str::from_utf8(&body).unwrap();
    assert!(text.contains("127.0.0.1:9999"));
}
