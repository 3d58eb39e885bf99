use std::sync::Arc;

use rollcall_core::{GradeSection, SystemClock};
use rollcall_server::{AppConfig, AppState, ServerBuilder, build_app};
use rollcall_storage::{AttendanceStore, InMemoryAttendanceStore};
use serde_json::Value;
use tokio::task::JoinHandle;

async fn start_server() -> (String, tokio::sync::oneshot::Sender<()>, JoinHandle<()>) {
    let cfg = AppConfig::default();
    let store = InMemoryAttendanceStore::new();
    store
        .upsert_section(GradeSection {
            id: "7b".into(),
            name: "Grade 7 - Blue".into(),
            grade_level: 7,
            teacher_id: None,
        })
        .await
        .expect("seed section");
    let state = AppState::new(&cfg, Arc::new(store), Arc::new(SystemClock)).expect("state");
    let app = build_app(state, &cfg);

    // Bind to an ephemeral port
    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await;
    });

    (format!("http://{addr}"), tx, server)
}

#[tokio::test]
async fn server_endpoints_work() {
    let (base, shutdown_tx, handle) = start_server().await;
    let client = reqwest::Client::new();

    // GET /healthz
    let resp = client.get(format!("{base}/healthz")).send().await.unwrap();
    assert!(resp.status().is_success());
    assert!(resp.headers().contains_key("x-request-id"));
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    // GET /readyz
    let resp = client.get(format!("{base}/readyz")).send().await.unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ready");

    // GET /api/sections twice: miss then hit
    for expected in ["MISS", "HIT"] {
        let resp = client
            .get(format!("{base}/api/sections"))
            .header("x-user-id", "t-1")
            .header("x-user-role", "teacher")
            .send()
            .await
            .unwrap();
        assert!(resp.status().is_success());
        assert_eq!(resp.headers()["x-cache"], expected);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["sections"][0]["id"], "7b");
    }

    // Request id is preserved when supplied
    let resp = client
        .get(format!("{base}/healthz"))
        .header("x-request-id", "req-42")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["x-request-id"], "req-42");

    // shutdown
    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn builder_rejects_invalid_config() {
    let mut cfg = AppConfig::default();
    cfg.cache.cleanup_interval_secs = 0;

    let err = ServerBuilder::new()
        .with_config(cfg)
        .build()
        .await
        .err()
        .expect("zero cleanup interval must be rejected");
    assert!(
        err.to_string().contains("cache.cleanup_interval_secs"),
        "{err}"
    );
}
