//! Control routes exercised through the router, one request at a time.

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use needle_control::{app, router};
use needle_io::StorageFile;
use needle_sim::{SimulatedFile, SimulationConfig, SimulationControl};
use serde_json::{Value, json};
use tower::ServiceExt;

fn control_with(names: &[&str]) -> Arc<SimulationControl> {
    let control = Arc::new(SimulationControl::new());
    for name in names {
        control.register(
            *name,
            Arc::new(SimulatedFile::new(*name, SimulationConfig::instant())),
        );
    }
    control
}

async fn send(app: Router, method: Method, uri: &str, body: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn status_reports_aggregate_fields() {
    let control = control_with(&["1.dat", "2.dat"]);
    control.file("1.dat").unwrap().write_at(b"hello", 0).unwrap();

    let (status, body) = send(router(control), Method::GET, "/status", "").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["enabled"], false);
    assert_eq!(body["storage_files"], 2);
    assert_eq!(body["total_bytes_written"], 5);
    assert_eq!(body["total_operations"], 1);
    assert_eq!(body["total_errors"], 0);
    assert_eq!(body["global_config"]["latency"], 5_000_000);
}

#[tokio::test]
async fn post_config_for_one_file() {
    let control = control_with(&["1.dat"]);
    let (status, body) = send(
        router(Arc::clone(&control)),
        Method::POST,
        "/config?file=1.dat",
        r#"{"latency": 0, "error_rate": 1.0}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "success"}));
    let file = control.file("1.dat").unwrap();
    assert!(file.write_at(b"x", 0).unwrap_err().is_injected());
}

#[tokio::test]
async fn post_config_without_file_replaces_global_and_every_file() {
    let control = control_with(&["1.dat", "2.dat"]);
    let (status, _) = send(
        router(Arc::clone(&control)),
        Method::POST,
        "/config",
        r#"{"bandwidth": 4096}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(control.global_config().bandwidth, 4096);
    assert_eq!(control.config(Some("2.dat")).unwrap().bandwidth, 4096);
}

#[tokio::test]
async fn get_config_for_one_file() {
    let control = control_with(&["1.dat"]);
    let (status, body) = send(router(control), Method::GET, "/config?file=1.dat", "").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["latency"], 0);
    assert_eq!(body["enable_failure"], false);
}

#[tokio::test]
async fn unknown_file_is_not_found() {
    let control = control_with(&["1.dat"]);
    for (method, uri) in [
        (Method::GET, "/metrics?file=nope"),
        (Method::POST, "/metrics?file=nope"),
        (Method::GET, "/config?file=nope"),
        (Method::POST, "/reset?file=nope"),
    ] {
        let (status, body) = send(router(Arc::clone(&control)), method, uri, "{}").await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert!(body["error"].as_str().unwrap().contains("nope"));
    }
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let control = control_with(&["1.dat"]);
    let (status, body) = send(router(control), Method::POST, "/config", "not json").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn other_methods_on_config_are_not_allowed() {
    let control = control_with(&[]);
    for method in [Method::PUT, Method::DELETE] {
        let (status, _) = send(router(Arc::clone(&control)), method, "/config", "").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }
}

#[tokio::test]
async fn metrics_for_all_files_are_keyed_by_name() {
    let control = control_with(&["1.dat", "2.dat"]);
    control.file("2.dat").unwrap().write_at(b"abc", 0).unwrap();

    let (status, body) = send(router(control), Method::GET, "/metrics", "").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["1.dat"]["write_operations"], 0);
    assert_eq!(body["2.dat"]["bytes_written"], 3);
}

#[tokio::test]
async fn reset_clears_metrics() {
    let control = control_with(&["1.dat"]);
    let file = control.file("1.dat").unwrap();
    file.write_at(b"abc", 0).unwrap();

    let (status, body) = send(
        router(Arc::clone(&control)),
        Method::POST,
        "/reset?file=1.dat",
        "",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "reset"}));
    assert_eq!(file.metrics().bytes_written, 0);
}

#[tokio::test]
async fn enable_and_disable_toggle_the_flag() {
    let control = control_with(&[]);

    let (_, body) = send(router(Arc::clone(&control)), Method::POST, "/enable", "").await;
    assert_eq!(body, json!({"enabled": true, "status": "enabled"}));
    assert!(control.is_enabled());

    let (_, body) = send(router(Arc::clone(&control)), Method::POST, "/disable", "").await;
    assert_eq!(body, json!({"enabled": false, "status": "disabled"}));
    assert!(!control.is_enabled());
}

#[tokio::test]
async fn app_serves_routes_under_the_simulation_prefix() {
    let control = control_with(&["1.dat"]);

    let (status, body) = send(app(Arc::clone(&control)), Method::GET, "/simulation/status", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["storage_files"], 1);

    let (status, _) = send(app(control), Method::GET, "/status", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
