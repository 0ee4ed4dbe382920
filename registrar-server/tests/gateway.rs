use std::time::Duration;

use axum::http::StatusCode;
use registrar_core::inventory::InMemoryInventory;
use registrar_server::infra::startup::ProdStartupHooks;
use serde_json::{Value, json};

mod common;
use common::{TestApp, build_test_app_with_hooks};

async fn app(vouchers: &[&str]) -> TestApp {
    build_test_app_with_hooks(vouchers, InMemoryInventory::new(), &ProdStartupHooks)
        .await
        .expect("test app")
}

#[tokio::test]
async fn legacy_trigger_registers_then_reports_already_registered() {
    let app = app(&["abc123"]).await;

    let first = app.server.get("/device/abc123").await;
    first.assert_status_ok();
    assert_eq!(first.text(), "abc123 registered\n");

    let second = app.server.get("/device/abc123").await;
    second.assert_status_ok();
    assert_eq!(second.text(), "abc123 registered already\n");

    assert_eq!(app.inventory.create_calls(), 1);
}

#[tokio::test]
async fn unknown_device_is_404_without_inventory_calls() {
    let app = app(&["abc123"]).await;

    let response = app.server.get("/device/zzz999").await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"]["status"], 404);
    assert!(
        body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("zzz999")
    );
    assert_eq!(app.inventory.calls(), 0);
}

#[tokio::test]
async fn inventory_outage_is_500_and_nothing_is_created() {
    let app = app(&["abc123"]).await;
    app.inventory.fail_list("connection refused");

    let response = app.server.get("/device/abc123").await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(app.inventory.create_calls(), 0);
}

#[tokio::test]
async fn rejected_create_is_500() {
    let app = app(&["abc123"]).await;
    app.inventory.fail_create(true);

    let response = app.server.get("/device/abc123").await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(app.inventory.hosts().is_empty());
}

#[tokio::test]
async fn json_registration_reports_outcome() {
    let app = app(&["abc123"]).await;
    app.inventory.seed("legacy-name", 1, "guid: abc123");

    let response = app.server.post("/api/v1/devices/abc123/registration").await;

    response.assert_status_ok();
    response.assert_json(&json!({
        "guid": "abc123",
        "outcome": "already_registered",
    }));
}

#[tokio::test]
async fn device_listing_is_sorted_by_guid() {
    let app = app(&["ccc", "aaa", "bbb"]).await;

    let response = app.server.get("/api/v1/devices").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["count"], 3);
    let guids: Vec<&str> = body["devices"]
        .as_array()
        .unwrap()
        .iter()
        .map(|device| device["guid"].as_str().unwrap())
        .collect();
    assert_eq!(guids, ["aaa", "bbb", "ccc"]);
}

#[tokio::test]
async fn refresh_picks_up_new_vouchers() {
    let app = app(&["abc123"]).await;
    assert_eq!(
        app.server.get("/device/late-device").await.status_code(),
        StatusCode::NOT_FOUND
    );

    app.add_voucher("late-device");
    let refresh = app.server.post("/api/v1/discovery/refresh").await;

    refresh.assert_status_ok();
    refresh.assert_json(&json!({
        "found": 2,
        "added": ["late-device"],
        "known": 2,
    }));
    app.server.get("/device/late-device").await.assert_status_ok();
}

#[tokio::test]
async fn refresh_of_missing_directory_is_503_and_keeps_known_devices() {
    let app = app(&["abc123"]).await;
    std::fs::remove_dir_all(app.vouchers.path()).unwrap();

    let refresh = app.server.post("/api/v1/discovery/refresh").await;

    assert_eq!(refresh.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    app.server.get("/device/abc123").await.assert_status_ok();
}

#[tokio::test]
async fn banner_and_health_respond() {
    let app = app(&["abc123"]).await;

    let banner = app.server.get("/").await;
    banner.assert_status_ok();
    assert!(banner.text().contains("registrar"));

    let health = app.server.get("/health").await;
    health.assert_status_ok();
    let body: Value = health.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["known_devices"], 1);
}

#[tokio::test]
async fn slow_inventory_maps_to_500() {
    let inventory =
        InMemoryInventory::new().with_timeout(Duration::from_millis(50));
    inventory.set_list_delay(Some(Duration::from_secs(30)));
    let app = build_test_app_with_hooks(&["abc123"], inventory, &ProdStartupHooks)
        .await
        .unwrap();

    let response = app.server.get("/device/abc123").await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
}
