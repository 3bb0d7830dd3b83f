mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn first_query_registers_device_once() {
    let app = TestApp::new().await;

    let first = app.get_auth_mode("acme", "SN-001").await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(
        first.data(),
        &json!({ "authMode": 0, "deviceName": "Unknown", "isActive": true })
    );

    let second = app.get_auth_mode("acme", "SN-001").await;
    assert_eq!(second.data(), first.data());

    let rows = app.backend.device_rows("acme").await.unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].is_active && !rows[0].deleted);
    assert_eq!(app.backend.log_rows("acme").await.unwrap().len(), 1);
}

#[tokio::test]
async fn missing_serial_is_a_bad_request() {
    let app = TestApp::new().await;

    let res = app
        .send(Method::POST, "/api/device/getAuthMode", Some("acme"), Some(json!({})))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.code(), "BAD_REQUEST");

    let res = app
        .send(Method::POST, "/api/device/getAuthMode", Some("acme"), None)
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(app.backend.device_rows("acme").await.unwrap().is_empty());
}

#[tokio::test]
async fn disabled_device_gets_no_auth_mode() {
    let app = TestApp::new().await;
    app.get_auth_mode("acme", "SN-001").await;

    let res = app
        .send(
            Method::PUT,
            "/api/devices/SN-001",
            Some("acme"),
            Some(json!({ "deviceName": "Gate", "authMode": 2, "isActive": false })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["isActive"], false);

    let res = app.get_auth_mode("acme", "SN-001").await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.code(), "DEVICE_DISABLED");
    assert!(res.body.get("data").is_none());
}

#[tokio::test]
async fn self_update_changes_fields_and_logs() {
    let app = TestApp::new().await;

    let res = app
        .send(
            Method::POST,
            "/api/device/update",
            Some("acme"),
            Some(json!({ "serialNo": "SN-404", "authMode": 1, "deviceName": "x", "isActive": true })),
        )
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.code(), "DEVICE_NOT_FOUND");
    assert!(app.backend.device_rows("acme").await.unwrap().is_empty());

    app.get_auth_mode("acme", "SN-001").await;
    let res = app
        .send(
            Method::POST,
            "/api/device/update",
            Some("acme"),
            Some(json!({ "serialNo": "SN-001", "authMode": 42, "deviceName": "Body cam 7", "isActive": true })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["authMode"], 42);
    assert_eq!(res.data()["deviceName"], "Body cam 7");

    let res = app.get_auth_mode("acme", "SN-001").await;
    assert_eq!(res.data()["authMode"], 42);

    let history = app
        .send(Method::GET, "/api/devices/SN-001/history", Some("acme"), None)
        .await;
    let entries = history.data().as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries[0]["action"].as_str().unwrap().contains("unknown (42)"));
}

#[tokio::test]
async fn console_create_update_delete_cycle() {
    let app = TestApp::new().await;

    let res = app
        .send(
            Method::POST,
            "/api/devices",
            Some("acme"),
            Some(json!({
                "serialNo": "SN-100",
                "deviceName": "Lobby",
                "authMode": 1,
                "isActive": true,
                "createdAt": "1999-01-01T00:00:00Z"
            })),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.data()["serialNo"], "SN-100");
    assert_ne!(res.data()["createdAt"], "1999-01-01T00:00:00Z");

    let dup = app
        .send(
            Method::POST,
            "/api/devices",
            Some("acme"),
            Some(json!({ "serialNo": "SN-100", "deviceName": "Again", "authMode": 0, "isActive": true })),
        )
        .await;
    assert_eq!(dup.status, StatusCode::CONFLICT);
    assert_eq!(dup.code(), "DUPLICATE_SERIAL");

    let res = app
        .send(
            Method::PUT,
            "/api/devices/SN-100",
            Some("acme"),
            Some(json!({ "deviceName": "Lobby east", "authMode": 2, "isActive": true })),
        )
        .await;
    assert_eq!(res.data()["deviceName"], "Lobby east");

    let res = app
        .send(Method::DELETE, "/api/devices/SN-100", Some("acme"), None)
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data(), &json!({ "serialNo": "SN-100", "deleted": true }));

    let rows = app.backend.device_rows("acme").await.unwrap();
    assert!(rows[0].deleted);
    assert!(!rows[0].is_active);

    let list = app.send(Method::GET, "/api/devices", Some("acme"), None).await;
    assert!(list.data().as_array().unwrap().is_empty());

    let history = app
        .send(Method::GET, "/api/devices/SN-100/history", Some("acme"), None)
        .await;
    let actions: Vec<&str> = history
        .data()
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions.len(), 3);
    assert_eq!(actions[0], "soft-deleted");
    assert!(actions[1].contains("authMode=face+vein"));
    assert_eq!(actions[2], "created");

    // Deleted is terminal
    let res = app
        .send(Method::DELETE, "/api/devices/SN-100", Some("acme"), None)
        .await;
    assert_eq!(res.code(), "DEVICE_NOT_FOUND");
    let res = app
        .send(
            Method::PUT,
            "/api/devices/SN-100",
            Some("acme"),
            Some(json!({ "deviceName": "Back", "authMode": 0, "isActive": true })),
        )
        .await;
    assert_eq!(res.code(), "DEVICE_NOT_FOUND");

    // The serial is free again
    let res = app
        .send(
            Method::POST,
            "/api/devices",
            Some("acme"),
            Some(json!({ "serialNo": "SN-100", "deviceName": "Replacement", "authMode": 0, "isActive": true })),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(app.backend.device_rows("acme").await.unwrap().len(), 2);
}

#[tokio::test]
async fn update_requires_full_record() {
    let app = TestApp::new().await;
    app.get_auth_mode("acme", "SN-001").await;

    let res = app
        .send(
            Method::PUT,
            "/api/devices/SN-001",
            Some("acme"),
            Some(json!({ "deviceName": "Gate" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn history_of_unknown_serial_is_empty() {
    let app = TestApp::new().await;
    let res = app
        .send(Method::GET, "/api/devices/NEVER/history", Some("acme"), None)
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data(), &json!([]));
}

#[tokio::test]
async fn tenants_sharing_a_serial_stay_isolated() {
    let app = TestApp::new().await;

    app.get_auth_mode("acme", "SN-SHARED").await;
    app.send(
        Method::PUT,
        "/api/devices/SN-SHARED",
        Some("acme"),
        Some(json!({ "deviceName": "Acme cam", "authMode": 1, "isActive": false })),
    )
    .await;

    // globex sees a brand new, active device
    let res = app.get_auth_mode("globex", "SN-SHARED").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(
        res.data(),
        &json!({ "authMode": 0, "deviceName": "Unknown", "isActive": true })
    );

    app.send(Method::DELETE, "/api/devices/SN-SHARED", Some("globex"), None)
        .await;

    let acme_list = app.send(Method::GET, "/api/devices", Some("acme"), None).await;
    assert_eq!(acme_list.data()[0]["deviceName"], "Acme cam");
    let acme_history = app
        .send(Method::GET, "/api/devices/SN-SHARED/history", Some("acme"), None)
        .await;
    assert_eq!(acme_history.data().as_array().unwrap().len(), 2);

    let globex_history = app
        .send(Method::GET, "/api/devices/SN-SHARED/history", Some("globex"), None)
        .await;
    let actions: Vec<&str> = globex_history
        .data()
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions, vec!["soft-deleted", "auto-registered"]);
}

#[tokio::test]
async fn every_request_releases_its_storage_handle() {
    let app = TestApp::new().await;
    let balanced = |app: &TestApp| {
        assert!(app.backend.opened() > 0);
        assert_eq!(app.backend.opened(), app.backend.released());
    };

    let res = app.get_auth_mode("acme", "SN-001").await;
    assert_eq!(res.status, StatusCode::OK);
    balanced(&app);

    let res = app
        .send(
            Method::POST,
            "/api/device/update",
            Some("acme"),
            Some(json!({ "serialNo": "SN-404", "authMode": 0, "deviceName": "x", "isActive": true })),
        )
        .await;
    assert_eq!(res.code(), "DEVICE_NOT_FOUND");
    balanced(&app);

    let res = app
        .send(
            Method::POST,
            "/api/devices",
            Some("acme"),
            Some(json!({ "serialNo": "SN-001", "deviceName": "Dup", "authMode": 0, "isActive": true })),
        )
        .await;
    assert_eq!(res.code(), "DUPLICATE_SERIAL");
    balanced(&app);

    app.send(
        Method::PUT,
        "/api/devices/SN-001",
        Some("acme"),
        Some(json!({ "deviceName": "Gate", "authMode": 0, "isActive": false })),
    )
    .await;
    let res = app.get_auth_mode("acme", "SN-001").await;
    assert_eq!(res.code(), "DEVICE_DISABLED");
    balanced(&app);

    // Body rejected after the storage handle was already opened
    let before = app.backend.opened();
    let res = app
        .send(
            Method::PUT,
            "/api/devices/SN-001",
            Some("acme"),
            Some(json!({ "deviceName": "Gate" })),
        )
        .await;
    assert_eq!(res.code(), "BAD_REQUEST");
    assert_eq!(app.backend.opened(), before + 1);
    balanced(&app);
}
