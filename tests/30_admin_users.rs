mod common;

use axum::http::{header, Method, Request, StatusCode};
use common::{with_json, TestApp, ROOT_PASSWORD};
use device_auth_api::auth::{password::PasswordScheme, validate_jwt};
use device_auth_api::database::{StorageRouter, TenantDirectory};
use serde_json::{json, Value};

async fn login(app: &TestApp, body: Value) -> common::TestResponse {
    app.send(Method::POST, "/api/auth/login", None, Some(body)).await
}

#[tokio::test]
async fn login_issues_token_and_tenant_cookie() {
    let app = TestApp::new().await;

    let res = login(
        &app,
        json!({ "tenantCode": "acme", "username": "admin", "password": ROOT_PASSWORD }),
    )
    .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["tenantCode"], "acme");
    assert_eq!(res.data()["username"], "admin");
    assert_eq!(res.data()["role"], "super_admin");
    assert!(res.data()["expiresIn"].as_i64().unwrap() > 0);

    let cookie = res.headers[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("tenantCode=acme;"));
    assert!(cookie.contains("HttpOnly"));

    let token = res.data()["token"].as_str().unwrap();
    let claims = validate_jwt(token, &app.config.security.jwt_secret).unwrap();
    assert_eq!(claims.tenant, "acme");

    // Legacy digest was upgraded on the way in
    let tenant = app.backend.find_active("acme").await.unwrap().unwrap();
    let mut store = app.backend.open(&tenant).await.unwrap();
    let root = store.find_admin_user_by_name("admin").await.unwrap().unwrap();
    assert_eq!(PasswordScheme::detect(&root.password_hash), PasswordScheme::Argon2);
}

#[tokio::test]
async fn cookie_from_login_scopes_later_requests() {
    let app = TestApp::new().await;
    app.get_auth_mode("globex", "SN-G").await;

    let res = login(
        &app,
        json!({ "tenantCode": "globex", "username": "admin", "password": ROOT_PASSWORD }),
    )
    .await;
    let cookie = res.headers[header::SET_COOKIE].to_str().unwrap();
    let pair = cookie.split(';').next().unwrap().to_string();

    let request = Request::builder()
        .uri("/api/devices")
        .header(header::COOKIE, pair);
    let res = app.request(with_json(request, None)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()[0]["serialNo"], "SN-G");
}

#[tokio::test]
async fn login_falls_back_to_request_sources() {
    let app = TestApp::new().await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header("X-Tenant-Code", "globex");
    let res = app
        .request(with_json(
            request,
            Some(json!({ "username": "admin", "password": ROOT_PASSWORD })),
        ))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["tenantCode"], "globex");

    let res = login(&app, json!({ "username": "admin", "password": ROOT_PASSWORD })).await;
    assert_eq!(res.code(), "MISSING_TENANT_IDENTIFIER");
}

#[tokio::test]
async fn login_failures() {
    let app = TestApp::new().await;

    let res = login(
        &app,
        json!({ "tenantCode": "initech", "username": "admin", "password": ROOT_PASSWORD }),
    )
    .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.code(), "UNKNOWN_TENANT");

    let wrong = login(
        &app,
        json!({ "tenantCode": "acme", "username": "admin", "password": "nope" }),
    )
    .await;
    let ghost = login(
        &app,
        json!({ "tenantCode": "acme", "username": "ghost", "password": ROOT_PASSWORD }),
    )
    .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.code(), "INVALID_CREDENTIALS");
    assert_eq!(wrong.body, ghost.body);
    assert!(wrong.headers.get(header::SET_COOKIE).is_none());

    let blank = login(&app, json!({ "tenantCode": "acme", "username": "", "password": "" })).await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_users_are_per_tenant() {
    let app = TestApp::new().await;

    let res = app
        .send(
            Method::POST,
            "/api/adminusers",
            Some("acme"),
            Some(json!({ "username": "operator", "password": "op-pass" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.data()["role"], "admin");
    assert!(res.data().get("passwordHash").is_none());

    let acme = app.send(Method::GET, "/api/adminusers", Some("acme"), None).await;
    let names: Vec<&str> = acme
        .data()
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["username"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["admin", "operator"]);

    let globex = app.send(Method::GET, "/api/adminusers", Some("globex"), None).await;
    assert_eq!(globex.data().as_array().unwrap().len(), 1);

    let res = login(
        &app,
        json!({ "tenantCode": "globex", "username": "operator", "password": "op-pass" }),
    )
    .await;
    assert_eq!(res.code(), "INVALID_CREDENTIALS");
    let res = login(
        &app,
        json!({ "tenantCode": "acme", "username": "operator", "password": "op-pass" }),
    )
    .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["role"], "admin");
}

#[tokio::test]
async fn admin_user_management_rules() {
    let app = TestApp::new().await;

    let created = app
        .send(
            Method::POST,
            "/api/adminusers",
            Some("acme"),
            Some(json!({ "username": "operator", "password": "op-pass", "role": "admin" })),
        )
        .await;
    let id = created.data()["id"].as_i64().unwrap();

    let dup = app
        .send(
            Method::POST,
            "/api/adminusers",
            Some("acme"),
            Some(json!({ "username": "operator", "password": "other" })),
        )
        .await;
    assert_eq!(dup.status, StatusCode::CONFLICT);
    assert_eq!(dup.code(), "DUPLICATE_USERNAME");

    let bad_role = app
        .send(
            Method::POST,
            "/api/adminusers",
            Some("acme"),
            Some(json!({ "username": "x", "password": "y", "role": "owner" })),
        )
        .await;
    assert_eq!(bad_role.code(), "BAD_REQUEST");

    let promoted = app
        .send(
            Method::PUT,
            &format!("/api/adminusers/{}", id),
            Some("acme"),
            Some(json!({ "role": "super_admin" })),
        )
        .await;
    assert_eq!(promoted.status, StatusCode::OK);
    assert_eq!(promoted.data()["role"], "super_admin");

    let deleted = app
        .send(Method::DELETE, &format!("/api/adminusers/{}", id), Some("acme"), None)
        .await;
    assert_eq!(deleted.status, StatusCode::OK);

    let missing = app
        .send(Method::DELETE, &format!("/api/adminusers/{}", id), Some("acme"), None)
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.code(), "USER_NOT_FOUND");

    let not_a_number = app
        .send(Method::DELETE, "/api/adminusers/abc", Some("acme"), None)
        .await;
    assert_eq!(not_a_number.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn root_account_is_protected() {
    let app = TestApp::new().await;
    let users = app.send(Method::GET, "/api/adminusers", Some("acme"), None).await;
    let root_id = users.data()[0]["id"].as_i64().unwrap();

    let demote = app
        .send(
            Method::PUT,
            &format!("/api/adminusers/{}", root_id),
            Some("acme"),
            Some(json!({ "role": "admin" })),
        )
        .await;
    assert_eq!(demote.status, StatusCode::FORBIDDEN);
    assert_eq!(demote.code(), "ACCOUNT_INVARIANT_VIOLATION");

    let delete = app
        .send(Method::DELETE, &format!("/api/adminusers/{}", root_id), Some("acme"), None)
        .await;
    assert_eq!(delete.code(), "ACCOUNT_INVARIANT_VIOLATION");

    // Password changes are still allowed
    let res = app
        .send(
            Method::PUT,
            &format!("/api/adminusers/{}", root_id),
            Some("acme"),
            Some(json!({ "password": "rotated" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["role"], "super_admin");

    let res = login(
        &app,
        json!({ "tenantCode": "acme", "username": "admin", "password": "rotated" }),
    )
    .await;
    assert_eq!(res.status, StatusCode::OK);
}
