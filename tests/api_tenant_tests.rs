//! 租户 API 集成测试

use auth_service::models::Role;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::json;

mod common;
use common::{access_cookie, json_request, json_request_with_cookie, request_with_cookie, TestApp};

#[tokio::test]
async fn test_admin_creates_tenant_and_list_is_public() {
    let app = TestApp::new();
    let (_, admin_token) = app.admin().await;
    let cookie = access_cookie(&admin_token);

    for (name, address) in [("Rakesh Kitchen", "Main street"), ("Tanjim Bakery", "Old town")] {
        let created = app
            .send(json_request_with_cookie(
                "POST",
                "/tenants",
                &cookie,
                json!({"name": name, "address": address}),
            ))
            .await;
        assert_eq!(created.status, StatusCode::CREATED);
        assert!(created.json["id"].is_string());
    }

    let list = app
        .send(
            Request::builder()
                .uri("/tenants?perPage=1&q=bakery")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(list.status, StatusCode::OK);
    assert_eq!(list.json["total"], 1);
    assert_eq!(list.json["perPage"], 1);
    assert_eq!(list.json["data"][0]["name"], "Tanjim Bakery");
    assert!(list.json["data"][0]["createdAt"].is_string());
}

#[tokio::test]
async fn test_tenant_writes_require_admin() {
    let app = TestApp::new();

    let anonymous = app
        .send(json_request(
            "POST",
            "/tenants",
            json!({"name": "Rakesh Kitchen", "address": "Main street"}),
        ))
        .await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let manager = app
        .create_user("manager@mern.space", "password", Role::Manager)
        .await;
    let as_manager = app
        .send(json_request_with_cookie(
            "POST",
            "/tenants",
            &access_cookie(&app.access_token(manager, Role::Manager)),
            json!({"name": "Rakesh Kitchen", "address": "Main street"}),
        ))
        .await;
    assert_eq!(as_manager.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_create_tenant_validation() {
    let app = TestApp::new();
    let (_, admin_token) = app.admin().await;

    let response = app
        .send(json_request_with_cookie(
            "POST",
            "/tenants",
            &access_cookie(&admin_token),
            json!({"name": "   ", "address": "Main street"}),
        ))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_update_and_delete_tenant() {
    let app = TestApp::new();
    let (_, admin_token) = app.admin().await;
    let cookie = access_cookie(&admin_token);

    let created = app
        .send(json_request_with_cookie(
            "POST",
            "/tenants",
            &cookie,
            json!({"name": "Rakesh Kitchen", "address": "Main street"}),
        ))
        .await;
    let id = created.json["id"].as_str().unwrap().to_string();
    let uri = format!("/tenants/{}", id);

    let fetched = app.send(request_with_cookie("GET", &uri, &cookie)).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.json["name"], "Rakesh Kitchen");

    let updated = app
        .send(json_request_with_cookie(
            "PATCH",
            &uri,
            &cookie,
            json!({"address": "New street"}),
        ))
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.json["name"], "Rakesh Kitchen");
    assert_eq!(updated.json["address"], "New street");

    let deleted = app.send(request_with_cookie("DELETE", &uri, &cookie)).await;
    assert_eq!(deleted.status, StatusCode::OK);

    let missing = app.send(request_with_cookie("GET", &uri, &cookie)).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_user_can_be_assigned_to_tenant() {
    let app = TestApp::new();
    let (_, admin_token) = app.admin().await;
    let cookie = access_cookie(&admin_token);

    let tenant = app
        .send(json_request_with_cookie(
            "POST",
            "/tenants",
            &cookie,
            json!({"name": "Rakesh Kitchen", "address": "Main street"}),
        ))
        .await;
    let tenant_id = tenant.json["id"].as_str().unwrap().to_string();

    let created = app
        .send(json_request_with_cookie(
            "POST",
            "/users",
            &cookie,
            json!({
                "firstName": "Rakesh",
                "lastName": "K",
                "email": "rakesh@mern.space",
                "password": "password",
                "role": "manager",
                "tenantId": tenant_id
            }),
        ))
        .await;
    assert_eq!(created.status, StatusCode::CREATED);

    // 登录后令牌携带租户
    let login = app
        .send(json_request(
            "POST",
            "/auth/login",
            json!({"email": "rakesh@mern.space", "password": "password"}),
        ))
        .await;
    assert_eq!(login.json["tenantId"], tenant_id);
    let claims = app
        .jwt_service
        .verify_access_token(&login.cookie("accessToken").unwrap())
        .unwrap();
    assert_eq!(claims.tenant.map(|t| t.to_string()), Some(tenant_id));
}
