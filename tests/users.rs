//! User and Admin Tests
//!
//! Covers admin-gated user registration, token issuance and user lookup.

mod common;

use axum::http::StatusCode;
use common::{app, TEST_ADMIN_TOKEN};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn health_reports_ok() {
    let app = app().await;

    let resp = app.get("/health").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["status"], "ok");
}

#[tokio::test]
async fn created_user_can_be_fetched() {
    let app = app().await;
    let user = app.create_user("user_fetch").await;

    let resp = app.get(&format!("/users/{}", user.id)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["handle"].as_str().unwrap(), user.handle);
}

#[tokio::test]
async fn issued_token_authenticates() {
    let app = app().await;
    let user = app.create_user("user_token").await;

    let resp = app
        .post_json(
            "/posts",
            json!({ "title": "t", "text": "x", "email": "e@example.com" }),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(resp.json()["owner_id"].as_str().unwrap(), user.id.to_string());
}

#[tokio::test]
async fn admin_endpoint_rejects_wrong_token() {
    let app = app().await;

    let resp = app
        .post_admin(
            "/admin/users",
            json!({ "handle": "sneaky", "email": "sneaky@example.com" }),
            Some("wrong-token"),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = app
        .post_admin(
            "/admin/users",
            json!({ "handle": "sneaky", "email": "sneaky@example.com" }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn duplicate_handle_conflicts() {
    let app = app().await;
    let user = app.create_user("user_dup").await;

    let resp = app
        .post_admin(
            "/admin/users",
            json!({ "handle": user.handle, "email": "someone-else@example.com" }),
            Some(TEST_ADMIN_TOKEN),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn missing_user_is_not_found() {
    let app = app().await;

    let resp = app.get(&format!("/users/{}", Uuid::new_v4())).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}
