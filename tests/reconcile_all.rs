//! Full Reconcile Pass Test
//!
//! Kept in its own binary: a full pass touches every post in the shared store.

mod common;

use axum::http::StatusCode;
use common::{app, TEST_ADMIN_TOKEN};
use serde_json::json;

use agora::infra::store::EntityStore;

#[tokio::test]
async fn full_pass_repairs_only_drifted_posts() {
    let app = app().await;
    let user = app.create_user("rec_all").await;
    let clean = app.create_post(&user).await;
    let drifted = app.create_post(&user).await;
    app.create_comment(&user, clean).await;
    app.create_comment(&user, drifted).await;

    app.state.store.set_post_amount(drifted, 40).await.unwrap();

    let resp = app
        .post_admin("/admin/reconcile", json!({}), Some(TEST_ADMIN_TOKEN))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["checked"], 2);
    let repaired = body["repaired"].as_array().unwrap();
    assert_eq!(repaired.len(), 1);
    assert_eq!(repaired[0]["post_id"].as_str().unwrap(), drifted.to_string());

    assert_eq!(app.post_amount(clean).await, 1);
    assert_eq!(app.post_amount(drifted).await, 1);
}
