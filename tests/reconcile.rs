//! Counter Reconciliation Tests
//!
//! Drift is introduced by writing to the store directly, then repaired
//! through the admin reconcile endpoint.

mod common;

use axum::http::StatusCode;
use common::{app, TestApp, TEST_ADMIN_TOKEN};
use serde_json::json;
use uuid::Uuid;

use agora::domain::engagement::NewComment;
use agora::infra::store::EntityStore;

async fn logged_total(app: &TestApp, post_id: Uuid) -> i64 {
    app.state
        .store
        .list_counter_events(post_id)
        .await
        .unwrap()
        .iter()
        .map(|event| event.delta)
        .sum()
}

#[tokio::test]
async fn recount_repairs_overwritten_amount() {
    let app = app().await;
    let user = app.create_user("rec_recount").await;
    let post_id = app.create_post(&user).await;
    app.create_comment(&user, post_id).await;
    app.create_comment(&user, post_id).await;

    app.state.store.set_post_amount(post_id, 7).await.unwrap();
    assert_eq!(app.post_amount(post_id).await, 7);

    let resp = app
        .post_admin(
            &format!("/admin/posts/{}/reconcile?strategy=recount", post_id),
            json!({}),
            Some(TEST_ADMIN_TOKEN),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["strategy"], "recount");
    assert_eq!(body["before"], 7);
    assert_eq!(body["after"], 2);
    assert_eq!(body["repaired"], true);

    assert_eq!(app.post_amount(post_id).await, 2);
    assert_eq!(logged_total(app, post_id).await, 2);
}

#[tokio::test]
async fn recount_logs_repair_for_unlogged_comment() {
    let app = app().await;
    let user = app.create_user("rec_unlogged").await;
    let post_id = app.create_post(&user).await;
    app.create_comment(&user, post_id).await;

    // Bypasses the counter, as a crash between the two writes would.
    app.state
        .store
        .insert_comment(NewComment {
            owner_id: user.id,
            post_id,
            text: "lost".into(),
            email: "l@example.com".into(),
        })
        .await
        .unwrap();
    assert_eq!(app.post_amount(post_id).await, 1);

    let resp = app
        .post_admin(
            &format!("/admin/posts/{}/reconcile", post_id),
            json!({}),
            Some(TEST_ADMIN_TOKEN),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["after"], 2);

    assert_eq!(app.post_amount(post_id).await, 2);
    assert_eq!(logged_total(app, post_id).await, 2);

    let events = app.state.store.list_counter_events(post_id).await.unwrap();
    let last = events.last().unwrap();
    assert_eq!(last.cause.as_db(), "repair");
    assert_eq!(last.delta, 1);
}

#[tokio::test]
async fn replay_restores_logged_amount() {
    let app = app().await;
    let user = app.create_user("rec_replay").await;
    let post_id = app.create_post(&user).await;
    let comment_id = app.create_comment(&user, post_id).await;
    app.create_comment(&user, post_id).await;
    app.delete(&format!("/comments/{}", comment_id), Some(&user.access_token))
        .await;

    app.state.store.set_post_amount(post_id, -3).await.unwrap();

    let resp = app
        .post_admin(
            &format!("/admin/posts/{}/reconcile?strategy=replay", post_id),
            json!({}),
            Some(TEST_ADMIN_TOKEN),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["strategy"], "replay");
    assert_eq!(body["before"], -3);
    assert_eq!(body["after"], 1);

    assert_eq!(app.post_amount(post_id).await, 1);
}

#[tokio::test]
async fn consistent_post_is_left_alone() {
    let app = app().await;
    let user = app.create_user("rec_clean").await;
    let post_id = app.create_post(&user).await;
    app.create_comment(&user, post_id).await;
    let events_before = app.state.store.list_counter_events(post_id).await.unwrap().len();

    let resp = app
        .post_admin(
            &format!("/admin/posts/{}/reconcile", post_id),
            json!({}),
            Some(TEST_ADMIN_TOKEN),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["repaired"], false);

    let events_after = app.state.store.list_counter_events(post_id).await.unwrap().len();
    assert_eq!(events_before, events_after);
}

#[tokio::test]
async fn reconcile_missing_post_is_not_found() {
    let app = app().await;

    let resp = app
        .post_admin(
            &format!("/admin/posts/{}/reconcile", Uuid::new_v4()),
            json!({}),
            Some(TEST_ADMIN_TOKEN),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reconcile_requires_admin() {
    let app = app().await;
    let user = app.create_user("rec_admin").await;
    let post_id = app.create_post(&user).await;

    let resp = app
        .post_admin(&format!("/admin/posts/{}/reconcile", post_id), json!({}), None)
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}
