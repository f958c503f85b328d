use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::domain::vote::{TargetKind, VoteKind};
use crate::http::auth::AuthUser;
use crate::http::handlers::{
    self, CastCommentVoteRequest, CastPostVoteRequest, CastVoteBody, ForeignKeyQuery,
    UpdateCommentVoteRequest, UpdatePostVoteRequest, UpdateVoteBody,
};
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn admin() -> Router<AppState> {
    Router::new()
        .route("/admin/users", post(handlers::create_user))
        .route("/admin/reconcile", post(handlers::reconcile_all))
        .route("/admin/posts/:id/reconcile", post(handlers::reconcile_post))
}

pub fn users() -> Router<AppState> {
    Router::new().route("/users/:id", get(handlers::get_user))
}

pub fn posts() -> Router<AppState> {
    Router::new()
        .route("/posts", get(handlers::list_posts).post(handlers::create_post))
        .route("/posts/:id", get(handlers::get_post).patch(handlers::update_post))
}

pub fn comments() -> Router<AppState> {
    Router::new()
        .route(
            "/comments",
            get(handlers::list_comments).post(handlers::create_comment),
        )
        .route(
            "/comments/:id",
            get(handlers::get_comment)
                .patch(handlers::update_comment)
                .delete(handlers::delete_comment),
        )
}

pub fn votes() -> Router<AppState> {
    VoteKind::ALL
        .into_iter()
        .fold(Router::new(), |router, kind| {
            let family = match kind.target {
                TargetKind::Post => vote_family::<CastPostVoteRequest, UpdatePostVoteRequest>(kind),
                TargetKind::Comment => {
                    vote_family::<CastCommentVoteRequest, UpdateCommentVoteRequest>(kind)
                }
            };
            router.merge(family)
        })
}

/// `/<collection>` and `/<collection>/:id` for one vote kind, reading request
/// bodies as `C` (cast) and `U` (retarget).
fn vote_family<C: CastVoteBody, U: UpdateVoteBody>(kind: VoteKind) -> Router<AppState> {
    let collection = format!("/{}", kind.collection());
    let member = format!("/{}/:id", kind.collection());

    Router::new()
        .route(
            &collection,
            get(move |state: State<AppState>, query: Query<ForeignKeyQuery>| {
                handlers::list_votes(kind, state, query)
            })
            .post(
                move |auth: AuthUser, state: State<AppState>, payload: Json<C>| {
                    handlers::cast_vote::<C>(kind, auth, state, payload)
                },
            ),
        )
        .route(
            &member,
            get(move |id: Path<Uuid>, state: State<AppState>| {
                handlers::get_vote(kind, id, state)
            })
            .patch(
                move |id: Path<Uuid>,
                      auth: AuthUser,
                      state: State<AppState>,
                      payload: Json<U>| {
                    handlers::update_vote::<U>(kind, id, auth, state, payload)
                },
            )
            .delete(
                move |id: Path<Uuid>, auth: AuthUser, state: State<AppState>| {
                    handlers::remove_vote(kind, id, auth, state)
                },
            ),
        )
}
