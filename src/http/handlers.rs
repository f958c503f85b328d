use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::auth::AuthService;
use crate::app::comments::CommentService;
use crate::app::counters::{CounterSync, ReconcileReport, Reconciliation, RepairStrategy};
use crate::app::posts::PostService;
use crate::app::query::{Entity, EntityKind, Filter, QueryFacade};
use crate::app::users::UserService;
use crate::app::votes::VoteLedger;
use crate::domain::engagement::{Comment, CommentPatch};
use crate::domain::post::{Post, PostPatch};
use crate::domain::user::User;
use crate::domain::vote::{Vote, VoteKind, VotePatch};
use crate::http::sanitize::{non_blank, RemoveBlanks};
use crate::http::{AdminToken, AppError, AuthUser};
use crate::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<Uuid>,
}

/// `?post=` / `?comment=` filters, named after the foreign key they match.
#[derive(Deserialize, Default)]
pub struct ForeignKeyQuery {
    pub post: Option<Uuid>,
    pub comment: Option<Uuid>,
}

impl ForeignKeyQuery {
    fn filter(&self) -> Result<Filter, AppError> {
        match (self.post, self.comment) {
            (None, None) => Ok(Filter::All),
            (Some(post_id), None) => Ok(Filter::PostId(post_id)),
            (None, Some(comment_id)) => Ok(Filter::CommentId(comment_id)),
            (Some(_), Some(_)) => Err(AppError::bad_request(
                "filter by post or comment, not both",
            )),
        }
    }
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.store.ping().await.is_ok() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse { status })
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub handle: String,
    pub email: String,
}

#[derive(Serialize)]
pub struct CreateUserResponse {
    pub user: User,
    pub access_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

pub async fn create_user(
    _admin: AdminToken,
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<CreateUserResponse>), AppError> {
    let service = UserService::new(state.store.clone());
    let user = service
        .create_user(payload.handle, payload.email)
        .await
        .map_err(|err| AppError::from_service(err, "failed to create user"))?;

    let auth = AuthService::new(state.paseto_access_key, state.access_ttl_minutes);
    let token = auth.issue_access_token(user.id).map_err(|err| {
        tracing::error!(error = ?err, user_id = %user.id, "failed to issue access token");
        AppError::internal("failed to issue access token")
    })?;

    tracing::info!(user_id = %user.id, handle = %user.handle, "user created");
    Ok((
        StatusCode::CREATED,
        Json(CreateUserResponse {
            user,
            access_token: token.token,
            expires_at: token.expires_at,
        }),
    ))
}

#[derive(Deserialize, Default)]
pub struct ReconcileQuery {
    pub strategy: Option<RepairStrategy>,
}

pub async fn reconcile_post(
    _admin: AdminToken,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Query(query): Query<ReconcileQuery>,
) -> Result<Json<Reconciliation>, AppError> {
    let strategy = query.strategy.unwrap_or(state.reconcile_strategy);
    let counters = CounterSync::new(state.store.clone());
    let reconciliation = counters
        .reconcile(id, strategy.repairer())
        .await
        .map_err(|err| AppError::from_service(err, "failed to reconcile post"))?;

    Ok(Json(reconciliation))
}

pub async fn reconcile_all(
    _admin: AdminToken,
    State(state): State<AppState>,
    Query(query): Query<ReconcileQuery>,
) -> Result<Json<ReconcileReport>, AppError> {
    let strategy = query.strategy.unwrap_or(state.reconcile_strategy);
    let counters = CounterSync::new(state.store.clone());
    let report = counters
        .reconcile_all(strategy.repairer())
        .await
        .map_err(|err| AppError::from_service(err, "failed to reconcile posts"))?;

    Ok(Json(report))
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub async fn get_user(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<User>, AppError> {
    let service = UserService::new(state.store.clone());
    let user = service
        .get_user(id)
        .await
        .map_err(|err| AppError::from_service(err, "failed to fetch user"))?;

    Ok(Json(user))
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub text: String,
    pub email: String,
}

#[derive(Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub text: Option<String>,
    pub email: Option<String>,
}

impl RemoveBlanks for UpdatePostRequest {
    fn remove_blanks(self) -> Self {
        Self {
            title: non_blank(self.title),
            text: non_blank(self.text),
            email: non_blank(self.email),
        }
    }
}

pub async fn list_posts(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<Entity>>, AppError> {
    let facade = QueryFacade::new(state.store.clone());
    let posts = facade
        .list(EntityKind::Post, Filter::All)
        .await
        .map_err(|err| AppError::from_service(err, "failed to list posts"))?;

    Ok(Json(ListResponse {
        items: posts,
        post: None,
        comment: None,
    }))
}

pub async fn get_post(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Entity>, AppError> {
    let facade = QueryFacade::new(state.store.clone());
    let post = facade
        .get_by_id(EntityKind::Post, id)
        .await
        .map_err(|err| AppError::from_service(err, "failed to fetch post"))?;

    Ok(Json(post))
}

pub async fn create_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), AppError> {
    let service = PostService::new(state.store.clone());
    let post = service
        .create_post(auth.user_id, payload.title, payload.text, payload.email)
        .await
        .map_err(|err| AppError::from_service(err, "failed to create post"))?;

    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn update_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<StatusCode, AppError> {
    let payload = payload.remove_blanks();
    let patch = PostPatch {
        title: payload.title,
        email: payload.email,
        text: payload.text,
    };

    let service = PostService::new(state.store.clone());
    service
        .update_post(id, auth.user_id, patch)
        .await
        .map_err(|err| AppError::from_service(err, "failed to update post"))?;

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    pub post_id: Uuid,
    pub text: String,
    pub email: String,
}

#[derive(Deserialize)]
pub struct UpdateCommentRequest {
    pub text: Option<String>,
    pub email: Option<String>,
}

impl RemoveBlanks for UpdateCommentRequest {
    fn remove_blanks(self) -> Self {
        Self {
            text: non_blank(self.text),
            email: non_blank(self.email),
        }
    }
}

pub async fn list_comments(
    State(state): State<AppState>,
    Query(query): Query<ForeignKeyQuery>,
) -> Result<Json<ListResponse<Entity>>, AppError> {
    let filter = query.filter()?;
    let facade = QueryFacade::new(state.store.clone());
    let comments = facade
        .list(EntityKind::Comment, filter)
        .await
        .map_err(|err| AppError::from_service(err, "failed to list comments"))?;

    Ok(Json(ListResponse {
        items: comments,
        post: query.post,
        comment: None,
    }))
}

pub async fn get_comment(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Entity>, AppError> {
    let facade = QueryFacade::new(state.store.clone());
    let comment = facade
        .get_by_id(EntityKind::Comment, id)
        .await
        .map_err(|err| AppError::from_service(err, "failed to fetch comment"))?;

    Ok(Json(comment))
}

pub async fn create_comment(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    let service = CommentService::new(state.store.clone());
    let comment = service
        .create(auth.user_id, payload.post_id, payload.text, payload.email)
        .await
        .map_err(|err| AppError::from_service(err, "failed to create comment"))?;

    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn update_comment(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateCommentRequest>,
) -> Result<StatusCode, AppError> {
    let payload = payload.remove_blanks();
    let patch = CommentPatch {
        text: payload.text,
        email: payload.email,
    };

    let service = CommentService::new(state.store.clone());
    service
        .update(id, auth.user_id, patch)
        .await
        .map_err(|err| AppError::from_service(err, "failed to update comment"))?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_comment(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = CommentService::new(state.store.clone());
    service
        .delete(id, auth.user_id)
        .await
        .map_err(|err| AppError::from_service(err, "failed to delete comment"))?;

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Votes. Every handler takes the kind its route family was mounted with.
// ---------------------------------------------------------------------------

/// Body of a cast. Each target kind has its own shape, so a post vote only
/// accepts `post_id` and a comment vote only accepts `comment_id`.
pub trait CastVoteBody: DeserializeOwned + Send + 'static {
    fn target_id(&self) -> Uuid;
}

/// Body of a retarget, read after blank fields are removed.
pub trait UpdateVoteBody: DeserializeOwned + RemoveBlanks + Send + 'static {
    fn target_id(self) -> Result<Option<String>, AppError>;
}

#[derive(Deserialize)]
pub struct CastPostVoteRequest {
    #[serde(alias = "target_id")]
    pub post_id: Uuid,
}

impl CastVoteBody for CastPostVoteRequest {
    fn target_id(&self) -> Uuid {
        self.post_id
    }
}

#[derive(Deserialize)]
pub struct CastCommentVoteRequest {
    #[serde(alias = "target_id")]
    pub comment_id: Uuid,
}

impl CastVoteBody for CastCommentVoteRequest {
    fn target_id(&self) -> Uuid {
        self.comment_id
    }
}

// `owner_id` is tolerated and dropped; the other kind's key is refused.
#[derive(Deserialize)]
pub struct UpdatePostVoteRequest {
    #[serde(alias = "target_id")]
    pub post_id: Option<String>,
    pub comment_id: Option<IgnoredAny>,
}

impl RemoveBlanks for UpdatePostVoteRequest {
    fn remove_blanks(self) -> Self {
        Self {
            post_id: non_blank(self.post_id),
            comment_id: self.comment_id,
        }
    }
}

impl UpdateVoteBody for UpdatePostVoteRequest {
    fn target_id(self) -> Result<Option<String>, AppError> {
        if self.comment_id.is_some() {
            return Err(AppError::bad_request("post votes are retargeted by post_id"));
        }
        Ok(self.post_id)
    }
}

#[derive(Deserialize)]
pub struct UpdateCommentVoteRequest {
    #[serde(alias = "target_id")]
    pub comment_id: Option<String>,
    pub post_id: Option<IgnoredAny>,
}

impl RemoveBlanks for UpdateCommentVoteRequest {
    fn remove_blanks(self) -> Self {
        Self {
            comment_id: non_blank(self.comment_id),
            post_id: self.post_id,
        }
    }
}

impl UpdateVoteBody for UpdateCommentVoteRequest {
    fn target_id(self) -> Result<Option<String>, AppError> {
        if self.post_id.is_some() {
            return Err(AppError::bad_request("comment votes are retargeted by comment_id"));
        }
        Ok(self.comment_id)
    }
}

pub async fn list_votes(
    kind: VoteKind,
    State(state): State<AppState>,
    Query(query): Query<ForeignKeyQuery>,
) -> Result<Json<ListResponse<Entity>>, AppError> {
    let filter = query.filter()?;
    let facade = QueryFacade::new(state.store.clone());
    let votes = facade
        .list(EntityKind::Vote(kind), filter)
        .await
        .map_err(|err| AppError::from_service(err, "failed to list votes"))?;

    Ok(Json(ListResponse {
        items: votes,
        post: query.post,
        comment: query.comment,
    }))
}

pub async fn get_vote(
    kind: VoteKind,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Entity>, AppError> {
    let facade = QueryFacade::new(state.store.clone());
    let vote = facade
        .get_by_id(EntityKind::Vote(kind), id)
        .await
        .map_err(|err| AppError::from_service(err, "failed to fetch vote"))?;

    Ok(Json(vote))
}

pub async fn cast_vote<B: CastVoteBody>(
    kind: VoteKind,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<B>,
) -> Result<(StatusCode, Json<Vote>), AppError> {
    let ledger = VoteLedger::new(state.store.clone());
    let vote = ledger
        .cast(auth.user_id, payload.target_id(), kind)
        .await
        .map_err(|err| AppError::from_service(err, "failed to cast vote"))?;

    Ok((StatusCode::CREATED, Json(vote)))
}

pub async fn update_vote<B: UpdateVoteBody>(
    kind: VoteKind,
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<B>,
) -> Result<StatusCode, AppError> {
    let target_id = payload
        .remove_blanks()
        .target_id()?
        .map(|value| Uuid::parse_str(&value))
        .transpose()
        .map_err(|_| AppError::bad_request("target id must be a uuid"))?;

    let ledger = VoteLedger::new(state.store.clone());
    ledger
        .update(kind, id, auth.user_id, VotePatch { target_id })
        .await
        .map_err(|err| AppError::from_service(err, "failed to update vote"))?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_vote(
    kind: VoteKind,
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let ledger = VoteLedger::new(state.store.clone());
    ledger
        .remove(kind, id, auth.user_id)
        .await
        .map_err(|err| AppError::from_service(err, "failed to remove vote"))?;

    Ok(StatusCode::NO_CONTENT)
}
