//! Keyed storage for users, posts, comments, votes and the counter log.
//!
//! Services talk to an [`EntityStore`] trait object so the same rules run
//! against PostgreSQL in production and against [`MemoryStore`] in tests and
//! local runs.

mod memory;
mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::engagement::{
    Comment, CommentPatch, CounterCause, CounterEvent, CounterRepairOutcome, NewComment, RepairBasis,
};
use crate::domain::post::{NewPost, Post, PostPatch};
use crate::domain::user::{NewUser, User};
use crate::domain::vote::{NewVote, Vote, VoteKind, VotePatch};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write. Nothing was persisted.
    #[error("uniqueness constraint violated")]
    Conflict,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store lock poisoned")]
    Poisoned,
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;

    /// Fails with [`StoreError::Conflict`] when the handle or email is taken.
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    async fn insert_post(&self, post: NewPost) -> StoreResult<Post>;
    async fn get_post(&self, id: Uuid) -> StoreResult<Option<Post>>;
    async fn list_posts(&self) -> StoreResult<Vec<Post>>;
    /// Returns `false` when no post has this id.
    async fn update_post(&self, id: Uuid, patch: &PostPatch) -> StoreResult<bool>;

    /// Moves `amount` by `delta` and appends the matching counter event as one
    /// write. Returns `None`, with nothing logged, when the post is missing.
    /// A comment moves the counter at most once per cause; a repeat yields
    /// [`StoreError::Conflict`] and changes nothing.
    async fn apply_counter_delta(
        &self,
        post_id: Uuid,
        delta: i64,
        cause: CounterCause,
        comment_id: Option<Uuid>,
    ) -> StoreResult<Option<Post>>;
    /// Overwrites `amount` without touching the counter log.
    async fn set_post_amount(&self, post_id: Uuid, amount: i64) -> StoreResult<Option<Post>>;
    /// Recomputes `amount` from `basis` and, when the counter log no longer
    /// sums to the result, appends a `repair` event for the difference. The
    /// reads and both writes form one step that concurrent counter moves on
    /// the same post cannot interleave with. `None` when the post is missing.
    async fn repair_counter(
        &self,
        post_id: Uuid,
        basis: RepairBasis,
    ) -> StoreResult<Option<CounterRepairOutcome>>;
    async fn list_counter_events(&self, post_id: Uuid) -> StoreResult<Vec<CounterEvent>>;

    async fn insert_comment(&self, comment: NewComment) -> StoreResult<Comment>;
    async fn get_comment(&self, id: Uuid) -> StoreResult<Option<Comment>>;
    async fn list_comments(&self, post_id: Option<Uuid>) -> StoreResult<Vec<Comment>>;
    async fn count_comments(&self, post_id: Uuid) -> StoreResult<i64>;
    async fn update_comment(&self, id: Uuid, patch: &CommentPatch) -> StoreResult<bool>;
    async fn delete_comment(&self, id: Uuid) -> StoreResult<bool>;

    /// Atomic insert-if-absent keyed on (owner, kind, target). An existing
    /// vote with the same key yields [`StoreError::Conflict`].
    async fn insert_vote(&self, vote: NewVote) -> StoreResult<Vote>;
    async fn get_vote(&self, id: Uuid) -> StoreResult<Option<Vote>>;
    async fn list_votes(&self, kind: VoteKind, target_id: Option<Uuid>) -> StoreResult<Vec<Vote>>;
    /// Same uniqueness rule as [`EntityStore::insert_vote`] for the new target.
    async fn update_vote(&self, id: Uuid, patch: &VotePatch) -> StoreResult<bool>;
    async fn delete_vote(&self, id: Uuid) -> StoreResult<bool>;
}
