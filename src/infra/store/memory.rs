//! Process-local [`EntityStore`] for tests and `STORE_BACKEND=memory` runs.
//!
//! Every table is a `Vec` kept in insertion order behind a single `RwLock`,
//! so a uniqueness check and the insert it guards happen under one write
//! guard. Data is lost when the store is dropped.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{EntityStore, StoreError, StoreResult};
use crate::domain::engagement::{
    Comment, CommentPatch, CounterCause, CounterEvent, CounterRepairOutcome, NewComment, RepairBasis,
};
use crate::domain::post::{NewPost, Post, PostPatch};
use crate::domain::user::{NewUser, User};
use crate::domain::vote::{NewVote, Vote, VoteKind, VotePatch};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    posts: Vec<Post>,
    comments: Vec<Comment>,
    votes: Vec<Vote>,
    counter_events: Vec<CounterEvent>,
}

impl Tables {
    fn post_mut(&mut self, id: Uuid) -> Option<&mut Post> {
        self.posts.iter_mut().find(|post| post.id == id)
    }

    fn vote_taken(&self, owner_id: Uuid, kind: VoteKind, target_id: Uuid, except: Option<Uuid>) -> bool {
        self.votes.iter().any(|vote| {
            vote.owner_id == owner_id
                && vote.kind() == kind
                && vote.target_id == target_id
                && Some(vote.id) != except
        })
    }

    fn log_counter_event(
        &mut self,
        post_id: Uuid,
        delta: i64,
        cause: CounterCause,
        comment_id: Option<Uuid>,
    ) -> CounterEvent {
        let event = CounterEvent {
            id: Uuid::new_v4(),
            post_id,
            delta,
            cause,
            comment_id,
            created_at: OffsetDateTime::now_utc(),
        };
        self.counter_events.push(event.clone());
        event
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| StoreError::Poisoned)
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        self.read().map(|_| ())
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.write()?;
        let taken = tables
            .users
            .iter()
            .any(|existing| existing.handle == user.handle || existing.email == user.email);
        if taken {
            return Err(StoreError::Conflict);
        }

        let user = User {
            id: Uuid::new_v4(),
            handle: user.handle,
            email: user.email,
            created_at: OffsetDateTime::now_utc(),
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let tables = self.read()?;
        Ok(tables.users.iter().find(|user| user.id == id).cloned())
    }

    async fn insert_post(&self, post: NewPost) -> StoreResult<Post> {
        let now = OffsetDateTime::now_utc();
        let post = Post {
            id: Uuid::new_v4(),
            owner_id: post.owner_id,
            title: post.title,
            email: post.email,
            text: post.text,
            amount: 0,
            created_at: now,
            updated_at: now,
        };
        self.write()?.posts.push(post.clone());
        Ok(post)
    }

    async fn get_post(&self, id: Uuid) -> StoreResult<Option<Post>> {
        let tables = self.read()?;
        Ok(tables.posts.iter().find(|post| post.id == id).cloned())
    }

    async fn list_posts(&self) -> StoreResult<Vec<Post>> {
        Ok(self.read()?.posts.clone())
    }

    async fn update_post(&self, id: Uuid, patch: &PostPatch) -> StoreResult<bool> {
        let mut tables = self.write()?;
        let Some(post) = tables.post_mut(id) else {
            return Ok(false);
        };
        if let Some(title) = &patch.title {
            post.title = title.clone();
        }
        if let Some(email) = &patch.email {
            post.email = email.clone();
        }
        if let Some(text) = &patch.text {
            post.text = text.clone();
        }
        post.updated_at = OffsetDateTime::now_utc();
        Ok(true)
    }

    async fn apply_counter_delta(
        &self,
        post_id: Uuid,
        delta: i64,
        cause: CounterCause,
        comment_id: Option<Uuid>,
    ) -> StoreResult<Option<Post>> {
        let mut tables = self.write()?;
        if let Some(comment_id) = comment_id {
            let moved = tables
                .counter_events
                .iter()
                .any(|event| event.comment_id == Some(comment_id) && event.cause == cause);
            if moved {
                return Err(StoreError::Conflict);
            }
        }

        let Some(post) = tables.post_mut(post_id) else {
            return Ok(None);
        };
        post.amount += delta;
        post.updated_at = OffsetDateTime::now_utc();
        let post = post.clone();
        tables.log_counter_event(post_id, delta, cause, comment_id);
        Ok(Some(post))
    }

    async fn set_post_amount(&self, post_id: Uuid, amount: i64) -> StoreResult<Option<Post>> {
        let mut tables = self.write()?;
        Ok(tables.post_mut(post_id).map(|post| {
            post.amount = amount;
            post.updated_at = OffsetDateTime::now_utc();
            post.clone()
        }))
    }

    async fn repair_counter(
        &self,
        post_id: Uuid,
        basis: RepairBasis,
    ) -> StoreResult<Option<CounterRepairOutcome>> {
        let mut tables = self.write()?;
        let Some(before) = tables.post_mut(post_id).map(|post| post.amount) else {
            return Ok(None);
        };

        let logged: i64 = tables
            .counter_events
            .iter()
            .filter(|event| event.post_id == post_id)
            .map(|event| event.delta)
            .sum();
        let after = match basis {
            RepairBasis::CommentCount => tables
                .comments
                .iter()
                .filter(|comment| comment.post_id == post_id)
                .count() as i64,
            RepairBasis::CounterLog => logged,
        };

        if let Some(post) = tables.post_mut(post_id) {
            if post.amount != after {
                post.amount = after;
                post.updated_at = OffsetDateTime::now_utc();
            }
        }
        let correction = after - logged;
        if correction != 0 {
            tables.log_counter_event(post_id, correction, CounterCause::Repair, None);
        }

        Ok(Some(CounterRepairOutcome {
            before,
            after,
            correction,
        }))
    }

    async fn list_counter_events(&self, post_id: Uuid) -> StoreResult<Vec<CounterEvent>> {
        let tables = self.read()?;
        Ok(tables
            .counter_events
            .iter()
            .filter(|event| event.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn insert_comment(&self, comment: NewComment) -> StoreResult<Comment> {
        let now = OffsetDateTime::now_utc();
        let comment = Comment {
            id: Uuid::new_v4(),
            owner_id: comment.owner_id,
            post_id: comment.post_id,
            text: comment.text,
            email: comment.email,
            created_at: now,
            updated_at: now,
        };
        self.write()?.comments.push(comment.clone());
        Ok(comment)
    }

    async fn get_comment(&self, id: Uuid) -> StoreResult<Option<Comment>> {
        let tables = self.read()?;
        Ok(tables.comments.iter().find(|comment| comment.id == id).cloned())
    }

    async fn list_comments(&self, post_id: Option<Uuid>) -> StoreResult<Vec<Comment>> {
        let tables = self.read()?;
        Ok(tables
            .comments
            .iter()
            .filter(|comment| post_id.map_or(true, |post| comment.post_id == post))
            .cloned()
            .collect())
    }

    async fn count_comments(&self, post_id: Uuid) -> StoreResult<i64> {
        let tables = self.read()?;
        let count = tables
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .count();
        Ok(count as i64)
    }

    async fn update_comment(&self, id: Uuid, patch: &CommentPatch) -> StoreResult<bool> {
        let mut tables = self.write()?;
        let Some(comment) = tables.comments.iter_mut().find(|comment| comment.id == id) else {
            return Ok(false);
        };
        if let Some(text) = &patch.text {
            comment.text = text.clone();
        }
        if let Some(email) = &patch.email {
            comment.email = email.clone();
        }
        comment.updated_at = OffsetDateTime::now_utc();
        Ok(true)
    }

    async fn delete_comment(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.write()?;
        let before = tables.comments.len();
        tables.comments.retain(|comment| comment.id != id);
        Ok(tables.comments.len() < before)
    }

    async fn insert_vote(&self, vote: NewVote) -> StoreResult<Vote> {
        let mut tables = self.write()?;
        if tables.vote_taken(vote.owner_id, vote.kind, vote.target_id, None) {
            return Err(StoreError::Conflict);
        }

        let now = OffsetDateTime::now_utc();
        let vote = Vote {
            id: Uuid::new_v4(),
            owner_id: vote.owner_id,
            target_kind: vote.kind.target,
            target_id: vote.target_id,
            polarity: vote.kind.polarity,
            created_at: now,
            updated_at: now,
        };
        tables.votes.push(vote.clone());
        Ok(vote)
    }

    async fn get_vote(&self, id: Uuid) -> StoreResult<Option<Vote>> {
        let tables = self.read()?;
        Ok(tables.votes.iter().find(|vote| vote.id == id).cloned())
    }

    async fn list_votes(&self, kind: VoteKind, target_id: Option<Uuid>) -> StoreResult<Vec<Vote>> {
        let tables = self.read()?;
        Ok(tables
            .votes
            .iter()
            .filter(|vote| vote.kind() == kind)
            .filter(|vote| target_id.map_or(true, |target| vote.target_id == target))
            .cloned()
            .collect())
    }

    async fn update_vote(&self, id: Uuid, patch: &VotePatch) -> StoreResult<bool> {
        let mut tables = self.write()?;
        let Some(current) = tables.votes.iter().find(|vote| vote.id == id).cloned() else {
            return Ok(false);
        };

        if let Some(target_id) = patch.target_id {
            if tables.vote_taken(current.owner_id, current.kind(), target_id, Some(id)) {
                return Err(StoreError::Conflict);
            }
        }

        if let Some(vote) = tables.votes.iter_mut().find(|vote| vote.id == id) {
            if let Some(target_id) = patch.target_id {
                vote.target_id = target_id;
            }
            vote.updated_at = OffsetDateTime::now_utc();
        }
        Ok(true)
    }

    async fn delete_vote(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.write()?;
        let before = tables.votes.len();
        tables.votes.retain(|vote| vote.id != id);
        Ok(tables.votes.len() < before)
    }
}
