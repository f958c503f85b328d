use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::app::error::{ServiceError, ServiceResult};
use crate::domain::engagement::Comment;
use crate::domain::post::Post;
use crate::domain::vote::{TargetKind, Vote, VoteKind};
use crate::infra::store::EntityStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Post,
    Comment,
    Vote(VoteKind),
}

/// Exact match on a single foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Filter {
    #[default]
    All,
    PostId(Uuid),
    CommentId(Uuid),
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Entity {
    Post(Post),
    Comment(Comment),
    Vote(Vote),
}

/// Read-only listing and lookup over posts, comments and votes.
#[derive(Clone)]
pub struct QueryFacade {
    store: Arc<dyn EntityStore>,
}

impl QueryFacade {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self, kind: EntityKind, filter: Filter) -> ServiceResult<Vec<Entity>> {
        let entities = match (kind, filter) {
            (EntityKind::Post, Filter::All) => self
                .store
                .list_posts()
                .await?
                .into_iter()
                .map(Entity::Post)
                .collect(),
            (EntityKind::Comment, Filter::All) => self.comments(None).await?,
            (EntityKind::Comment, Filter::PostId(post_id)) => self.comments(Some(post_id)).await?,
            (EntityKind::Vote(vote_kind), Filter::All) => self.votes(vote_kind, None).await?,
            (EntityKind::Vote(vote_kind), Filter::PostId(post_id))
                if vote_kind.target == TargetKind::Post =>
            {
                self.votes(vote_kind, Some(post_id)).await?
            }
            (EntityKind::Vote(vote_kind), Filter::CommentId(comment_id))
                if vote_kind.target == TargetKind::Comment =>
            {
                self.votes(vote_kind, Some(comment_id)).await?
            }
            _ => {
                return Err(ServiceError::Validation(
                    "filter does not apply to this collection".to_string(),
                ))
            }
        };
        Ok(entities)
    }

    pub async fn get_by_id(&self, kind: EntityKind, id: Uuid) -> ServiceResult<Entity> {
        let entity = match kind {
            EntityKind::Post => self
                .store
                .get_post(id)
                .await?
                .map(Entity::Post)
                .ok_or(ServiceError::NotFound("post"))?,
            EntityKind::Comment => self
                .store
                .get_comment(id)
                .await?
                .map(Entity::Comment)
                .ok_or(ServiceError::NotFound("comment"))?,
            EntityKind::Vote(vote_kind) => self
                .store
                .get_vote(id)
                .await?
                .filter(|vote| vote.kind() == vote_kind)
                .map(Entity::Vote)
                .ok_or(ServiceError::NotFound("vote"))?,
        };
        Ok(entity)
    }

    async fn comments(&self, post_id: Option<Uuid>) -> ServiceResult<Vec<Entity>> {
        let comments = self.store.list_comments(post_id).await?;
        Ok(comments.into_iter().map(Entity::Comment).collect())
    }

    async fn votes(&self, kind: VoteKind, target_id: Option<Uuid>) -> ServiceResult<Vec<Entity>> {
        let votes = self.store.list_votes(kind, target_id).await?;
        Ok(votes.into_iter().map(Entity::Vote).collect())
    }
}
