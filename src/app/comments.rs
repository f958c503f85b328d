use std::sync::Arc;

use uuid::Uuid;

use crate::app::counters::CounterSync;
use crate::app::error::{require_text, ServiceError, ServiceResult};
use crate::app::ownership::require_ownership;
use crate::domain::engagement::{Comment, CommentPatch, NewComment};
use crate::infra::store::EntityStore;

#[derive(Clone)]
pub struct CommentService {
    store: Arc<dyn EntityStore>,
    counters: CounterSync,
}

impl CommentService {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        let counters = CounterSync::new(store.clone());
        Self { store, counters }
    }

    /// Stores the comment, then bumps the post's amount. A failed bump does
    /// not undo the comment; the reconciler picks up the drift.
    pub async fn create(
        &self,
        owner_id: Uuid,
        post_id: Uuid,
        text: String,
        email: String,
    ) -> ServiceResult<Comment> {
        require_text("text", &text)?;
        require_text("email", &email)?;

        let comment = self
            .store
            .insert_comment(NewComment {
                owner_id,
                post_id,
                text,
                email,
            })
            .await?;

        match self.counters.on_comment_created(post_id, comment.id).await {
            Ok(_) => {}
            Err(ServiceError::NotFound(_)) => {
                tracing::warn!(
                    comment_id = %comment.id,
                    post_id = %post_id,
                    "comment created for missing post, amount not incremented"
                );
            }
            Err(err) => {
                tracing::error!(
                    error = ?err,
                    comment_id = %comment.id,
                    post_id = %post_id,
                    "failed to increment post amount"
                );
            }
        }

        Ok(comment)
    }

    pub async fn update(&self, comment_id: Uuid, acting_user_id: Uuid, patch: CommentPatch) -> ServiceResult<()> {
        let comment = self.load(comment_id).await?;
        require_ownership(acting_user_id, &comment)?;

        if patch.is_empty() {
            return Ok(());
        }
        if !self.store.update_comment(comment_id, &patch).await? {
            return Err(ServiceError::NotFound("comment"));
        }
        Ok(())
    }

    /// Ownership is settled before the counter moves, and the counter moves
    /// before the row goes away so the post is still reachable through it.
    pub async fn delete(&self, comment_id: Uuid, acting_user_id: Uuid) -> ServiceResult<()> {
        let comment = self.load(comment_id).await?;
        require_ownership(acting_user_id, &comment)?;

        // A concurrent delete of the same comment has already moved the counter.
        match self
            .counters
            .on_comment_deleted(comment.post_id, comment.id)
            .await
        {
            Ok(_) => {}
            Err(ServiceError::Conflict(_)) => {
                tracing::debug!(
                    comment_id = %comment.id,
                    post_id = %comment.post_id,
                    "post amount already decremented for comment"
                );
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    comment_id = %comment.id,
                    post_id = %comment.post_id,
                    "failed to decrement post amount"
                );
            }
        }

        if !self.store.delete_comment(comment_id).await? {
            return Err(ServiceError::NotFound("comment"));
        }
        Ok(())
    }

    async fn load(&self, comment_id: Uuid) -> ServiceResult<Comment> {
        self.store
            .get_comment(comment_id)
            .await?
            .ok_or(ServiceError::NotFound("comment"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::posts::PostService;
    use crate::infra::store::MemoryStore;

    async fn seeded() -> (Arc<dyn EntityStore>, Uuid, Uuid, Uuid) {
        let store: Arc<dyn EntityStore> = Arc::new(MemoryStore::new());
        let owner = Uuid::new_v4();
        let post_id = PostService::new(store.clone())
            .create_post(owner, "title".into(), "text".into(), "p@example.com".into())
            .await
            .unwrap()
            .id;
        let comment_id = CommentService::new(store.clone())
            .create(owner, post_id, "hi".into(), "c@example.com".into())
            .await
            .unwrap()
            .id;
        (store, owner, post_id, comment_id)
    }

    async fn amount(store: &Arc<dyn EntityStore>, post_id: Uuid) -> i64 {
        store.get_post(post_id).await.unwrap().unwrap().amount
    }

    #[tokio::test]
    async fn overlapping_deletes_decrement_once() {
        let (store, owner, post_id, comment_id) = seeded().await;
        assert_eq!(amount(&store, post_id).await, 1);

        // The other delete has moved the counter but not yet removed the row.
        CounterSync::new(store.clone())
            .on_comment_deleted(post_id, comment_id)
            .await
            .unwrap();

        CommentService::new(store.clone())
            .delete(comment_id, owner)
            .await
            .unwrap();

        assert_eq!(amount(&store, post_id).await, 0);
        assert!(store.get_comment(comment_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn second_decrement_for_a_comment_conflicts() {
        let (store, _owner, post_id, comment_id) = seeded().await;
        let counters = CounterSync::new(store.clone());

        counters.on_comment_deleted(post_id, comment_id).await.unwrap();
        let err = counters
            .on_comment_deleted(post_id, comment_id)
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Conflict(_)));
        assert_eq!(amount(&store, post_id).await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_deletes_leave_amount_at_zero() {
        let (store, owner, post_id, comment_id) = seeded().await;

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let comments = CommentService::new(store.clone());
                tokio::spawn(async move { comments.delete(comment_id, owner).await })
            })
            .collect();
        let mut deleted = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(()) => deleted += 1,
                Err(ServiceError::NotFound(_)) => {}
                Err(err) => panic!("unexpected error: {err}"),
            }
        }

        assert_eq!(deleted, 1);
        assert_eq!(amount(&store, post_id).await, 0);
    }
}
