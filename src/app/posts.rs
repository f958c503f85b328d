use std::sync::Arc;

use uuid::Uuid;

use crate::app::error::{require_text, ServiceError, ServiceResult};
use crate::app::ownership::require_ownership;
use crate::domain::post::{NewPost, Post, PostPatch};
use crate::infra::store::EntityStore;

#[derive(Clone)]
pub struct PostService {
    store: Arc<dyn EntityStore>,
}

impl PostService {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    pub async fn create_post(
        &self,
        owner_id: Uuid,
        title: String,
        text: String,
        email: String,
    ) -> ServiceResult<Post> {
        require_text("title", &title)?;
        require_text("text", &text)?;
        require_text("email", &email)?;

        let post = self
            .store
            .insert_post(NewPost {
                owner_id,
                title,
                email,
                text,
            })
            .await?;
        Ok(post)
    }

    pub async fn update_post(&self, post_id: Uuid, acting_user_id: Uuid, patch: PostPatch) -> ServiceResult<()> {
        let post = self
            .store
            .get_post(post_id)
            .await?
            .ok_or(ServiceError::NotFound("post"))?;
        require_ownership(acting_user_id, &post)?;

        if patch.is_empty() {
            return Ok(());
        }
        if !self.store.update_post(post_id, &patch).await? {
            return Err(ServiceError::NotFound("post"));
        }
        Ok(())
    }
}
