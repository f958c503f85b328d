use std::sync::Arc;

use uuid::Uuid;

use crate::app::error::{require_text, ServiceError, ServiceResult};
use crate::domain::user::{NewUser, User};
use crate::infra::store::{EntityStore, StoreError};

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn EntityStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    pub async fn create_user(&self, handle: String, email: String) -> ServiceResult<User> {
        require_text("handle", &handle)?;
        require_text("email", &email)?;

        match self.store.insert_user(NewUser { handle, email }).await {
            Ok(user) => Ok(user),
            Err(StoreError::Conflict) => Err(ServiceError::Conflict(
                "handle or email already taken".to_string(),
            )),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn get_user(&self, user_id: Uuid) -> ServiceResult<User> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or(ServiceError::NotFound("user"))
    }
}
