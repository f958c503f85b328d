use uuid::Uuid;

use crate::app::error::{ServiceError, ServiceResult};
use crate::domain::engagement::Comment;
use crate::domain::post::Post;
use crate::domain::vote::Vote;

/// A record with a single authorized mutator.
pub trait Owned {
    fn owner_id(&self) -> Uuid;
}

impl Owned for Post {
    fn owner_id(&self) -> Uuid {
        self.owner_id
    }
}

impl Owned for Comment {
    fn owner_id(&self) -> Uuid {
        self.owner_id
    }
}

impl Owned for Vote {
    fn owner_id(&self) -> Uuid {
        self.owner_id
    }
}

pub fn require_ownership<T: Owned + ?Sized>(acting_user_id: Uuid, record: &T) -> ServiceResult<()> {
    if record.owner_id() != acting_user_id {
        return Err(ServiceError::NotOwner);
    }
    Ok(())
}
