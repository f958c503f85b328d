use std::sync::Arc;

use uuid::Uuid;

use crate::app::error::{ServiceError, ServiceResult};
use crate::app::ownership::require_ownership;
use crate::domain::vote::{NewVote, Vote, VoteKind, VotePatch};
use crate::infra::store::{EntityStore, StoreError};

/// Casts, edits and removes votes of every [`VoteKind`].
///
/// Uniqueness of (voter, kind, target) is left to the store's atomic
/// insert-if-absent, never to a read followed by a write, so two identical
/// casts racing each other still leave a single record.
#[derive(Clone)]
pub struct VoteLedger {
    store: Arc<dyn EntityStore>,
}

impl VoteLedger {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    pub async fn cast(&self, user_id: Uuid, target_id: Uuid, kind: VoteKind) -> ServiceResult<Vote> {
        let vote = self
            .store
            .insert_vote(NewVote {
                owner_id: user_id,
                kind,
                target_id,
            })
            .await
            .map_err(duplicate_vote)?;

        tracing::debug!(
            vote_id = %vote.id,
            user_id = %user_id,
            target_id = %target_id,
            kind = kind.collection(),
            "vote cast"
        );
        Ok(vote)
    }

    /// A vote is only visible through the kind it was cast with.
    pub async fn get(&self, kind: VoteKind, vote_id: Uuid) -> ServiceResult<Vote> {
        self.store
            .get_vote(vote_id)
            .await?
            .filter(|vote| vote.kind() == kind)
            .ok_or(ServiceError::NotFound("vote"))
    }

    pub async fn update(
        &self,
        kind: VoteKind,
        vote_id: Uuid,
        acting_user_id: Uuid,
        patch: VotePatch,
    ) -> ServiceResult<()> {
        let vote = self.get(kind, vote_id).await?;
        require_ownership(acting_user_id, &vote)?;

        if patch.is_empty() {
            return Ok(());
        }
        let updated = self
            .store
            .update_vote(vote_id, &patch)
            .await
            .map_err(duplicate_vote)?;
        if !updated {
            return Err(ServiceError::NotFound("vote"));
        }
        Ok(())
    }

    pub async fn remove(&self, kind: VoteKind, vote_id: Uuid, acting_user_id: Uuid) -> ServiceResult<()> {
        let vote = self.get(kind, vote_id).await?;
        require_ownership(acting_user_id, &vote)?;

        if !self.store.delete_vote(vote_id).await? {
            return Err(ServiceError::NotFound("vote"));
        }
        tracing::debug!(vote_id = %vote_id, user_id = %acting_user_id, "vote removed");
        Ok(())
    }
}

fn duplicate_vote(err: StoreError) -> ServiceError {
    match err {
        StoreError::Conflict => ServiceError::DuplicateVote,
        other => other.into(),
    }
}
