//! Keeps `Post::amount` in step with comment creation and removal.
//!
//! Each comment event moves the counter by exactly one and is logged in the
//! counter log in the same write. The counter update is not transactional
//! with the comment write it accompanies, so [`CounterSync::reconcile`]
//! offers a repair pass through a pluggable [`CounterRepair`] strategy.

use std::str::FromStr;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::error::{ServiceError, ServiceResult};
use crate::domain::engagement::{CounterCause, RepairBasis};
use crate::domain::post::Post;
use crate::infra::store::{EntityStore, StoreError};

const RECONCILE_CONCURRENCY: usize = 8;

/// Names what a post's `amount` should be recomputed from.
pub trait CounterRepair: Send + Sync {
    fn name(&self) -> &'static str;

    fn basis(&self) -> RepairBasis;
}

/// Recount: one point per comment currently stored against the post.
pub struct RecountComments;

impl CounterRepair for RecountComments {
    fn name(&self) -> &'static str {
        "recount"
    }

    fn basis(&self) -> RepairBasis {
        RepairBasis::CommentCount
    }
}

/// Replay: the sum of every delta in the post's counter log.
pub struct ReplayDeltaLog;

impl CounterRepair for ReplayDeltaLog {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn basis(&self) -> RepairBasis {
        RepairBasis::CounterLog
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairStrategy {
    #[default]
    Recount,
    Replay,
}

impl RepairStrategy {
    pub fn repairer(&self) -> &'static dyn CounterRepair {
        match self {
            Self::Recount => &RecountComments,
            Self::Replay => &ReplayDeltaLog,
        }
    }
}

impl FromStr for RepairStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "recount" => Ok(Self::Recount),
            "replay" => Ok(Self::Replay),
            other => Err(format!("unknown repair strategy: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Reconciliation {
    pub post_id: Uuid,
    pub strategy: &'static str,
    pub before: i64,
    pub after: i64,
    pub repaired: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub checked: usize,
    pub repaired: Vec<Reconciliation>,
}

#[derive(Clone)]
pub struct CounterSync {
    store: Arc<dyn EntityStore>,
}

impl CounterSync {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    pub async fn on_comment_created(&self, post_id: Uuid, comment_id: Uuid) -> ServiceResult<Post> {
        self.apply(post_id, 1, CounterCause::CommentCreated, comment_id)
            .await
    }

    /// Must run while the comment still exists, before it is removed.
    pub async fn on_comment_deleted(&self, post_id: Uuid, comment_id: Uuid) -> ServiceResult<Post> {
        self.apply(post_id, -1, CounterCause::CommentDeleted, comment_id)
            .await
    }

    async fn apply(
        &self,
        post_id: Uuid,
        delta: i64,
        cause: CounterCause,
        comment_id: Uuid,
    ) -> ServiceResult<Post> {
        let post = match self
            .store
            .apply_counter_delta(post_id, delta, cause, Some(comment_id))
            .await
        {
            Ok(Some(post)) => post,
            Ok(None) => return Err(ServiceError::NotFound("post")),
            Err(StoreError::Conflict) => {
                return Err(ServiceError::Conflict(format!(
                    "post amount already moved for {} of this comment",
                    cause.as_db()
                )))
            }
            Err(err) => return Err(err.into()),
        };

        tracing::debug!(
            post_id = %post_id,
            comment_id = %comment_id,
            delta,
            amount = post.amount,
            "post amount adjusted"
        );
        Ok(post)
    }

    /// Brings `amount` back to what `repair` computes. The counter log gets a
    /// `repair` entry whenever it no longer sums to the corrected amount.
    pub async fn reconcile(&self, post_id: Uuid, repair: &dyn CounterRepair) -> ServiceResult<Reconciliation> {
        let outcome = self
            .store
            .repair_counter(post_id, repair.basis())
            .await?
            .ok_or(ServiceError::NotFound("post"))?;

        let repaired = outcome.before != outcome.after;
        if repaired {
            tracing::warn!(
                post_id = %post_id,
                before = outcome.before,
                after = outcome.after,
                strategy = repair.name(),
                "repaired drifted post amount"
            );
        }
        if outcome.correction != 0 {
            tracing::debug!(
                post_id = %post_id,
                correction = outcome.correction,
                "counter log corrected"
            );
        }

        Ok(Reconciliation {
            post_id,
            strategy: repair.name(),
            before: outcome.before,
            after: outcome.after,
            repaired,
        })
    }

    pub async fn reconcile_all(&self, repair: &dyn CounterRepair) -> ServiceResult<ReconcileReport> {
        let posts = self.store.list_posts().await?;
        let checked = posts.len();

        let results: Vec<ServiceResult<Reconciliation>> = stream::iter(posts)
            .map(|post| self.reconcile(post.id, repair))
            .buffer_unordered(RECONCILE_CONCURRENCY)
            .collect()
            .await;

        let mut repaired = Vec::new();
        for result in results {
            let reconciliation = result?;
            if reconciliation.repaired {
                repaired.push(reconciliation);
            }
        }

        Ok(ReconcileReport { checked, repaired })
    }
}
