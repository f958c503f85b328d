use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use super::{EntityStore, StoreError, StoreResult};
use crate::domain::engagement::{
    Comment, CommentPatch, CounterCause, CounterEvent, CounterRepairOutcome, NewComment, RepairBasis,
};
use crate::domain::post::{NewPost, Post, PostPatch};
use crate::domain::user::{NewUser, User};
use crate::domain::vote::{NewVote, Polarity, TargetKind, Vote, VoteKind, VotePatch};
use crate::infra::db::Db;

/// [`EntityStore`] backed by the PostgreSQL schema in `migrations/`.
///
/// Vote uniqueness relies on the `votes_unique_key` constraint over
/// (owner_id, target_kind, target_id, polarity).
#[derive(Clone)]
pub struct PgStore {
    db: Db,
}

impl PgStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

fn unique_violation(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => StoreError::Conflict,
        _ => StoreError::Database(err),
    }
}

fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        handle: row.get("handle"),
        email: row.get("email"),
        created_at: row.get("created_at"),
    }
}

fn post_from_row(row: &PgRow) -> Post {
    Post {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        title: row.get("title"),
        email: row.get("email"),
        text: row.get("text"),
        amount: row.get("amount"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn comment_from_row(row: &PgRow) -> Comment {
    Comment {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        post_id: row.get("post_id"),
        text: row.get("text"),
        email: row.get("email"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn vote_from_row(row: &PgRow) -> StoreResult<Vote> {
    let target_kind: String = row.get("target_kind");
    let target_kind = TargetKind::from_db(&target_kind)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown vote target kind: {}", target_kind)))?;
    let polarity: String = row.get("polarity");
    let polarity = Polarity::from_db(&polarity)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown vote polarity: {}", polarity)))?;

    Ok(Vote {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        target_kind,
        target_id: row.get("target_id"),
        polarity,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn counter_event_from_row(row: &PgRow) -> StoreResult<CounterEvent> {
    let cause: String = row.get("cause");
    let cause = CounterCause::from_db(&cause)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown counter cause: {}", cause)))?;

    Ok(CounterEvent {
        id: row.get("id"),
        post_id: row.get("post_id"),
        delta: row.get("delta"),
        cause,
        comment_id: row.get("comment_id"),
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl EntityStore for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(self.db.pool()).await?;
        Ok(())
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let row = sqlx::query(
            "INSERT INTO users (handle, email) VALUES ($1, $2) \
             RETURNING id, handle, email, created_at",
        )
        .bind(user.handle)
        .bind(user.email)
        .fetch_one(self.db.pool())
        .await
        .map_err(unique_violation)?;

        Ok(user_from_row(&row))
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row = sqlx::query("SELECT id, handle, email, created_at FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn insert_post(&self, post: NewPost) -> StoreResult<Post> {
        let row = sqlx::query(
            "INSERT INTO posts (owner_id, title, email, text) VALUES ($1, $2, $3, $4) \
             RETURNING id, owner_id, title, email, text, amount, created_at, updated_at",
        )
        .bind(post.owner_id)
        .bind(post.title)
        .bind(post.email)
        .bind(post.text)
        .fetch_one(self.db.pool())
        .await?;

        Ok(post_from_row(&row))
    }

    async fn get_post(&self, id: Uuid) -> StoreResult<Option<Post>> {
        let row = sqlx::query(
            "SELECT id, owner_id, title, email, text, amount, created_at, updated_at \
             FROM posts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(post_from_row))
    }

    async fn list_posts(&self) -> StoreResult<Vec<Post>> {
        let rows = sqlx::query(
            "SELECT id, owner_id, title, email, text, amount, created_at, updated_at \
             FROM posts \
             ORDER BY created_at, id",
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(post_from_row).collect())
    }

    async fn update_post(&self, id: Uuid, patch: &PostPatch) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE posts \
             SET title = COALESCE($2, title), \
                 email = COALESCE($3, email), \
                 text = COALESCE($4, text), \
                 updated_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(patch.title.as_deref())
        .bind(patch.email.as_deref())
        .bind(patch.text.as_deref())
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn apply_counter_delta(
        &self,
        post_id: Uuid,
        delta: i64,
        cause: CounterCause,
        comment_id: Option<Uuid>,
    ) -> StoreResult<Option<Post>> {
        let mut tx = self.db.pool().begin().await?;

        let row = sqlx::query(
            "UPDATE posts SET amount = amount + $2, updated_at = now() \
             WHERE id = $1 \
             RETURNING id, owner_id, title, email, text, amount, created_at, updated_at",
        )
        .bind(post_id)
        .bind(delta)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            "INSERT INTO counter_events (post_id, delta, cause, comment_id) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(post_id)
        .bind(delta)
        .bind(cause.as_db())
        .bind(comment_id)
        .execute(&mut *tx)
        .await
        .map_err(unique_violation)?;

        tx.commit().await?;

        Ok(Some(post_from_row(&row)))
    }

    async fn set_post_amount(&self, post_id: Uuid, amount: i64) -> StoreResult<Option<Post>> {
        let row = sqlx::query(
            "UPDATE posts SET amount = $2, updated_at = now() \
             WHERE id = $1 \
             RETURNING id, owner_id, title, email, text, amount, created_at, updated_at",
        )
        .bind(post_id)
        .bind(amount)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(post_from_row))
    }

    async fn repair_counter(
        &self,
        post_id: Uuid,
        basis: RepairBasis,
    ) -> StoreResult<Option<CounterRepairOutcome>> {
        let mut tx = self.db.pool().begin().await?;

        // The row lock holds off apply_counter_delta for this post until commit.
        let before: Option<i64> =
            sqlx::query_scalar("SELECT amount FROM posts WHERE id = $1 FOR UPDATE")
                .bind(post_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(before) = before else {
            tx.rollback().await?;
            return Ok(None);
        };

        let logged: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(delta), 0)::BIGINT FROM counter_events WHERE post_id = $1",
        )
        .bind(post_id)
        .fetch_one(&mut *tx)
        .await?;
        let after = match basis {
            RepairBasis::CommentCount => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM comments WHERE post_id = $1")
                    .bind(post_id)
                    .fetch_one(&mut *tx)
                    .await?
            }
            RepairBasis::CounterLog => logged,
        };

        if after != before {
            sqlx::query("UPDATE posts SET amount = $2, updated_at = now() WHERE id = $1")
                .bind(post_id)
                .bind(after)
                .execute(&mut *tx)
                .await?;
        }
        let correction = after - logged;
        if correction != 0 {
            sqlx::query(
                "INSERT INTO counter_events (post_id, delta, cause) VALUES ($1, $2, $3)",
            )
            .bind(post_id)
            .bind(correction)
            .bind(CounterCause::Repair.as_db())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(Some(CounterRepairOutcome {
            before,
            after,
            correction,
        }))
    }

    async fn list_counter_events(&self, post_id: Uuid) -> StoreResult<Vec<CounterEvent>> {
        let rows = sqlx::query(
            "SELECT id, post_id, delta, cause, comment_id, created_at \
             FROM counter_events \
             WHERE post_id = $1 \
             ORDER BY seq",
        )
        .bind(post_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(counter_event_from_row).collect()
    }

    async fn insert_comment(&self, comment: NewComment) -> StoreResult<Comment> {
        let row = sqlx::query(
            "INSERT INTO comments (owner_id, post_id, text, email) VALUES ($1, $2, $3, $4) \
             RETURNING id, owner_id, post_id, text, email, created_at, updated_at",
        )
        .bind(comment.owner_id)
        .bind(comment.post_id)
        .bind(comment.text)
        .bind(comment.email)
        .fetch_one(self.db.pool())
        .await?;

        Ok(comment_from_row(&row))
    }

    async fn get_comment(&self, id: Uuid) -> StoreResult<Option<Comment>> {
        let row = sqlx::query(
            "SELECT id, owner_id, post_id, text, email, created_at, updated_at \
             FROM comments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(comment_from_row))
    }

    async fn list_comments(&self, post_id: Option<Uuid>) -> StoreResult<Vec<Comment>> {
        let rows = sqlx::query(
            "SELECT id, owner_id, post_id, text, email, created_at, updated_at \
             FROM comments \
             WHERE $1::uuid IS NULL OR post_id = $1 \
             ORDER BY created_at, id",
        )
        .bind(post_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(comment_from_row).collect())
    }

    async fn count_comments(&self, post_id: Uuid) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    async fn update_comment(&self, id: Uuid, patch: &CommentPatch) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE comments \
             SET text = COALESCE($2, text), \
                 email = COALESCE($3, email), \
                 updated_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(patch.text.as_deref())
        .bind(patch.email.as_deref())
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_comment(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_vote(&self, vote: NewVote) -> StoreResult<Vote> {
        let row = sqlx::query(
            "INSERT INTO votes (owner_id, target_kind, target_id, polarity) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT ON CONSTRAINT votes_unique_key DO NOTHING \
             RETURNING id, owner_id, target_kind, target_id, polarity, created_at, updated_at",
        )
        .bind(vote.owner_id)
        .bind(vote.kind.target.as_db())
        .bind(vote.target_id)
        .bind(vote.kind.polarity.as_db())
        .fetch_optional(self.db.pool())
        .await?;

        match row {
            Some(row) => vote_from_row(&row),
            None => Err(StoreError::Conflict),
        }
    }

    async fn get_vote(&self, id: Uuid) -> StoreResult<Option<Vote>> {
        let row = sqlx::query(
            "SELECT id, owner_id, target_kind, target_id, polarity, created_at, updated_at \
             FROM votes WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref().map(vote_from_row).transpose()
    }

    async fn list_votes(&self, kind: VoteKind, target_id: Option<Uuid>) -> StoreResult<Vec<Vote>> {
        let rows = sqlx::query(
            "SELECT id, owner_id, target_kind, target_id, polarity, created_at, updated_at \
             FROM votes \
             WHERE target_kind = $1 AND polarity = $2 \
               AND ($3::uuid IS NULL OR target_id = $3) \
             ORDER BY created_at, id",
        )
        .bind(kind.target.as_db())
        .bind(kind.polarity.as_db())
        .bind(target_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(vote_from_row).collect()
    }

    async fn update_vote(&self, id: Uuid, patch: &VotePatch) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE votes \
             SET target_id = COALESCE($2, target_id), updated_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(patch.target_id)
        .execute(self.db.pool())
        .await
        .map_err(unique_violation)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_vote(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM votes WHERE id = $1")
            .bind(id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
