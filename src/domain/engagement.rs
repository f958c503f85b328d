use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub post_id: Uuid,
    pub text: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub owner_id: Uuid,
    pub post_id: Uuid,
    pub text: String,
    pub email: String,
}

#[derive(Debug, Clone, Default)]
pub struct CommentPatch {
    pub text: Option<String>,
    pub email: Option<String>,
}

impl CommentPatch {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.email.is_none()
    }
}

/// Why a post's `amount` moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterCause {
    CommentCreated,
    CommentDeleted,
    Repair,
}

impl CounterCause {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "comment_created" => Some(Self::CommentCreated),
            "comment_deleted" => Some(Self::CommentDeleted),
            "repair" => Some(Self::Repair),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::CommentCreated => "comment_created",
            Self::CommentDeleted => "comment_deleted",
            Self::Repair => "repair",
        }
    }
}

/// One entry of the append-only counter log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterEvent {
    pub id: Uuid,
    pub post_id: Uuid,
    pub delta: i64,
    pub cause: CounterCause,
    pub comment_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// What a counter repair recomputes `amount` from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairBasis {
    /// Comments currently stored against the post.
    CommentCount,
    /// Sum of the post's counter log.
    CounterLog,
}

/// Result of one counter repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterRepairOutcome {
    pub before: i64,
    pub after: i64,
    /// Delta of the `repair` event appended to the log, 0 when none was.
    pub correction: i64,
}
