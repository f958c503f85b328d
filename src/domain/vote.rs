use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Post,
    Comment,
}

impl TargetKind {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "post" => Some(Self::Post),
            "comment" => Some(Self::Comment),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Comment => "comment",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Up,
    Down,
}

impl Polarity {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

/// The (target kind, polarity) pair a vote is cast with.
///
/// Together with the voter and the target id this forms the uniqueness key
/// of a vote: a user holds at most one vote per kind per target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoteKind {
    pub target: TargetKind,
    pub polarity: Polarity,
}

impl VoteKind {
    pub const POST_UP: Self = Self::new(TargetKind::Post, Polarity::Up);
    pub const POST_DOWN: Self = Self::new(TargetKind::Post, Polarity::Down);
    pub const COMMENT_UP: Self = Self::new(TargetKind::Comment, Polarity::Up);
    pub const COMMENT_DOWN: Self = Self::new(TargetKind::Comment, Polarity::Down);

    pub const ALL: [Self; 4] = [
        Self::POST_UP,
        Self::POST_DOWN,
        Self::COMMENT_UP,
        Self::COMMENT_DOWN,
    ];

    pub const fn new(target: TargetKind, polarity: Polarity) -> Self {
        Self { target, polarity }
    }

    /// URL collection the kind is served under.
    pub fn collection(&self) -> &'static str {
        match (self.target, self.polarity) {
            (TargetKind::Post, Polarity::Up) => "upvotes",
            (TargetKind::Post, Polarity::Down) => "downvotes",
            (TargetKind::Comment, Polarity::Up) => "upvotecomments",
            (TargetKind::Comment, Polarity::Down) => "downvotecomments",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub target_kind: TargetKind,
    pub target_id: Uuid,
    pub polarity: Polarity,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Vote {
    pub fn kind(&self) -> VoteKind {
        VoteKind::new(self.target_kind, self.polarity)
    }
}

#[derive(Debug, Clone)]
pub struct NewVote {
    pub owner_id: Uuid,
    pub kind: VoteKind,
    pub target_id: Uuid,
}

/// The only thing a voter may change is which target the vote points at.
#[derive(Debug, Clone, Default)]
pub struct VotePatch {
    pub target_id: Option<Uuid>,
}

impl VotePatch {
    pub fn is_empty(&self) -> bool {
        self.target_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_have_distinct_collections() {
        let mut names: Vec<_> = VoteKind::ALL.iter().map(|kind| kind.collection()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 4);
    }

    #[test]
    fn db_names_round_trip() {
        for kind in VoteKind::ALL {
            assert_eq!(TargetKind::from_db(kind.target.as_db()), Some(kind.target));
            assert_eq!(Polarity::from_db(kind.polarity.as_db()), Some(kind.polarity));
        }
        assert_eq!(Polarity::from_db("sideways"), None);
    }
}
