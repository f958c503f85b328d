pub mod auth;
pub mod comments;
pub mod counters;
pub mod error;
pub mod ownership;
pub mod posts;
pub mod query;
pub mod users;
pub mod votes;
