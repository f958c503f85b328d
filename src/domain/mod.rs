pub mod engagement;
pub mod post;
pub mod user;
pub mod vote;
