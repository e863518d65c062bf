pub mod ban;
pub mod member;
pub mod membership;
pub mod message;
pub mod room;
pub mod team;
pub mod vote;
