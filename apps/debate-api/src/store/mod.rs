//! Entity store: transactional reads and writes over rooms, rosters, votes
//! and messages.
//!
//! Functions take a connection rather than the pool so callers can compose
//! them inside one transaction. Constraint failures surface as
//! `RoomError::ConstraintViolation`, missing rows as `RoomError::NotFound`.

pub mod members;
pub mod messages;
pub mod rooms;
pub mod roster;
