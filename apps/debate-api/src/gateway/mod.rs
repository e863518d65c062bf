//! Room gateway: one WebSocket session per viewer of a room.

pub mod events;
pub mod fanout;
pub mod handler;
pub mod server;
pub mod session;
