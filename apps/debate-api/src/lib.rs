pub mod admission;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod permissions;
pub mod routes;
pub mod store;
pub mod tally;

use std::sync::Arc;

use config::Config;
use db::kv::KeyValueStore;
use db::pool::DbPool;
use debate_common::SnowflakeGenerator;
use gateway::fanout::RoomBroadcast;

/// Shared application state available to all route handlers and sessions.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub kv: Arc<dyn KeyValueStore>,
    pub config: Arc<Config>,
    pub snowflake: Arc<SnowflakeGenerator>,
    pub broadcast: Arc<RoomBroadcast>,
}
