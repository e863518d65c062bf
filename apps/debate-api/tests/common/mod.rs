#![allow(dead_code)]

use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum::Router;
use axum_test::TestServer;

use debate_api::auth::provision;
use debate_api::config::{with_test_db_suffix, Config};
use debate_api::db::kv::{KeyValueStore, MemoryStore};
use debate_api::db::pool::DbPool;
use debate_api::gateway::fanout::RoomBroadcast;
use debate_api::AppState;
use debate_common::id::{prefix, prefixed_ulid};
use debate_common::SnowflakeGenerator;

/// Build a test AppState against the `_test` database with an in-memory KV.
pub async fn test_state() -> AppState {
    let env_path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    let _ = dotenvy::from_path(env_path);

    let mut config = Config::from_env();
    config.database_url = with_test_db_suffix(&config.database_url);

    let db = debate_api::db::pool::connect(&config.database_url).expect("pool");
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());

    AppState {
        db,
        kv,
        snowflake: Arc::new(SnowflakeGenerator::new(0).expect("worker id")),
        broadcast: Arc::new(RoomBroadcast::new(config.room_channel_capacity)),
        config: Arc::new(config),
    }
}

/// Build the full application router wired to the test state.
pub async fn test_app() -> (Router, AppState) {
    let state = test_state().await;
    let app = debate_api::routes::router().with_state(state.clone());
    (app, state)
}

pub async fn test_server() -> (TestServer, AppState) {
    let (app, state) = test_app().await;
    (TestServer::new(app).expect("test server"), state)
}

/// A registered member with a live access token.
#[derive(Debug, Clone)]
pub struct TestMember {
    pub id: String,
    pub token: String,
}

impl TestMember {
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Register a member and mint a token for it, the way `debate-setup` does.
pub async fn create_member(state: &AppState, label: &str) -> TestMember {
    let suffix = prefixed_ulid(prefix::MEMBER);
    let username = format!("{label}_{}", &suffix[suffix.len() - 10..]);

    let mut conn = state.db.get().await.expect("pool");
    let (member, token) = provision::provision_member(&mut conn, state.kv.as_ref(), &username)
        .await
        .expect("provision member");

    TestMember {
        id: member.id,
        token,
    }
}

pub fn unique_title(label: &str) -> String {
    format!("{label} {}", prefixed_ulid(prefix::ROOM))
}

/// Create a room through the API and return its id.
pub async fn create_room(server: &TestServer, creator: &TestMember, capacity: i64) -> String {
    let resp = server
        .post("/api/v1/rooms")
        .add_header(AUTHORIZATION, creator.bearer())
        .json(&serde_json::json!({
            "title": unique_title("debate"),
            "first_team_name": "Pro",
            "second_team_name": "Contra",
            "max_participants_in_team": capacity,
        }))
        .await;
    resp.assert_status(StatusCode::CREATED);
    resp.json::<serde_json::Value>()["id"]
        .as_str()
        .unwrap()
        .to_string()
}

/// Seat a member on a team through the API.
pub async fn join(server: &TestServer, member: &TestMember, room_id: &str, team: i64) {
    server
        .post(&format!("/api/v1/rooms/{room_id}/users"))
        .add_header(AUTHORIZATION, member.bearer())
        .json(&serde_json::json!({ "team_number": team }))
        .await
        .assert_status(StatusCode::ACCEPTED);
}

pub async fn deactivate(server: &TestServer, creator: &TestMember, room_id: &str) {
    server
        .post(&format!("/api/v1/rooms/{room_id}/deactivate"))
        .add_header(AUTHORIZATION, creator.bearer())
        .await
        .assert_status(StatusCode::ACCEPTED);
}

/// Remove test members. Rooms they created and everything else they own
/// cascade away with them.
pub async fn cleanup_members(db: &DbPool, member_ids: &[&str]) {
    use diesel::prelude::*;
    use diesel_async::RunQueryDsl;
    use debate_api::db::schema::members;

    let mut conn = db.get().await.expect("pool");
    let ids: Vec<String> = member_ids.iter().map(|id| id.to_string()).collect();
    diesel::delete(members::table.filter(members::id.eq_any(ids)))
        .execute(&mut conn)
        .await
        .ok();
}
