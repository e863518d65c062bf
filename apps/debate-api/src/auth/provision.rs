//! Local member provisioning: register a member row and mint a PAT for it.
//!
//! This is the write side of the token boundary. The identity issuer does the
//! same against the shared store; `debate-setup` and the test harness call it
//! directly.

use debate_common::id::{prefix, prefixed_ulid};
use diesel_async::AsyncPgConnection;

use crate::auth::tokens::{self, PatData};
use crate::db::kv::KeyValueStore;
use crate::error::{ApiError, RoomError};
use crate::models::member::Member;
use crate::store::members;

pub const USERNAME_MAX_LENGTH: usize = 32;

fn check_username(username: &str) -> Result<&str, RoomError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(RoomError::validation("Username cannot be empty"));
    }
    if username.chars().count() > USERNAME_MAX_LENGTH {
        return Err(RoomError::validation(format!(
            "Username must be {USERNAME_MAX_LENGTH} characters or fewer"
        )));
    }
    Ok(username)
}

/// Create a member and return it together with a fresh token.
pub async fn provision_member(
    conn: &mut AsyncPgConnection,
    kv: &dyn KeyValueStore,
    username: &str,
) -> Result<(Member, String), ApiError> {
    let username = check_username(username)?;
    let member_id = prefixed_ulid(prefix::MEMBER);
    let member = members::create_member(conn, &member_id, username).await?;
    let token = mint(kv, &member.id).await?;

    tracing::info!(member_id = %member.id, username = %member.username, "member provisioned");
    Ok((member, token))
}

/// Mint another token for an existing member.
pub async fn issue_token(
    conn: &mut AsyncPgConnection,
    kv: &dyn KeyValueStore,
    member_id: &str,
) -> Result<String, ApiError> {
    let member = members::find_member(conn, member_id).await?;
    let token = mint(kv, &member.id).await?;

    tracing::info!(member_id = %member.id, "token issued");
    Ok(token)
}

async fn mint(kv: &dyn KeyValueStore, member_id: &str) -> Result<String, ApiError> {
    let token = tokens::generate_pat();
    tokens::store_pat(
        kv,
        &token,
        &PatData {
            member_id: member_id.to_string(),
        },
    )
    .await?;
    Ok(token)
}
