use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::schema::messages;

/// A chat message ("comment" on the wire).
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = messages)]
pub struct Message {
    #[serde(with = "debate_common::snowflake::as_string")]
    #[schema(value_type = String)]
    pub id: i64,
    pub room_id: String,
    #[serde(rename = "creator")]
    pub author_id: String,
    pub body: String,
    pub team_number: i16,
    #[serde(rename = "created")]
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = messages)]
pub struct NewMessage<'a> {
    pub id: i64,
    pub room_id: &'a str,
    pub author_id: &'a str,
    pub body: &'a str,
    pub team_number: i16,
    pub created_at: DateTime<Utc>,
}

pub const BODY_MAX_LENGTH: usize = 4000;

/// Trim and check a message body. Returns the text to store.
pub fn normalize_body(body: &str) -> Result<&str, &'static str> {
    let body = body.trim();
    if body.is_empty() {
        return Err("You have to specify the comment body and it cannot be empty.");
    }
    if body.chars().count() > BODY_MAX_LENGTH {
        return Err("Comment body must be 4000 characters or fewer");
    }
    Ok(body)
}
